use super::container::ContainerHandle;
use crate::data::ContainerStore;
use crate::errors::{Error, Result};
use crate::models::*;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

/// In-memory container map with a persistent mirror. All creation goes
/// through one async mutex so the idempotency lookup and the insert are
/// linearizable per registry, not per container.
pub struct ContainerRegistry {
    containers: DashMap<Uuid, Arc<ContainerHandle>>,
    store: Arc<dyn ContainerStore>,
    create_lock: tokio::sync::Mutex<()>,
    root_cancel: CancellationToken,
}

impl ContainerRegistry {
    pub fn new(store: Arc<dyn ContainerStore>, root_cancel: CancellationToken) -> ContainerRegistry {
        ContainerRegistry {
            containers: DashMap::new(),
            store,
            create_lock: tokio::sync::Mutex::new(()),
            root_cancel,
        }
    }

    /// Find a live container for (player, ship, kind) or create one.
    /// Returns the handle and whether it was newly created.
    pub async fn find_or_create(
        &self,
        player_id: i64,
        kind: ContainerKind,
        ship_symbol: Option<String>,
        config: serde_json::Value,
        max_iterations: i64,
    ) -> Result<(Arc<ContainerHandle>, bool)> {
        let _guard = self.create_lock.lock().await;

        if let Some(ship_symbol) = &ship_symbol {
            if let Some(existing) = self.find_active(player_id, ship_symbol, kind) {
                return Ok((existing, false));
            }
        }

        let record = ContainerRecord::new(player_id, kind, ship_symbol, config, max_iterations);
        let id = record.id;
        let handle = Arc::new(ContainerHandle::new(record, self.root_cancel.child_token()));
        self.store.insert_container(&handle.snapshot()).await?;
        self.containers.insert(id, handle.clone());
        self.append_log(&handle, "Container started").await?;
        info!("Registered container {} ({})", id, kind);
        Ok((handle, true))
    }

    fn find_active(
        &self,
        player_id: i64,
        ship_symbol: &str,
        kind: ContainerKind,
    ) -> Option<Arc<ContainerHandle>> {
        self.containers
            .iter()
            .find(|entry| {
                let handle = entry.value();
                handle.player_id() == player_id
                    && handle.kind() == kind
                    && handle.ship_symbol().as_deref() == Some(ship_symbol)
                    && !handle.status().is_terminal()
            })
            .map(|entry| entry.value().clone())
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<ContainerHandle>> {
        self.containers.get(&id).map(|e| e.value().clone())
    }

    pub fn list(
        &self,
        player_id: Option<i64>,
        kind: Option<ContainerKind>,
        ship_symbol: Option<&str>,
    ) -> Vec<ContainerRecord> {
        let mut records: Vec<ContainerRecord> = self
            .containers
            .iter()
            .map(|entry| entry.value().snapshot())
            .filter(|record| player_id.map(|p| record.player_id == p).unwrap_or(true))
            .filter(|record| kind.map(|k| record.kind == k).unwrap_or(true))
            .filter(|record| {
                ship_symbol
                    .map(|s| record.ship_symbol.as_deref() == Some(s))
                    .unwrap_or(true)
            })
            .collect();
        records.sort_by_key(|r| r.created_at);
        records
    }

    /// Persist the handle's current record.
    pub async fn persist(&self, handle: &ContainerHandle) -> Result<()> {
        self.store.update_container(&handle.snapshot()).await
    }

    pub async fn append_log(&self, handle: &ContainerHandle, message: &str) -> Result<()> {
        handle.push_log(ContainerLogLine {
            container_id: handle.id(),
            message: message.to_string(),
            logged_at: Utc::now(),
        });
        self.store.append_container_log(handle.id(), message).await
    }

    pub async fn logs(&self, id: Uuid, limit: usize) -> Result<Vec<ContainerLogLine>> {
        match self.get(id) {
            Some(handle) => Ok(handle.log_tail(limit)),
            None => self.store.container_logs(id, limit as i64).await,
        }
    }

    /// Cooperative stop; the run loop transitions the status.
    pub fn stop(&self, id: Uuid) -> Result<()> {
        let handle = self
            .get(id)
            .ok_or_else(|| Error::InvalidParams(format!("no container {}", id)))?;
        handle.request_stop();
        Ok(())
    }

    pub fn stop_all(&self) {
        for entry in self.containers.iter() {
            entry.value().request_stop();
        }
    }

    /// Remove a terminal container and its logs.
    pub async fn remove(&self, id: Uuid) -> Result<()> {
        let handle = self
            .get(id)
            .ok_or_else(|| Error::InvalidParams(format!("no container {}", id)))?;
        if !handle.status().is_terminal() {
            return Err(Error::InvalidParams(format!(
                "container {} is {}, stop it first",
                id,
                handle.status()
            )));
        }
        self.store.delete_container(id).await?;
        self.containers.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::MemoryContainerStore;
    use crate::models::ContainerKind::*;

    fn registry() -> Arc<ContainerRegistry> {
        Arc::new(ContainerRegistry::new(
            Arc::new(MemoryContainerStore::new()),
            CancellationToken::new(),
        ))
    }

    #[tokio::test]
    async fn test_find_or_create_is_idempotent() {
        let registry = registry();
        let (a, created_a) = registry
            .find_or_create(1, ScoutTour, Some("SHIP-1".into()), serde_json::json!({}), -1)
            .await
            .unwrap();
        let (b, created_b) = registry
            .find_or_create(1, ScoutTour, Some("SHIP-1".into()), serde_json::json!({}), -1)
            .await
            .unwrap();
        assert!(created_a);
        assert!(!created_b);
        assert_eq!(a.id(), b.id());

        // a different kind, ship or player gets its own container
        let (c, created_c) = registry
            .find_or_create(1, Navigate, Some("SHIP-1".into()), serde_json::json!({}), 1)
            .await
            .unwrap();
        assert!(created_c);
        assert_ne!(a.id(), c.id());
    }

    #[tokio::test]
    async fn test_concurrent_creates_coalesce() {
        let registry = registry();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let (handle, _) = registry
                    .find_or_create(
                        7,
                        ScoutTour,
                        Some("SHIP-9".into()),
                        serde_json::json!({}),
                        -1,
                    )
                    .await
                    .unwrap();
                handle.id()
            }));
        }
        let mut ids = std::collections::BTreeSet::new();
        for task in handles {
            ids.insert(task.await.unwrap());
        }
        assert_eq!(ids.len(), 1, "all concurrent requests must share one container");
    }

    #[tokio::test]
    async fn test_terminal_container_is_replaced_not_reused() {
        let registry = registry();
        let (a, _) = registry
            .find_or_create(1, ScoutTour, Some("SHIP-1".into()), serde_json::json!({}), -1)
            .await
            .unwrap();
        a.update(|r| r.status = ContainerStatus::Failed);
        let (b, created) = registry
            .find_or_create(1, ScoutTour, Some("SHIP-1".into()), serde_json::json!({}), -1)
            .await
            .unwrap();
        assert!(created);
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_remove_requires_terminal_state() {
        let registry = registry();
        let (a, _) = registry
            .find_or_create(1, Navigate, Some("SHIP-1".into()), serde_json::json!({}), 1)
            .await
            .unwrap();
        let err = registry.remove(a.id()).await.unwrap_err();
        assert_eq!(err.code(), "InvalidParams");
        a.update(|r| r.status = ContainerStatus::Completed);
        registry.remove(a.id()).await.unwrap();
        assert!(registry.get(a.id()).is_none());
    }

    #[tokio::test]
    async fn test_logs_survive_in_tail() {
        let registry = registry();
        let (a, _) = registry
            .find_or_create(1, Navigate, Some("SHIP-1".into()), serde_json::json!({}), 1)
            .await
            .unwrap();
        registry.append_log(&a, "first hop").await.unwrap();
        let logs = registry.logs(a.id(), 10).await.unwrap();
        assert_eq!(logs.len(), 2); // "Container started" + "first hop"
        assert_eq!(logs[0].message, "Container started");
        assert_eq!(logs[1].message, "first hop");
    }
}
