pub mod container;
pub mod registry;

pub use container::ContainerHandle;
pub use registry::ContainerRegistry;

use crate::config::CONFIG;
use crate::errors::{Error, Result};
use crate::models::*;
use crate::players::PlayerRegistry;
use crate::ship_controller::ShipController;
use crate::universe::Universe;
use crate::workflows;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use uuid::Uuid;

const RESTART_BACKOFF_CAP_SECONDS: u64 = 30;

/// Everything a container iteration body gets to work with.
#[derive(Clone)]
pub struct WorkflowCtx {
    pub supervisor: Arc<Supervisor>,
    pub handle: Arc<ContainerHandle>,
    pub player: Arc<Player>,
    pub universe: Universe,
    pub cancel: CancellationToken,
}

impl WorkflowCtx {
    pub async fn log(&self, message: &str) {
        if let Err(e) = self
            .supervisor
            .registry()
            .append_log(&self.handle, message)
            .await
        {
            warn!("failed to append container log: {}", e);
        }
    }

    pub fn config<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.handle.config())
            .map_err(|e| Error::InvalidParams(format!("bad container config: {}", e)))
    }

    /// The container's target ship, freshly loaded.
    pub async fn ship(&self) -> Result<ShipController> {
        let symbol = self
            .handle
            .ship_symbol()
            .ok_or_else(|| Error::InvalidParams("container has no target ship".to_string()))?;
        ShipController::load(
            &self.player,
            &self.universe,
            &symbol,
            self.cancel.clone(),
            Some(self.handle.id()),
        )
        .await
    }
}

/// Schedules one task per container: iteration loop, restart with capped
/// exponential backoff on transient errors, cooperative stop, kind-specific
/// pacing and deadlines.
pub struct Supervisor {
    registry: Arc<ContainerRegistry>,
    universe: Universe,
    players: Arc<PlayerRegistry>,
    tasks: TaskTracker,
    restart_cap: u32,
    backoff_unit: Duration,
}

impl Supervisor {
    pub fn new(
        universe: Universe,
        players: Arc<PlayerRegistry>,
        registry: Arc<ContainerRegistry>,
    ) -> Arc<Supervisor> {
        Self::with_backoff_unit(universe, players, registry, Duration::from_secs(1))
    }

    /// `backoff_unit` scales the restart backoff; tests shrink it.
    pub fn with_backoff_unit(
        universe: Universe,
        players: Arc<PlayerRegistry>,
        registry: Arc<ContainerRegistry>,
        backoff_unit: Duration,
    ) -> Arc<Supervisor> {
        Arc::new(Supervisor {
            registry,
            universe,
            players,
            tasks: TaskTracker::new(),
            restart_cap: CONFIG.restart_cap,
            backoff_unit,
        })
    }

    pub fn registry(&self) -> &Arc<ContainerRegistry> {
        &self.registry
    }

    /// Create (or coalesce onto) a container and start its task.
    ///
    /// Boxed rather than `async fn`: workflows (e.g. scout's fleet
    /// assignment) call back into `launch` while running inside a spawned
    /// container task, which would otherwise make this function's opaque
    /// future type recursively reference itself.
    pub fn launch(
        self: Arc<Self>,
        player_id: i64,
        kind: ContainerKind,
        ship_symbol: Option<String>,
        config: serde_json::Value,
        max_iterations: i64,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(Uuid, bool)>> + Send>> {
        Box::pin(async move {
            if !CONFIG.container_filter.is_match(&kind.to_string()) {
                return Err(Error::InvalidParams(format!(
                    "container kind {} is filtered out on this daemon",
                    kind
                )));
            }
            self.players.get(player_id)?;
            let (handle, created) = self
                .registry
                .find_or_create(player_id, kind, ship_symbol, config, max_iterations)
                .await?;
            if created {
                let supervisor = self.clone();
                let task_handle = handle.clone();
                self.tasks.spawn(async move {
                    supervisor.run_container(task_handle).await;
                });
            }
            Ok((handle.id(), created))
        })
    }

    async fn run_container(self: Arc<Self>, handle: Arc<ContainerHandle>) {
        let id = handle.id();
        let kind = handle.kind();
        let player = match self.players.get(handle.player_id()) {
            Ok(player) => player,
            Err(e) => {
                self.finish(&handle, ContainerStatus::Failed, Some(&e)).await;
                return;
            }
        };
        let cancel = handle.cancel_token().clone();
        let ctx = WorkflowCtx {
            supervisor: self.clone(),
            handle: handle.clone(),
            player,
            universe: self.universe.clone(),
            cancel: cancel.clone(),
        };

        handle.update(|r| r.status = ContainerStatus::Starting);
        let _ = self.registry.persist(&handle).await;
        handle.update(|r| r.status = ContainerStatus::Running);
        let _ = self.registry.persist(&handle).await;
        info!("Container {} ({}) running", id, kind);

        loop {
            if cancel.is_cancelled() {
                self.finish(&handle, ContainerStatus::Stopped, None).await;
                return;
            }
            if !handle.snapshot().iterations_remaining() {
                self.finish(&handle, ContainerStatus::Completed, None).await;
                return;
            }

            let deadline = iteration_deadline(kind);
            let result = match tokio::time::timeout(deadline, workflows::run_iteration(&ctx)).await
            {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout),
            };

            match result {
                Ok(pace) => {
                    handle.update(|r| {
                        r.current_iteration += 1;
                        r.restart_count = 0;
                        r.last_error = None;
                    });
                    let _ = self.registry.persist(&handle).await;
                    if !pace.is_zero() && handle.snapshot().iterations_remaining() {
                        tokio::select! {
                            _ = cancel.cancelled() => {}
                            _ = tokio::time::sleep(pace) => {}
                        }
                    }
                }
                Err(e) if e.is_canceled() => {
                    self.finish(&handle, ContainerStatus::Stopped, None).await;
                    return;
                }
                Err(e) if e.is_transient() => {
                    let record = handle.update(|r| {
                        r.restart_count += 1;
                        r.last_error = Some(format!("{}: {}", e.code(), e));
                    });
                    if record.restart_count as u32 > self.restart_cap {
                        self.finish(&handle, ContainerStatus::Failed, Some(&e)).await;
                        return;
                    }
                    let backoff = self.restart_backoff(record.restart_count as u32);
                    let _ = self
                        .registry
                        .append_log(
                            &handle,
                            &format!(
                                "Restart {} after {}: retrying in {:.1}s",
                                record.restart_count,
                                e.code(),
                                backoff.as_secs_f64()
                            ),
                        )
                        .await;
                    let _ = self.registry.persist(&handle).await;
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            self.finish(&handle, ContainerStatus::Stopped, None).await;
                            return;
                        }
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
                Err(e) => {
                    self.finish(&handle, ContainerStatus::Failed, Some(&e)).await;
                    return;
                }
            }
        }
    }

    fn restart_backoff(&self, restart_count: u32) -> Duration {
        let factor = 2u64
            .saturating_pow(restart_count.min(10))
            .min(RESTART_BACKOFF_CAP_SECONDS);
        self.backoff_unit * factor as u32
    }

    async fn finish(&self, handle: &Arc<ContainerHandle>, status: ContainerStatus, e: Option<&Error>) {
        handle.update(|r| {
            r.status = status;
            if let Some(e) = e {
                r.last_error = Some(format!("{}: {}", e.code(), e));
            }
        });
        let message = match e {
            Some(e) => format!("Container {}: {}", status, e),
            None => format!("Container {}", status),
        };
        if let Err(persist_err) = self.registry.persist(handle).await {
            error!("failed to persist container {}: {}", handle.id(), persist_err);
        }
        let _ = self.registry.append_log(handle, &message).await;
        info!("Container {} ({}) {}", handle.id(), handle.kind(), status);
    }

    /// Stop accepting work, signal every container, and wait out the grace
    /// period. Never blocks past `grace`.
    pub async fn shutdown(&self, grace: Duration) {
        self.registry.stop_all();
        self.tasks.close();
        if tokio::time::timeout(grace, self.tasks.wait()).await.is_err() {
            warn!("shutdown grace period elapsed with containers still running");
        }
    }
}

fn iteration_deadline(kind: ContainerKind) -> Duration {
    match kind {
        ContainerKind::Navigate => Duration::from_secs(30 * 60),
        ContainerKind::ScoutTour => Duration::from_secs(2 * 3600),
        ContainerKind::ScoutFleetAssignment => Duration::from_secs(30 * 60),
        ContainerKind::ShipyardPurchase => Duration::from_secs(30 * 60),
        ContainerKind::BatchPurchase => Duration::from_secs(3600),
        ContainerKind::ContractBatch => Duration::from_secs(6 * 3600),
        ContainerKind::Arbitrage => Duration::from_secs(2 * 3600),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::MemoryContainerStore;
    use crate::gateway::ApiGateway;
    use chrono::Utc;

    fn fixture(backoff_unit: Duration) -> (Arc<Supervisor>, CancellationToken) {
        // nothing listens on this port: every gateway call is a transport
        // error, which classifies as transient
        let gateway = Arc::new(ApiGateway::with_settings(
            "http://127.0.0.1:9",
            1000,
            0,
            Duration::from_millis(1),
            1000,
            Duration::from_secs(60),
        ));
        let universe = Universe::new(&gateway, None);
        let players = Arc::new(PlayerRegistry::new());
        players.insert(Player {
            id: 1,
            agent_symbol: "TEST_AGENT".to_string(),
            token: "token".to_string(),
            metadata: serde_json::json!({}),
            credits: 0,
            last_active: Utc::now(),
        });
        let root = CancellationToken::new();
        let registry = Arc::new(ContainerRegistry::new(
            Arc::new(MemoryContainerStore::new()),
            root.clone(),
        ));
        let supervisor = Supervisor::with_backoff_unit(universe, players, registry, backoff_unit);
        (supervisor, root)
    }

    async fn wait_for_status(
        supervisor: &Arc<Supervisor>,
        id: Uuid,
        status: ContainerStatus,
    ) -> ContainerRecord {
        for _ in 0..200 {
            let record = supervisor.registry().get(id).unwrap().snapshot();
            if record.status == status {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("container never reached {:?}", status);
    }

    #[tokio::test]
    async fn test_transient_errors_restart_until_the_cap_then_fail() {
        let (supervisor, _root) = fixture(Duration::from_millis(1));
        let (id, created) = supervisor
            .clone()
            .launch(
                1,
                ContainerKind::Navigate,
                Some("TEST_AGENT-1".to_string()),
                serde_json::json!({"to": "X1-S1-B2"}),
                1,
            )
            .await
            .unwrap();
        assert!(created);
        let record = wait_for_status(&supervisor, id, ContainerStatus::Failed).await;
        assert!(record.restart_count as u32 > 0);
        assert!(record.last_error.is_some());
        let logs = supervisor.registry().logs(id, 100).await.unwrap();
        assert!(logs.iter().any(|l| l.message.contains("Restart 1")));
    }

    #[tokio::test]
    async fn test_stop_during_backoff_transitions_to_stopped() {
        // long backoff: the container parks in its restart sleep
        let (supervisor, _root) = fixture(Duration::from_secs(30));
        let (id, _) = supervisor
            .clone()
            .launch(
                1,
                ContainerKind::Navigate,
                Some("TEST_AGENT-1".to_string()),
                serde_json::json!({"to": "X1-S1-B2"}),
                1,
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        supervisor.registry().stop(id).unwrap();
        let record = wait_for_status(&supervisor, id, ContainerStatus::Stopped).await;
        assert_eq!(record.status, ContainerStatus::Stopped);
    }

    #[tokio::test]
    async fn test_launch_unknown_player_is_rejected() {
        let (supervisor, _root) = fixture(Duration::from_millis(1));
        let err = supervisor
            .clone()
            .launch(
                99,
                ContainerKind::Navigate,
                Some("GHOST-1".to_string()),
                serde_json::json!({"to": "X1-S1-B2"}),
                1,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PlayerNotFound");
    }

    #[tokio::test]
    async fn test_shutdown_stops_everything_within_grace() {
        let (supervisor, _root) = fixture(Duration::from_secs(30));
        let (id, _) = supervisor
            .clone()
            .launch(
                1,
                ContainerKind::Navigate,
                Some("TEST_AGENT-1".to_string()),
                serde_json::json!({"to": "X1-S1-B2"}),
                1,
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        supervisor.shutdown(Duration::from_secs(2)).await;
        let record = supervisor.registry().get(id).unwrap().snapshot();
        assert!(record.status.is_terminal());
    }
}
