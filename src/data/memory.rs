use super::ContainerStore;
use crate::errors::{Error, Result};
use crate::models::{ContainerLogLine, ContainerRecord};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

/// Storage-free container store. Backs the registry in tests and in
/// environments without a database connection string.
#[derive(Default)]
pub struct MemoryContainerStore {
    containers: DashMap<Uuid, ContainerRecord>,
    logs: DashMap<Uuid, Vec<ContainerLogLine>>,
}

impl MemoryContainerStore {
    pub fn new() -> MemoryContainerStore {
        MemoryContainerStore::default()
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}

#[async_trait]
impl ContainerStore for MemoryContainerStore {
    async fn insert_container(&self, record: &ContainerRecord) -> Result<()> {
        self.containers.insert(record.id, record.clone());
        Ok(())
    }

    async fn update_container(&self, record: &ContainerRecord) -> Result<()> {
        match self.containers.get_mut(&record.id) {
            Some(mut entry) => {
                *entry = record.clone();
                Ok(())
            }
            None => Err(Error::Database(format!("no container row {}", record.id))),
        }
    }

    async fn delete_container(&self, id: Uuid) -> Result<()> {
        self.containers.remove(&id);
        self.logs.remove(&id);
        Ok(())
    }

    async fn append_container_log(&self, id: Uuid, message: &str) -> Result<()> {
        self.logs.entry(id).or_default().push(ContainerLogLine {
            container_id: id,
            message: message.to_string(),
            logged_at: Utc::now(),
        });
        Ok(())
    }

    async fn container_logs(&self, id: Uuid, limit: i64) -> Result<Vec<ContainerLogLine>> {
        let lines = self.logs.get(&id).map(|l| l.clone()).unwrap_or_default();
        let skip = lines.len().saturating_sub(limit as usize);
        Ok(lines.into_iter().skip(skip).collect())
    }
}
