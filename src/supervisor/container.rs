use crate::models::{ContainerKind, ContainerLogLine, ContainerRecord, ContainerStatus};
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Bounded in-memory log tail kept per container for fast `DaemonLogs`.
const LOG_TAIL_LINES: usize = 200;

/// Live handle to a scheduled container. The supervisor owns the iteration
/// state; everyone else reads snapshots through the registry.
pub struct ContainerHandle {
    record: Mutex<ContainerRecord>,
    cancel: CancellationToken,
    log_tail: Mutex<VecDeque<ContainerLogLine>>,
}

impl ContainerHandle {
    pub fn new(record: ContainerRecord, cancel: CancellationToken) -> ContainerHandle {
        ContainerHandle {
            record: Mutex::new(record),
            cancel,
            log_tail: Mutex::new(VecDeque::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.record.lock().unwrap().id
    }

    pub fn player_id(&self) -> i64 {
        self.record.lock().unwrap().player_id
    }

    pub fn kind(&self) -> ContainerKind {
        self.record.lock().unwrap().kind
    }

    pub fn ship_symbol(&self) -> Option<String> {
        self.record.lock().unwrap().ship_symbol.clone()
    }

    pub fn status(&self) -> ContainerStatus {
        self.record.lock().unwrap().status
    }

    pub fn snapshot(&self) -> ContainerRecord {
        self.record.lock().unwrap().clone()
    }

    pub fn config(&self) -> serde_json::Value {
        self.record.lock().unwrap().config.clone()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Request a cooperative stop; the run loop notices at its next
    /// awaitable boundary.
    pub fn request_stop(&self) {
        self.cancel.cancel();
    }

    pub fn update<F>(&self, mutate: F) -> ContainerRecord
    where
        F: FnOnce(&mut ContainerRecord),
    {
        let mut record = self.record.lock().unwrap();
        mutate(&mut record);
        record.updated_at = Utc::now();
        record.clone()
    }

    pub fn push_log(&self, line: ContainerLogLine) {
        let mut tail = self.log_tail.lock().unwrap();
        if tail.len() >= LOG_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    pub fn log_tail(&self, limit: usize) -> Vec<ContainerLogLine> {
        let tail = self.log_tail.lock().unwrap();
        let skip = tail.len().saturating_sub(limit);
        tail.iter().skip(skip).cloned().collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::models::ContainerKind;

    fn handle() -> ContainerHandle {
        let record = ContainerRecord::new(
            1,
            ContainerKind::ScoutTour,
            Some("SHIP-1".to_string()),
            serde_json::json!({}),
            -1,
        );
        ContainerHandle::new(record, CancellationToken::new())
    }

    #[test]
    fn test_update_bumps_updated_at() {
        let handle = handle();
        let before = handle.snapshot().updated_at;
        std::thread::sleep(std::time::Duration::from_millis(5));
        let record = handle.update(|r| r.status = ContainerStatus::Running);
        assert_eq!(record.status, ContainerStatus::Running);
        assert!(record.updated_at > before);
    }

    #[test]
    fn test_log_tail_is_bounded() {
        let handle = handle();
        for i in 0..250 {
            handle.push_log(ContainerLogLine {
                container_id: handle.id(),
                message: format!("line {}", i),
                logged_at: Utc::now(),
            });
        }
        let tail = handle.log_tail(1000);
        assert_eq!(tail.len(), 200);
        assert_eq!(tail[0].message, "line 50");
        let short = handle.log_tail(10);
        assert_eq!(short.len(), 10);
        assert_eq!(short.last().unwrap().message, "line 249");
    }

    #[test]
    fn test_stop_request_sets_token() {
        let handle = handle();
        assert!(!handle.cancel_token().is_cancelled());
        handle.request_stop();
        assert!(handle.cancel_token().is_cancelled());
    }
}
