use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kinds of scheduled background work.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerKind {
    Navigate,
    ScoutTour,
    ScoutFleetAssignment,
    ShipyardPurchase,
    BatchPurchase,
    ContractBatch,
    Arbitrage,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerStatus {
    Pending,
    Starting,
    Running,
    Completed,
    Failed,
    Stopped,
}

impl ContainerStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ContainerStatus::Completed | ContainerStatus::Failed | ContainerStatus::Stopped
        )
    }
}

/// Iteration cap: -1 runs forever.
pub const ITERATIONS_INFINITE: i64 = -1;

/// The persisted shape of a container. The supervisor owns the live copy;
/// the registry mirrors it to storage on every status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub id: Uuid,
    pub player_id: i64,
    pub kind: ContainerKind,
    pub ship_symbol: Option<String>,
    pub config: serde_json::Value,
    pub status: ContainerStatus,
    pub current_iteration: i64,
    pub max_iterations: i64,
    pub last_error: Option<String>,
    pub restart_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContainerRecord {
    pub fn new(
        player_id: i64,
        kind: ContainerKind,
        ship_symbol: Option<String>,
        config: serde_json::Value,
        max_iterations: i64,
    ) -> ContainerRecord {
        let now = Utc::now();
        ContainerRecord {
            id: Uuid::new_v4(),
            player_id,
            kind,
            ship_symbol,
            config,
            status: ContainerStatus::Pending,
            current_iteration: 0,
            max_iterations,
            last_error: None,
            restart_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn iterations_remaining(&self) -> bool {
        self.max_iterations == ITERATIONS_INFINITE
            || self.current_iteration < self.max_iterations
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerLogLine {
    pub container_id: Uuid,
    pub message: String,
    pub logged_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr as _;

    #[test]
    fn test_kind_text_round_trip() {
        assert_eq!(ContainerKind::ScoutTour.to_string(), "SCOUT_TOUR");
        assert_eq!(
            ContainerKind::from_str("SCOUT_FLEET_ASSIGNMENT").unwrap(),
            ContainerKind::ScoutFleetAssignment
        );
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(ContainerStatus::Completed.is_terminal());
        assert!(ContainerStatus::Failed.is_terminal());
        assert!(ContainerStatus::Stopped.is_terminal());
        assert!(!ContainerStatus::Running.is_terminal());
        assert!(!ContainerStatus::Pending.is_terminal());
    }

    #[test]
    fn test_iteration_caps() {
        let mut record = ContainerRecord::new(
            1,
            ContainerKind::Navigate,
            Some("SHIP-1".to_string()),
            serde_json::json!({}),
            1,
        );
        assert!(record.iterations_remaining());
        record.current_iteration = 1;
        assert!(!record.iterations_remaining());
        record.max_iterations = ITERATIONS_INFINITE;
        assert!(record.iterations_remaining());
    }
}
