mod container;
mod contract;
mod market;
mod ship;
mod symbol;
mod waypoint;

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use container::*;
pub use contract::*;
pub use market::*;
pub use ship::*;
pub use symbol::*;
pub use waypoint::*;

use serde::{Deserialize, Serialize};

/// A registered operator account. Owns every ship and container it spawns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,
    pub agent_symbol: String,
    pub token: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub credits: i64,
    pub last_active: DateTime<Utc>,
}

/// Remote view of the agent, used to refresh the cached credits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub symbol: String,
    pub headquarters: WaypointSymbol,
    pub credits: i64,
    pub starting_faction: String,
    pub ship_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedList<T> {
    pub data: Vec<T>,
    pub meta: Meta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub page: u32,
    pub limit: u32,
    pub total: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Data<T> {
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithTimestamp<T> {
    pub timestamp: DateTime<Utc>,
    pub data: T,
}

/// Append-only audit of every economic effect a container produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub player_id: i64,
    pub kind: LedgerEntryKind,
    pub signed_amount: i64,
    pub units: i64,
    pub related_container_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEntryKind {
    CargoPurchase,
    CargoSale,
    Refuel,
    ShipPurchase,
    ContractReward,
}

impl LedgerEntry {
    pub fn new(
        player_id: i64,
        kind: LedgerEntryKind,
        signed_amount: i64,
        units: i64,
        related_container_id: Option<Uuid>,
    ) -> LedgerEntry {
        LedgerEntry {
            player_id,
            kind,
            signed_amount,
            units,
            related_container_id,
            timestamp: Utc::now(),
        }
    }
}
