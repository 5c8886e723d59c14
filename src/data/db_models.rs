use crate::schema::*;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = players)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PlayerRow {
    pub id: i64,
    pub agent_symbol: String,
    pub token: String,
    pub metadata: Value,
    pub credits: i64,
    pub last_active: DateTime<Utc>,
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = waypoints)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct WaypointRow {
    pub system_symbol: String,
    pub symbol: String,
    pub details: Value,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = system_graphs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SystemGraphRow {
    pub system_symbol: String,
    pub waypoints: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = market_snapshots)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MarketSnapshotRow {
    pub player_id: i64,
    pub waypoint_symbol: String,
    pub captured_at: DateTime<Utc>,
    pub trade_goods: Value,
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = contracts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ContractRow {
    pub player_id: i64,
    pub contract_id: String,
    pub details: Value,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = ledger_entries)]
pub struct NewLedgerEntryRow {
    pub player_id: i64,
    pub kind: String,
    pub signed_amount: i64,
    pub units: i64,
    pub related_container_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = containers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ContainerRow {
    pub id: Uuid,
    pub player_id: i64,
    pub kind: String,
    pub ship_symbol: Option<String>,
    pub config: Value,
    pub status: String,
    pub current_iteration: i64,
    pub max_iterations: i64,
    pub last_error: Option<String>,
    pub restart_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = container_logs)]
pub struct NewContainerLogRow {
    pub container_id: Uuid,
    pub message: String,
    pub logged_at: DateTime<Utc>,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = container_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ContainerLogRow {
    pub id: i64,
    pub container_id: Uuid,
    pub message: String,
    pub logged_at: DateTime<Utc>,
}
