use crate::models::{ContainerKind, ShipFlightMode, WaypointSymbol};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

/// One framed request: a single JSON object per connection.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Deserialize)]
pub struct NavigateParams {
    pub player: String,
    pub ship_symbol: String,
    pub to: WaypointSymbol,
    #[serde(default)]
    pub mode: Option<ShipFlightMode>,
}

#[derive(Debug, Deserialize)]
pub struct ShipParams {
    pub player: String,
    pub ship_symbol: String,
}

#[derive(Debug, Deserialize)]
pub struct RefuelParams {
    pub player: String,
    pub ship_symbol: String,
    #[serde(default)]
    pub units: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SetFlightModeParams {
    pub player: String,
    pub ship_symbol: String,
    pub mode: ShipFlightMode,
}

#[derive(Debug, Deserialize)]
pub struct CargoParams {
    pub player: String,
    pub ship_symbol: String,
    pub good: String,
    pub units: i64,
}

#[derive(Debug, Deserialize)]
pub struct ShipyardPurchaseParams {
    pub player: String,
    pub ship_symbol: String,
    pub ship_type: String,
    #[serde(default)]
    pub shipyard: Option<WaypointSymbol>,
}

#[derive(Debug, Deserialize)]
pub struct ShipyardBatchPurchaseParams {
    pub player: String,
    pub ship_symbol: String,
    pub ship_type: String,
    pub quantity: i64,
    #[serde(default)]
    pub max_budget: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ScoutMarketsParams {
    pub player: String,
    pub ship_symbol: String,
    #[serde(default)]
    pub markets: Vec<WaypointSymbol>,
}

#[derive(Debug, Deserialize)]
pub struct AssignScoutingFleetParams {
    pub player: String,
    pub ship_symbols: Vec<String>,
    #[serde(default)]
    pub markets: Vec<WaypointSymbol>,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ContractBatchParams {
    pub player: String,
    pub ship_symbol: String,
    pub count: i64,
}

#[derive(Debug, Deserialize)]
pub struct ArbitrageParams {
    pub player: String,
    pub ship_symbol: String,
    #[serde(default)]
    pub good: Option<String>,
    #[serde(default)]
    pub min_margin: Option<i64>,
    /// -1 keeps trading until stopped.
    #[serde(default = "default_infinite")]
    pub iterations: i64,
}

fn default_infinite() -> i64 {
    -1
}

#[derive(Debug, Deserialize)]
pub struct DaemonListParams {
    #[serde(default)]
    pub player: Option<String>,
    #[serde(default)]
    pub kind: Option<ContainerKind>,
    #[serde(default)]
    pub ship_symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DaemonIdParams {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct DaemonLogsParams {
    pub id: Uuid,
    #[serde(default = "default_log_limit")]
    pub limit: usize,
}

fn default_log_limit() -> usize {
    50
}

#[derive(Debug, Deserialize)]
pub struct PlayerParams {
    pub player: String,
}
