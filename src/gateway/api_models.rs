use crate::models::{Agent, Contract, Ship, ShipCargo, ShipFuel, ShipNav};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigateResponse {
    pub nav: ShipNav,
    pub fuel: ShipFuel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavStatusResponse {
    pub nav: ShipNav,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightModeResponse {
    pub nav: ShipNav,
    pub fuel: ShipFuel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefuelResponse {
    pub agent: Agent,
    pub fuel: ShipFuel,
    pub transaction: MarketTransaction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeResponse {
    pub agent: Agent,
    pub cargo: ShipCargo,
    pub transaction: MarketTransaction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JettisonResponse {
    pub cargo: ShipCargo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseShipResponse {
    pub agent: Agent,
    pub ship: Ship,
    pub transaction: ShipyardTransaction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiateContractResponse {
    pub contract: Contract,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptContractResponse {
    pub agent: Agent,
    pub contract: Contract,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverContractResponse {
    pub contract: Contract,
    pub cargo: ShipCargo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillContractResponse {
    pub agent: Agent,
    pub contract: Contract,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketTransaction {
    pub trade_symbol: String,
    pub units: i64,
    pub price_per_unit: i64,
    pub total_price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipyardTransaction {
    pub ship_symbol: String,
    pub price: i64,
}
