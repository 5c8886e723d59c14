use std::fmt::{self, Display, Formatter};

use super::WaypointSymbol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    pub symbol: WaypointSymbol,
    #[serde(default)]
    pub imports: Vec<TradeSymbol>,
    #[serde(default)]
    pub exports: Vec<TradeSymbol>,
    #[serde(default)]
    pub exchange: Vec<TradeSymbol>,
    #[serde(default)]
    pub trade_goods: Vec<MarketTradeGood>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSymbol {
    pub symbol: String,
}

/// One captured view of a market's trade goods, timestamped at capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub waypoint_symbol: WaypointSymbol,
    pub captured_at: DateTime<Utc>,
    pub trade_goods: Vec<MarketTradeGood>,
}

impl MarketSnapshot {
    pub fn capture(market: &Market) -> MarketSnapshot {
        MarketSnapshot {
            waypoint_symbol: market.symbol.clone(),
            captured_at: Utc::now(),
            trade_goods: market.trade_goods.clone(),
        }
    }

    pub fn good(&self, symbol: &str) -> Option<&MarketTradeGood> {
        self.trade_goods.iter().find(|g| g.symbol == symbol)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketTradeGood {
    pub symbol: String,
    pub trade_volume: i64,
    #[serde(rename = "type")]
    pub _type: MarketType,
    pub supply: MarketSupply,
    pub activity: Option<MarketActivity>,
    pub purchase_price: i64,
    pub sell_price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum MarketType {
    #[serde(rename = "IMPORT")]
    Import,
    #[serde(rename = "EXPORT")]
    Export,
    #[serde(rename = "EXCHANGE")]
    Exchange,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum MarketSupply {
    #[serde(rename = "SCARCE")]
    Scarce,
    #[serde(rename = "LIMITED")]
    Limited,
    #[serde(rename = "MODERATE")]
    Moderate,
    #[serde(rename = "HIGH")]
    High,
    #[serde(rename = "ABUNDANT")]
    Abundant,
}

impl Display for MarketSupply {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", format!("{:?}", self).to_uppercase())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum MarketActivity {
    #[serde(rename = "WEAK")]
    Weak,
    #[serde(rename = "GROWING")]
    Growing,
    #[serde(rename = "STRONG")]
    Strong,
    #[serde(rename = "RESTRICTED")]
    Restricted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipyard {
    pub symbol: WaypointSymbol,
    pub ship_types: Vec<ShipType>,
    #[serde(default)]
    pub ships: Vec<ShipyardShip>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipType {
    #[serde(rename = "type")]
    pub ship_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipyardShip {
    #[serde(rename = "type")]
    pub ship_type: String,
    pub purchase_price: i64,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_market_good() {
        let good1_json = r#"{
            "symbol": "FOOD",
            "tradeVolume": 60,
            "type": "IMPORT",
            "supply": "SCARCE",
            "activity": "WEAK",
            "purchasePrice": 4702,
            "sellPrice": 2332
        }"#;
        let good2_json = r#"{
            "symbol": "FUEL",
            "tradeVolume": 180,
            "type": "EXCHANGE",
            "supply": "MODERATE",
            "purchasePrice": 72,
            "sellPrice": 68
        }"#;
        let good1: MarketTradeGood = serde_json::from_str(good1_json).unwrap();
        let good2: MarketTradeGood = serde_json::from_str(good2_json).unwrap();
        assert_eq!(good1.symbol, "FOOD");
        assert_eq!(good2.symbol, "FUEL");
        assert!(good2.activity.is_none());
    }

    #[test]
    fn test_supply_order() {
        use MarketSupply::*;
        assert!(Scarce < Limited);
        assert!(Moderate < High);
        assert!(High < Abundant);
    }
}
