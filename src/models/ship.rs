use crate::models::{SystemSymbol, WaypointSymbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// API-authoritative ship state. Never persisted as ground truth; always
/// refreshed through the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ship {
    pub symbol: String,
    pub nav: ShipNav,
    pub fuel: ShipFuel,
    pub engine: ShipEngine,
    pub cargo: ShipCargo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipNav {
    pub system_symbol: SystemSymbol,
    pub waypoint_symbol: WaypointSymbol,
    pub route: ShipNavRoute,
    pub status: ShipNavStatus,
    pub flight_mode: ShipFlightMode,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ShipFlightMode {
    #[serde(rename = "CRUISE")]
    Cruise,
    #[serde(rename = "BURN")]
    Burn,
    #[serde(rename = "DRIFT")]
    Drift,
    #[serde(rename = "STEALTH")]
    Stealth,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ShipNavStatus {
    #[serde(rename = "DOCKED")]
    Docked,
    #[serde(rename = "IN_TRANSIT")]
    InTransit,
    #[serde(rename = "IN_ORBIT")]
    InOrbit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipNavRoute {
    pub origin: ShipNavRouteWaypoint,
    pub destination: ShipNavRouteWaypoint,
    pub arrival: DateTime<Utc>,
    pub departure_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipNavRouteWaypoint {
    pub symbol: WaypointSymbol,
    #[serde(rename = "type")]
    pub waypoint_type: String,
    pub system_symbol: SystemSymbol,
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipFuel {
    pub current: i64,
    pub capacity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipEngine {
    pub symbol: String,
    pub speed: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipCargo {
    pub capacity: i64,
    pub units: i64,
    pub inventory: Vec<ShipCargoItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipCargoItem {
    pub symbol: String,
    pub units: i64,
}

impl Ship {
    pub fn cargo_space_available(&self) -> i64 {
        self.cargo.capacity - self.cargo.units
    }

    pub fn cargo_good_count(&self, good: &str) -> i64 {
        self.cargo
            .inventory
            .iter()
            .find(|g| g.symbol == *good)
            .map(|g| g.units)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ship_deserialize() {
        let json = r#"{
            "symbol": "AGENT-1",
            "nav": {
                "systemSymbol": "X1-S1",
                "waypointSymbol": "X1-S1-A1",
                "route": {
                    "origin": {"symbol": "X1-S1-A1", "type": "PLANET", "systemSymbol": "X1-S1", "x": 0, "y": 0},
                    "destination": {"symbol": "X1-S1-A1", "type": "PLANET", "systemSymbol": "X1-S1", "x": 0, "y": 0},
                    "arrival": "2024-02-04T11:37:29.703Z",
                    "departureTime": "2024-02-04T11:37:29.703Z"
                },
                "status": "DOCKED",
                "flightMode": "CRUISE"
            },
            "fuel": {"current": 400, "capacity": 400},
            "engine": {"symbol": "ENGINE_ION_DRIVE_II", "speed": 30},
            "cargo": {"capacity": 40, "units": 5, "inventory": [{"symbol": "FUEL", "units": 5}]}
        }"#;
        let ship: Ship = serde_json::from_str(json).unwrap();
        assert_eq!(ship.nav.status, ShipNavStatus::Docked);
        assert_eq!(ship.cargo_space_available(), 35);
        assert_eq!(ship.cargo_good_count("FUEL"), 5);
        assert_eq!(ship.cargo_good_count("IRON_ORE"), 0);
    }
}
