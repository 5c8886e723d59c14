use crate::models::{SystemSymbol, WaypointSymbol};
use serde::{Deserialize, Serialize};

/// A system waypoint, immutable once loaded for a system snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waypoint {
    pub symbol: WaypointSymbol,
    pub system_symbol: SystemSymbol,
    #[serde(rename = "type")]
    pub waypoint_type: String,
    pub x: i64,
    pub y: i64,
    #[serde(default)]
    pub traits: Vec<WaypointTrait>,
    #[serde(default)]
    pub orbitals: Vec<WaypointOrbital>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaypointTrait {
    pub symbol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaypointOrbital {
    pub symbol: WaypointSymbol,
}

impl Waypoint {
    pub fn has_trait(&self, trait_symbol: &str) -> bool {
        self.traits.iter().any(|t| t.symbol == trait_symbol)
    }

    pub fn is_market(&self) -> bool {
        self.has_trait("MARKETPLACE")
    }

    pub fn is_shipyard(&self) -> bool {
        self.has_trait("SHIPYARD")
    }

    // Fuel is sold at every marketplace and at dedicated fuel stations
    pub fn has_fuel(&self) -> bool {
        self.is_market() || self.waypoint_type == "FUEL_STATION"
    }

    pub fn orbital_symbols(&self) -> impl Iterator<Item = &WaypointSymbol> {
        self.orbitals.iter().map(|o| &o.symbol)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_waypoint_deserialize() {
        let json = r#"{
            "symbol": "X1-S1-A1",
            "systemSymbol": "X1-S1",
            "type": "PLANET",
            "x": 10,
            "y": -4,
            "traits": [{"symbol": "MARKETPLACE"}, {"symbol": "SHIPYARD"}],
            "orbitals": [{"symbol": "X1-S1-A1M"}]
        }"#;
        let waypoint: Waypoint = serde_json::from_str(json).unwrap();
        assert!(waypoint.is_market());
        assert!(waypoint.is_shipyard());
        assert!(waypoint.has_fuel());
        assert_eq!(
            waypoint.orbital_symbols().collect::<Vec<_>>(),
            vec![&WaypointSymbol::new("X1-S1-A1M")]
        );
    }

    #[test]
    fn test_fuel_station_has_fuel_without_market() {
        let json = r#"{
            "symbol": "X1-S1-F1",
            "systemSymbol": "X1-S1",
            "type": "FUEL_STATION",
            "x": 0,
            "y": 0
        }"#;
        let waypoint: Waypoint = serde_json::from_str(json).unwrap();
        assert!(!waypoint.is_market());
        assert!(waypoint.has_fuel());
    }
}
