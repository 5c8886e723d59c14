pub mod graph;
pub mod planner;
pub mod tour;
pub mod vrp;

pub use graph::{EdgeKind, GraphEdge, SystemGraph};
pub use planner::{plan_route, ShipProfile};
pub use tour::{plan_tour, rotate_at, Tour, TourLeg};
pub use vrp::{partition_markets, FleetShip, ShipAssignment};

use crate::models::{ShipFlightMode, WaypointSymbol};
use serde::{Deserialize, Serialize};

/// A planner-produced step. Routes never contain DRIFT travel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteStep {
    Travel {
        from: WaypointSymbol,
        to: WaypointSymbol,
        mode: ShipFlightMode,
        fuel_cost: i64,
        distance: f64,
        seconds: i64,
    },
    Refuel { at: WaypointSymbol },
}

impl RouteStep {
    pub fn is_travel(&self) -> bool {
        matches!(self, RouteStep::Travel { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub steps: Vec<RouteStep>,
    pub total_fuel: i64,
    pub total_distance: f64,
    pub total_seconds: i64,
}

impl Route {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn travel_steps(&self) -> impl Iterator<Item = &RouteStep> {
        self.steps.iter().filter(|s| s.is_travel())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_route_serde_round_trip() {
        let route = Route {
            steps: vec![
                RouteStep::Refuel { at: WaypointSymbol::new("X1-S1-A1") },
                RouteStep::Travel {
                    from: WaypointSymbol::new("X1-S1-A1"),
                    to: WaypointSymbol::new("X1-S1-B2"),
                    mode: ShipFlightMode::Burn,
                    fuel_cost: 200,
                    distance: 100.0,
                    seconds: 26,
                },
            ],
            total_fuel: 200,
            total_distance: 100.0,
            total_seconds: 27,
        };
        let json = serde_json::to_string(&route).unwrap();
        let back: Route = serde_json::from_str(&json).unwrap();
        assert_eq!(route, back);
    }
}
