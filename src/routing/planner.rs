use crate::errors::{Error, Result};
use crate::models::{ShipFlightMode, WaypointSymbol};
use crate::routing::{Route, RouteStep, SystemGraph};
use crate::util::{fuel_cost, travel_seconds, ORBITAL_HOP_SECONDS};
use std::cell::Cell;

/// Fuel kept in reserve when arriving at a waypoint that cannot refuel us.
pub const FUEL_SAFETY_RESERVE: i64 = 4;
/// Time charged for a scheduled refuel stop.
const REFUEL_SECONDS: i64 = 1;

#[derive(Debug, Clone, Copy)]
pub struct ShipProfile {
    pub fuel_capacity: i64,
    pub current_fuel: i64,
    pub engine_speed: i64,
    pub preferred_mode: ShipFlightMode,
}

impl ShipProfile {
    /// BURN is only offered when the caller asked for it; DRIFT and STEALTH
    /// requests degrade to CRUISE-only planning.
    fn allow_burn(&self) -> bool {
        self.preferred_mode == ShipFlightMode::Burn
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SearchState {
    waypoint: WaypointSymbol,
    fuel: i64,
}

/// Fuel-aware single-source search over the system graph.
///
/// States are (waypoint, fuel) pairs; travel edges exist in BURN and CRUISE
/// where the tank suffices, and a refuel pseudo-edge tops the tank up at any
/// fuel-bearing waypoint. DRIFT is never inserted. Arrival at a waypoint
/// without fuel must keep `FUEL_SAFETY_RESERVE` units in the tank, except on
/// zero-distance orbital hops.
pub fn plan_route(
    graph: &SystemGraph,
    start: &WaypointSymbol,
    goal: &WaypointSymbol,
    profile: &ShipProfile,
) -> Result<Route> {
    let start_wp = graph
        .waypoint(start)
        .ok_or_else(|| Error::WaypointNotFound(start.to_string()))?;
    graph
        .waypoint(goal)
        .ok_or_else(|| Error::WaypointNotFound(goal.to_string()))?;

    if start == goal {
        return Ok(Route::default());
    }

    let explored = Cell::new(0usize);
    let initial = SearchState {
        waypoint: start.clone(),
        fuel: profile.current_fuel.min(profile.fuel_capacity),
    };

    let result = pathfinding::directed::dijkstra::dijkstra(
        &initial,
        |state| {
            let mut edges: Vec<(SearchState, i64)> = Vec::new();
            let here = match graph.waypoint(&state.waypoint) {
                Some(w) => w,
                None => return edges,
            };
            for other in graph.waypoints() {
                if other.symbol == state.waypoint {
                    continue;
                }
                let edge = match graph.edge(&state.waypoint, &other.symbol) {
                    Some(e) => e,
                    None => continue,
                };
                if edge.distance == 0.0 {
                    // orbital hop: free in fuel, exempt from the reserve rule
                    edges.push((
                        SearchState { waypoint: other.symbol.clone(), fuel: state.fuel },
                        ORBITAL_HOP_SECONDS,
                    ));
                    continue;
                }
                let reserve = if other.has_fuel() { 0 } else { FUEL_SAFETY_RESERVE };
                let mut modes = vec![ShipFlightMode::Cruise];
                if profile.allow_burn() {
                    modes.push(ShipFlightMode::Burn);
                }
                for mode in modes {
                    let cost = fuel_cost(mode, edge.distance);
                    if state.fuel - cost >= reserve {
                        edges.push((
                            SearchState {
                                waypoint: other.symbol.clone(),
                                fuel: state.fuel - cost,
                            },
                            travel_seconds(mode, profile.engine_speed, edge.distance),
                        ));
                    }
                }
            }
            if here.has_fuel() && state.fuel < profile.fuel_capacity {
                edges.push((
                    SearchState {
                        waypoint: state.waypoint.clone(),
                        fuel: profile.fuel_capacity,
                    },
                    REFUEL_SECONDS,
                ));
            }
            // one for the expanded state, plus every candidate it generated
            explored.set(explored.get() + 1 + edges.len());
            edges
        },
        |state| state.waypoint == *goal,
    );

    let (path, _total_seconds) = match result {
        Some(found) => found,
        None => {
            return Err(Error::NoRouteFound {
                steps_explored: explored.get(),
                hint: Some(format!("{} -> {}", start, goal)),
            })
        }
    };

    let mut route = reconstruct(graph, profile, &path);

    // Opportunistic top-up before departure: worth a stop when the direct
    // cruise cost would eat into the safety reserve. Skipped on a full tank.
    let direct = graph
        .edge(start, goal)
        .map(|e| fuel_cost(ShipFlightMode::Cruise, e.distance))
        .unwrap_or(0);
    let starts_with_refuel = matches!(route.steps.first(), Some(RouteStep::Refuel { .. }));
    if !starts_with_refuel
        && start_wp.has_fuel()
        && profile.current_fuel < profile.fuel_capacity
        && profile.current_fuel - direct < FUEL_SAFETY_RESERVE
    {
        route.steps.insert(0, RouteStep::Refuel { at: start.clone() });
        route.total_seconds += REFUEL_SECONDS;
    }

    Ok(route)
}

fn reconstruct(graph: &SystemGraph, profile: &ShipProfile, path: &[SearchState]) -> Route {
    let mut route = Route::default();
    for pair in path.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if prev.waypoint == next.waypoint {
            debug_assert!(next.fuel > prev.fuel);
            route.steps.push(RouteStep::Refuel { at: prev.waypoint.clone() });
            route.total_seconds += REFUEL_SECONDS;
            continue;
        }
        let edge = graph
            .edge(&prev.waypoint, &next.waypoint)
            .expect("path edge must exist");
        let spent = prev.fuel - next.fuel;
        let mode = if edge.distance == 0.0 || spent < fuel_cost(ShipFlightMode::Burn, edge.distance)
        {
            ShipFlightMode::Cruise
        } else {
            ShipFlightMode::Burn
        };
        let seconds = travel_seconds(mode, profile.engine_speed, edge.distance);
        route.steps.push(RouteStep::Travel {
            from: prev.waypoint.clone(),
            to: next.waypoint.clone(),
            mode,
            fuel_cost: spent,
            distance: edge.distance,
            seconds,
        });
        route.total_fuel += spent;
        route.total_distance = crate::util::round2(route.total_distance + edge.distance);
        route.total_seconds += seconds;
    }
    route
}
