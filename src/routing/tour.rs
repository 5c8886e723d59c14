use crate::errors::Result;
use crate::models::{ShipFlightMode, WaypointSymbol};
use crate::routing::{plan_route, RouteStep, ShipProfile, SystemGraph};
use crate::util::round2;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TourLeg {
    pub from: WaypointSymbol,
    pub to: WaypointSymbol,
    pub mode: ShipFlightMode,
    pub distance: f64,
    pub fuel: i64,
    pub seconds: i64,
}

/// An ordered visit sequence for one ship. Tours over two or more stops
/// close back to the start; a single stop is a stationary posting.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tour {
    pub stops: Vec<WaypointSymbol>,
    pub legs: Vec<TourLeg>,
    pub total_distance: f64,
    pub total_fuel: i64,
    pub total_seconds: i64,
}

impl Tour {
    pub fn is_stationary(&self) -> bool {
        self.stops.len() <= 1
    }
}

/// Pairwise travel-time matrix over `nodes`, derived from full routes (so
/// mandatory refuel detours are priced in), assuming a full tank per leg.
fn duration_matrix(
    graph: &SystemGraph,
    nodes: &[WaypointSymbol],
    profile: &ShipProfile,
) -> Result<BTreeMap<(WaypointSymbol, WaypointSymbol), i64>> {
    let full = ShipProfile { current_fuel: profile.fuel_capacity, ..*profile };
    let mut matrix = BTreeMap::new();
    for a in nodes {
        for b in nodes {
            if a == b {
                matrix.insert((a.clone(), b.clone()), 0);
                continue;
            }
            let route = plan_route(graph, a, b, &full)?;
            matrix.insert((a.clone(), b.clone()), route.total_seconds);
        }
    }
    Ok(matrix)
}

fn order_cost(
    matrix: &BTreeMap<(WaypointSymbol, WaypointSymbol), i64>,
    start: &WaypointSymbol,
    order: &[WaypointSymbol],
    close_tour: bool,
) -> i64 {
    let mut cost = 0;
    let mut prev = start;
    for stop in order {
        cost += matrix[&(prev.clone(), stop.clone())];
        prev = stop;
    }
    if close_tour && !order.is_empty() {
        cost += matrix[&(prev.clone(), start.clone())];
    }
    cost
}

/// Single-ship tour: nearest-neighbour construction followed by 2-opt.
pub fn plan_tour(
    graph: &SystemGraph,
    start: &WaypointSymbol,
    stops: &[WaypointSymbol],
    profile: &ShipProfile,
) -> Result<Tour> {
    let mut stops: Vec<WaypointSymbol> = stops.to_vec();
    stops.sort();
    stops.dedup();

    if stops.is_empty() {
        return Ok(Tour::default());
    }
    if stops.len() == 1 {
        return Ok(Tour { stops, ..Tour::default() });
    }

    let mut nodes = stops.clone();
    if !nodes.contains(start) {
        nodes.push(start.clone());
    }
    let matrix = duration_matrix(graph, &nodes, profile)?;

    // nearest neighbour from the start
    let mut order: Vec<WaypointSymbol> = Vec::with_capacity(stops.len());
    let mut remaining = stops.clone();
    let mut cursor = start.clone();
    while !remaining.is_empty() {
        let (idx, _) = remaining
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| (matrix[&(cursor.clone(), (*s).clone())], (*s).clone()))
            .expect("remaining is non-empty");
        cursor = remaining.remove(idx);
        order.push(cursor.clone());
    }

    // 2-opt until no reversal improves the closed tour
    let mut improved = true;
    while improved {
        improved = false;
        for i in 0..order.len() {
            for j in i + 1..order.len() {
                let mut candidate = order.clone();
                candidate[i..=j].reverse();
                if order_cost(&matrix, start, &candidate, true)
                    < order_cost(&matrix, start, &order, true)
                {
                    order = candidate;
                    improved = true;
                }
            }
        }
    }

    build_tour(graph, start, order, profile)
}

fn build_tour(
    graph: &SystemGraph,
    start: &WaypointSymbol,
    order: Vec<WaypointSymbol>,
    profile: &ShipProfile,
) -> Result<Tour> {
    let full = ShipProfile { current_fuel: profile.fuel_capacity, ..*profile };
    let mut tour = Tour { stops: order, ..Tour::default() };
    let mut legs = Vec::new();
    let mut prev = start.clone();
    let mut waypoints: Vec<WaypointSymbol> = tour.stops.clone();
    waypoints.push(start.clone()); // tours return to start
    for stop in &waypoints {
        if *stop == prev {
            continue;
        }
        let route = plan_route(graph, &prev, stop, &full)?;
        let mode = route
            .travel_steps()
            .filter_map(|s| match s {
                RouteStep::Travel { mode, distance, .. } => Some((*mode, *distance)),
                _ => None,
            })
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(mode, _)| mode)
            .unwrap_or(ShipFlightMode::Cruise);
        legs.push(TourLeg {
            from: prev.clone(),
            to: stop.clone(),
            mode,
            distance: route.total_distance,
            fuel: route.total_fuel,
            seconds: route.total_seconds,
        });
        tour.total_distance = round2(tour.total_distance + route.total_distance);
        tour.total_fuel += route.total_fuel;
        tour.total_seconds += route.total_seconds;
        prev = stop.clone();
    }
    tour.legs = legs;
    Ok(tour)
}

/// Execution order when the ship already sits on one of the tour's stops:
/// the optimized order rotated to begin at the current stop.
pub fn rotate_at(order: &[WaypointSymbol], current: &WaypointSymbol) -> Vec<WaypointSymbol> {
    match order.iter().position(|s| s == current) {
        Some(idx) => {
            let mut rotated = order[idx..].to_vec();
            rotated.extend_from_slice(&order[..idx]);
            rotated
        }
        None => order.to_vec(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::routing::graph::test_fixtures::{graph, waypoint};

    fn sym(s: &str) -> WaypointSymbol {
        WaypointSymbol::new(s)
    }

    fn profile() -> ShipProfile {
        ShipProfile {
            fuel_capacity: 800,
            current_fuel: 800,
            engine_speed: 30,
            preferred_mode: ShipFlightMode::Burn,
        }
    }

    #[test]
    fn test_tour_visits_each_stop_once_and_returns_to_start() {
        let g = graph(vec![
            waypoint("X1-S1-A1", 0, 0, true),
            waypoint("X1-S1-M1", 100, 0, true),
            waypoint("X1-S1-M2", 100, 100, true),
            waypoint("X1-S1-M3", 0, 100, true),
        ]);
        let stops = vec![sym("X1-S1-M2"), sym("X1-S1-M1"), sym("X1-S1-M3")];
        let tour = plan_tour(&g, &sym("X1-S1-A1"), &stops, &profile()).unwrap();
        assert_eq!(tour.stops.len(), 3);
        assert_eq!(tour.legs.len(), 4); // 3 stops + closing leg
        assert_eq!(tour.legs.last().unwrap().to, sym("X1-S1-A1"));
        // square corners: the optimal sweep avoids the diagonal
        assert_eq!(
            tour.stops,
            vec![sym("X1-S1-M1"), sym("X1-S1-M2"), sym("X1-S1-M3")]
        );
        assert_eq!(
            tour.total_seconds,
            tour.legs.iter().map(|l| l.seconds).sum::<i64>()
        );
    }

    #[test]
    fn test_single_stop_tour_is_stationary() {
        let g = graph(vec![
            waypoint("X1-S1-A1", 0, 0, true),
            waypoint("X1-S1-M1", 100, 0, true),
        ]);
        let tour =
            plan_tour(&g, &sym("X1-S1-A1"), &[sym("X1-S1-M1")], &profile()).unwrap();
        assert!(tour.is_stationary());
        assert!(tour.legs.is_empty());
    }

    #[test]
    fn test_rotation_at_current_stop() {
        let order = vec![sym("X1-S1-M1"), sym("X1-S1-M2"), sym("X1-S1-M3")];
        assert_eq!(
            rotate_at(&order, &sym("X1-S1-M2")),
            vec![sym("X1-S1-M2"), sym("X1-S1-M3"), sym("X1-S1-M1")]
        );
        // not on the tour: order unchanged
        assert_eq!(rotate_at(&order, &sym("X1-S1-Z9")), order);
    }
}
