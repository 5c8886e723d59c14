use crate::errors::Result;
use crate::models::WaypointSymbol;
use crate::routing::{plan_tour, ShipProfile, SystemGraph, Tour};
use rand::rngs::StdRng;
use rand::seq::SliceRandom as _;
use rand::SeedableRng as _;

#[derive(Debug, Clone)]
pub struct FleetShip {
    pub symbol: String,
    pub start: WaypointSymbol,
    pub profile: ShipProfile,
}

#[derive(Debug, Clone)]
pub struct ShipAssignment {
    pub ship_symbol: String,
    pub start: WaypointSymbol,
    pub markets: Vec<WaypointSymbol>,
    pub tour: Tour,
}

impl ShipAssignment {
    pub fn total_seconds(&self) -> i64 {
        self.tour.total_seconds
    }
}

const IMPROVEMENT_ROUNDS: usize = 4;

/// Partition `markets` across `ships` and produce a tour per ship.
///
/// Hard constraints: every market assigned to exactly one ship; no ship left
/// empty unless there are more ships than markets. Objective: minimize the
/// slowest ship's tour time. Deterministic for a fixed seed: ships and
/// markets are processed in sorted order and the improvement pass order is
/// drawn from a seeded rng.
pub fn partition_markets(
    graph: &SystemGraph,
    ships: &[FleetShip],
    markets: &[WaypointSymbol],
    seed: u64,
) -> Result<Vec<ShipAssignment>> {
    let mut markets: Vec<WaypointSymbol> = markets.to_vec();
    markets.sort();
    markets.dedup();

    let mut ships: Vec<FleetShip> = ships.to_vec();
    ships.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    if ships.is_empty() || markets.is_empty() {
        return Ok(ships
            .iter()
            .map(|s| ShipAssignment {
                ship_symbol: s.symbol.clone(),
                start: s.start.clone(),
                markets: vec![],
                tour: Tour::default(),
            })
            .collect());
    }

    // single-ship shortcut: no partitioning to do
    if ships.len() == 1 {
        let ship = &ships[0];
        let tour = plan_tour(graph, &ship.start, &markets, &ship.profile)?;
        return Ok(vec![ShipAssignment {
            ship_symbol: ship.symbol.clone(),
            start: ship.start.clone(),
            markets: tour.stops.clone(),
            tour,
        }]);
    }

    let solver = Solver { graph, ships: &ships };
    let mut assigned: Vec<Vec<WaypointSymbol>> = vec![Vec::new(); ships.len()];

    // seed every ship with its cheapest reachable market so no ship idles
    // while markets remain
    let mut remaining = markets.clone();
    for (idx, ship) in ships.iter().enumerate() {
        if remaining.is_empty() {
            break;
        }
        let (pos, _) = remaining
            .iter()
            .enumerate()
            .min_by_key(|(_, m)| (solver.solo_cost(ship, m), (**m).clone()))
            .expect("remaining is non-empty");
        assigned[idx].push(remaining.remove(pos));
    }

    // greedy: each remaining market goes to the ship whose tour grows least
    for market in remaining {
        let mut best: Option<(usize, i64)> = None;
        for idx in 0..ships.len() {
            let mut candidate = assigned[idx].clone();
            candidate.push(market.clone());
            let cost = solver.tour_seconds(idx, &candidate)?;
            if best.map(|(_, c)| cost < c).unwrap_or(true) {
                best = Some((idx, cost));
            }
        }
        let (idx, _) = best.expect("at least one ship");
        assigned[idx].push(market);
    }

    // local improvement: move single markets between ships while the
    // makespan shrinks
    let mut rng = StdRng::seed_from_u64(seed);
    for _ in 0..IMPROVEMENT_ROUNDS {
        let mut order: Vec<usize> = (0..ships.len()).collect();
        order.shuffle(&mut rng);
        let mut changed = false;
        for &src in &order {
            let makespan = solver.makespan(&assigned)?;
            let src_markets = assigned[src].clone();
            for market in src_markets {
                if assigned[src].len() <= 1 {
                    break; // never empty a ship while markets remain
                }
                for dst in 0..ships.len() {
                    if dst == src {
                        continue;
                    }
                    let mut candidate = assigned.clone();
                    candidate[src].retain(|m| *m != market);
                    candidate[dst].push(market.clone());
                    if solver.makespan(&candidate)? < makespan {
                        assigned = candidate;
                        changed = true;
                        break;
                    }
                }
            }
        }
        if !changed {
            break;
        }
    }

    let mut result = Vec::with_capacity(ships.len());
    for (idx, ship) in ships.iter().enumerate() {
        let tour = plan_tour(graph, &ship.start, &assigned[idx], &ship.profile)?;
        result.push(ShipAssignment {
            ship_symbol: ship.symbol.clone(),
            start: ship.start.clone(),
            markets: tour.stops.clone(),
            tour,
        });
    }
    Ok(result)
}

struct Solver<'a> {
    graph: &'a SystemGraph,
    ships: &'a [FleetShip],
}

impl<'a> Solver<'a> {
    fn solo_cost(&self, ship: &FleetShip, market: &WaypointSymbol) -> i64 {
        let full = ShipProfile {
            current_fuel: ship.profile.fuel_capacity,
            ..ship.profile
        };
        match crate::routing::plan_route(self.graph, &ship.start, market, &full) {
            Ok(route) => route.total_seconds,
            Err(_) => i64::MAX / 2,
        }
    }

    fn tour_seconds(&self, ship_idx: usize, markets: &[WaypointSymbol]) -> Result<i64> {
        let ship = &self.ships[ship_idx];
        if let [market] = markets {
            // a stationary posting still has to fly there once
            return Ok(self.solo_cost(ship, market));
        }
        let tour = plan_tour(self.graph, &ship.start, markets, &ship.profile)?;
        Ok(tour.total_seconds)
    }

    fn makespan(&self, assigned: &[Vec<WaypointSymbol>]) -> Result<i64> {
        let mut max = 0;
        for (idx, markets) in assigned.iter().enumerate() {
            max = max.max(self.tour_seconds(idx, markets)?);
        }
        Ok(max)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::models::ShipFlightMode;
    use crate::routing::graph::test_fixtures::{graph, waypoint};
    use std::collections::BTreeSet;

    fn sym(s: &str) -> WaypointSymbol {
        WaypointSymbol::new(s)
    }

    fn fleet_ship(symbol: &str, start: &str) -> FleetShip {
        FleetShip {
            symbol: symbol.to_string(),
            start: sym(start),
            profile: ShipProfile {
                fuel_capacity: 800,
                current_fuel: 800,
                engine_speed: 30,
                preferred_mode: ShipFlightMode::Burn,
            },
        }
    }

    fn square_graph() -> crate::routing::SystemGraph {
        graph(vec![
            waypoint("X1-S1-A1", 0, 0, true),
            waypoint("X1-S1-B1", 200, 0, true),
            waypoint("X1-S1-C1", 100, 150, true),
        ])
    }

    #[test]
    fn test_partition_covers_markets_exactly_once() {
        let g = square_graph();
        let ships = vec![fleet_ship("SHIP-1", "X1-S1-A1"), fleet_ship("SHIP-2", "X1-S1-B1")];
        let markets = vec![sym("X1-S1-A1"), sym("X1-S1-B1"), sym("X1-S1-C1")];
        let assignments = partition_markets(&g, &ships, &markets, 7).unwrap();

        assert_eq!(assignments.len(), 2);
        let mut seen = BTreeSet::new();
        for assignment in &assignments {
            assert!(!assignment.markets.is_empty());
            for market in &assignment.markets {
                assert!(seen.insert(market.clone()), "market assigned twice");
            }
        }
        assert_eq!(seen, markets.into_iter().collect::<BTreeSet<_>>());
    }

    #[test]
    fn test_partition_is_deterministic_for_a_seed() {
        let g = square_graph();
        let ships = vec![fleet_ship("SHIP-1", "X1-S1-A1"), fleet_ship("SHIP-2", "X1-S1-B1")];
        let markets = vec![sym("X1-S1-A1"), sym("X1-S1-B1"), sym("X1-S1-C1")];
        let a = partition_markets(&g, &ships, &markets, 42).unwrap();
        let b = partition_markets(&g, &ships, &markets, 42).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.ship_symbol, y.ship_symbol);
            assert_eq!(x.markets, y.markets);
        }
    }

    #[test]
    fn test_single_ship_takes_everything() {
        let g = square_graph();
        let ships = vec![fleet_ship("SHIP-1", "X1-S1-A1")];
        let markets = vec![sym("X1-S1-B1"), sym("X1-S1-C1")];
        let assignments = partition_markets(&g, &ships, &markets, 0).unwrap();
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].markets.len(), 2);
    }

    #[test]
    fn test_more_ships_than_markets_leaves_extra_ships_empty() {
        let g = square_graph();
        let ships = vec![
            fleet_ship("SHIP-1", "X1-S1-A1"),
            fleet_ship("SHIP-2", "X1-S1-B1"),
            fleet_ship("SHIP-3", "X1-S1-C1"),
        ];
        let markets = vec![sym("X1-S1-A1"), sym("X1-S1-B1")];
        let assignments = partition_markets(&g, &ships, &markets, 0).unwrap();
        let non_empty = assignments.iter().filter(|a| !a.markets.is_empty()).count();
        assert_eq!(non_empty, 2);
        let total: usize = assignments.iter().map(|a| a.markets.len()).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn test_partition_prefers_local_markets() {
        // two ships on opposite corners: each should keep its own corner
        let g = graph(vec![
            waypoint("X1-S1-A1", 0, 0, true),
            waypoint("X1-S1-A2", 10, 0, true),
            waypoint("X1-S1-B1", 500, 0, true),
            waypoint("X1-S1-B2", 510, 0, true),
        ]);
        let ships = vec![fleet_ship("SHIP-1", "X1-S1-A1"), fleet_ship("SHIP-2", "X1-S1-B1")];
        let markets = vec![
            sym("X1-S1-A1"),
            sym("X1-S1-A2"),
            sym("X1-S1-B1"),
            sym("X1-S1-B2"),
        ];
        let assignments = partition_markets(&g, &ships, &markets, 1).unwrap();
        let ship1 = assignments.iter().find(|a| a.ship_symbol == "SHIP-1").unwrap();
        let ship2 = assignments.iter().find(|a| a.ship_symbol == "SHIP-2").unwrap();
        assert!(ship1.markets.contains(&sym("X1-S1-A1")));
        assert!(ship1.markets.contains(&sym("X1-S1-A2")));
        assert!(ship2.markets.contains(&sym("X1-S1-B1")));
        assert!(ship2.markets.contains(&sym("X1-S1-B2")));
    }
}
