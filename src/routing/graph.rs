use crate::models::{SystemSymbol, Waypoint, WaypointSymbol};
use crate::util;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Normal,
    Orbital,
}

#[derive(Debug, Clone, Copy)]
pub struct GraphEdge {
    pub kind: EdgeKind,
    pub distance: f64,
}

/// Immutable waypoint graph for one system. Orbital parent/child and
/// same-parent sibling pairs are zero-distance; every other pair derives its
/// distance from coordinates.
#[derive(Debug, Clone)]
pub struct SystemGraph {
    system_symbol: SystemSymbol,
    waypoints: BTreeMap<WaypointSymbol, Waypoint>,
    orbital_pairs: BTreeSet<(WaypointSymbol, WaypointSymbol)>,
}

impl SystemGraph {
    pub fn new(system_symbol: SystemSymbol, waypoints: Vec<Waypoint>) -> SystemGraph {
        let mut waypoint_map = BTreeMap::new();
        let mut orbital_pairs = BTreeSet::new();
        for waypoint in &waypoints {
            waypoint_map.insert(waypoint.symbol.clone(), waypoint.clone());
        }
        for parent in &waypoints {
            for child in parent.orbital_symbols() {
                orbital_pairs.insert((parent.symbol.clone(), child.clone()));
                orbital_pairs.insert((child.clone(), parent.symbol.clone()));
                // moons of the same parent sit at the parent's coordinates
                for sibling in parent.orbital_symbols() {
                    if sibling != child {
                        orbital_pairs.insert((child.clone(), sibling.clone()));
                    }
                }
            }
        }
        SystemGraph {
            system_symbol,
            waypoints: waypoint_map,
            orbital_pairs,
        }
    }

    pub fn system_symbol(&self) -> &SystemSymbol {
        &self.system_symbol
    }

    pub fn waypoint(&self, symbol: &WaypointSymbol) -> Option<&Waypoint> {
        self.waypoints.get(symbol)
    }

    pub fn waypoints(&self) -> impl Iterator<Item = &Waypoint> {
        self.waypoints.values()
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn is_orbital_pair(&self, a: &WaypointSymbol, b: &WaypointSymbol) -> bool {
        self.orbital_pairs.contains(&(a.clone(), b.clone()))
    }

    /// Edge between two distinct waypoints. Absence of a stored edge means
    /// "derive the distance from coordinates".
    pub fn edge(&self, a: &WaypointSymbol, b: &WaypointSymbol) -> Option<GraphEdge> {
        if a == b {
            return None;
        }
        let wa = self.waypoints.get(a)?;
        let wb = self.waypoints.get(b)?;
        if self.is_orbital_pair(a, b) {
            Some(GraphEdge { kind: EdgeKind::Orbital, distance: 0.0 })
        } else {
            Some(GraphEdge {
                kind: EdgeKind::Normal,
                distance: util::distance(wa, wb),
            })
        }
    }

    pub fn market_symbols(&self) -> Vec<WaypointSymbol> {
        self.waypoints
            .values()
            .filter(|w| w.is_market())
            .map(|w| w.symbol.clone())
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use super::*;
    use crate::models::{WaypointOrbital, WaypointTrait};

    pub fn waypoint(symbol: &str, x: i64, y: i64, fuel: bool) -> Waypoint {
        let symbol = WaypointSymbol::new(symbol);
        Waypoint {
            system_symbol: symbol.system(),
            symbol,
            waypoint_type: "PLANET".to_string(),
            x,
            y,
            traits: if fuel {
                vec![WaypointTrait { symbol: "MARKETPLACE".to_string() }]
            } else {
                vec![]
            },
            orbitals: vec![],
        }
    }

    pub fn with_orbitals(mut w: Waypoint, orbitals: &[&str]) -> Waypoint {
        w.orbitals = orbitals
            .iter()
            .map(|s| WaypointOrbital { symbol: WaypointSymbol::new(s) })
            .collect();
        w
    }

    pub fn graph(waypoints: Vec<Waypoint>) -> SystemGraph {
        SystemGraph::new(SystemSymbol::new("X1-S1"), waypoints)
    }
}

#[cfg(test)]
mod test {
    use super::test_fixtures::*;
    use super::*;

    #[test]
    fn test_orbital_edges_are_zero_distance() {
        let parent = with_orbitals(
            waypoint("X1-S1-A1", 10, 10, true),
            &["X1-S1-A1M", "X1-S1-A1N"],
        );
        let moon_a = waypoint("X1-S1-A1M", 10, 10, false);
        let moon_b = waypoint("X1-S1-A1N", 10, 10, false);
        let far = waypoint("X1-S1-B2", 40, 50, false);
        let graph = graph(vec![parent, moon_a, moon_b, far]);

        // parent <-> child, both directions
        let e = graph
            .edge(&WaypointSymbol::new("X1-S1-A1"), &WaypointSymbol::new("X1-S1-A1M"))
            .unwrap();
        assert_eq!(e.kind, EdgeKind::Orbital);
        assert_eq!(e.distance, 0.0);
        let e = graph
            .edge(&WaypointSymbol::new("X1-S1-A1M"), &WaypointSymbol::new("X1-S1-A1"))
            .unwrap();
        assert_eq!(e.kind, EdgeKind::Orbital);

        // sibling moons
        let e = graph
            .edge(&WaypointSymbol::new("X1-S1-A1M"), &WaypointSymbol::new("X1-S1-A1N"))
            .unwrap();
        assert_eq!(e.kind, EdgeKind::Orbital);
        assert_eq!(e.distance, 0.0);

        // unrelated pair derives Euclidean distance
        let e = graph
            .edge(&WaypointSymbol::new("X1-S1-A1"), &WaypointSymbol::new("X1-S1-B2"))
            .unwrap();
        assert_eq!(e.kind, EdgeKind::Normal);
        assert_eq!(e.distance, 50.0);
    }

    #[test]
    fn test_self_edge_is_none() {
        let graph = graph(vec![waypoint("X1-S1-A1", 0, 0, true)]);
        assert!(graph
            .edge(&WaypointSymbol::new("X1-S1-A1"), &WaypointSymbol::new("X1-S1-A1"))
            .is_none());
    }
}
