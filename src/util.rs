use crate::models::ShipFlightMode;

pub const BASE_NAV_SECONDS: i64 = 15;
pub const DEPARTURE_SECONDS: i64 = 10;
pub const ORBITAL_HOP_SECONDS: i64 = 1;

// Trait for types that have x,y coordinates
pub trait Coord {
    fn x(&self) -> i64;
    fn y(&self) -> i64;
}

impl Coord for crate::models::Waypoint {
    fn x(&self) -> i64 {
        self.x
    }
    fn y(&self) -> i64 {
        self.y
    }
}

/// Euclidean distance rounded to 2 decimals.
pub fn distance<T: Coord>(a: &T, b: &T) -> f64 {
    let d2 = ((a.x() - b.x()).pow(2) + (a.y() - b.y()).pow(2)) as f64;
    round2(d2.sqrt())
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Fuel burned travelling `distance` in `flight_mode`. Zero-distance hops
/// (orbital siblings) are free in every mode.
pub fn fuel_cost(flight_mode: ShipFlightMode, distance: f64) -> i64 {
    if distance <= 0.0 {
        return 0;
    }
    let units = distance.ceil() as i64;
    match flight_mode {
        ShipFlightMode::Burn => 2 * units,
        ShipFlightMode::Cruise | ShipFlightMode::Stealth => units.max(1),
        ShipFlightMode::Drift => ((distance / 250.0).ceil() as i64).max(1),
    }
}

/// Travel seconds for `distance` at `speed` in `flight_mode`.
pub fn travel_seconds(flight_mode: ShipFlightMode, speed: i64, distance: f64) -> i64 {
    if distance <= 0.0 {
        return ORBITAL_HOP_SECONDS;
    }
    let speed = speed.max(1) as f64;
    match flight_mode {
        ShipFlightMode::Cruise | ShipFlightMode::Stealth => {
            (distance / speed).floor() as i64 + BASE_NAV_SECONDS + DEPARTURE_SECONDS
        }
        ShipFlightMode::Burn => {
            (distance / (2.0 * speed)).floor() as i64 + BASE_NAV_SECONDS + DEPARTURE_SECONDS
        }
        ShipFlightMode::Drift => (distance / (speed / 10.0)).floor() as i64 + DEPARTURE_SECONDS,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct P(i64, i64);
    impl Coord for P {
        fn x(&self) -> i64 {
            self.0
        }
        fn y(&self) -> i64 {
            self.1
        }
    }

    #[test]
    fn test_distance_rounding() {
        assert_eq!(distance(&P(0, 0), &P(100, 0)), 100.0);
        assert_eq!(distance(&P(0, 0), &P(1, 1)), 1.41);
        assert_eq!(distance(&P(3, 0), &P(0, 4)), 5.0);
    }

    #[test]
    fn test_fuel_cost() {
        assert_eq!(fuel_cost(ShipFlightMode::Cruise, 100.0), 100);
        assert_eq!(fuel_cost(ShipFlightMode::Cruise, 0.5), 1);
        assert_eq!(fuel_cost(ShipFlightMode::Burn, 100.0), 200);
        assert_eq!(fuel_cost(ShipFlightMode::Drift, 1000.0), 4);
        assert_eq!(fuel_cost(ShipFlightMode::Drift, 10.0), 1);
        assert_eq!(fuel_cost(ShipFlightMode::Burn, 0.0), 0);
    }

    #[test]
    fn test_travel_seconds() {
        // d=100 at speed 30: burn = floor(100/60) + 25 = 26
        assert_eq!(travel_seconds(ShipFlightMode::Burn, 30, 100.0), 26);
        assert_eq!(travel_seconds(ShipFlightMode::Cruise, 10, 100.0), 35);
        assert_eq!(travel_seconds(ShipFlightMode::Cruise, 30, 0.0), 1);
        assert_eq!(travel_seconds(ShipFlightMode::Drift, 10, 100.0), 110);
    }
}
