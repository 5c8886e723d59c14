use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure surfaced by the daemon. Each variant carries a stable wire
/// code so the RPC frontend can return compact `{code, message}` pairs.
#[derive(Debug, Error)]
pub enum Error {
    // validation
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("unknown method: {0}")]
    UnknownMethod(String),
    #[error("invalid params: {0}")]
    InvalidParams(String),

    // entities
    #[error("player not found: {0}")]
    PlayerNotFound(String),
    #[error("ship not found: {0}")]
    ShipNotFound(String),
    #[error("shipyard not found: {0}")]
    ShipyardNotFound(String),
    #[error("no shipyard in system sells {0}")]
    NoShipyardFound(String),
    #[error("waypoint not found: {0}")]
    WaypointNotFound(String),
    #[error("contract not found: {0}")]
    ContractNotFound(String),

    // preconditions
    #[error("ship must be docked")]
    ShipNotDocked,
    #[error("ship must be in orbit")]
    ShipNotInOrbit,
    #[error("insufficient credits: need {required}, have {available}")]
    InsufficientCredits { required: i64, available: i64 },
    #[error("insufficient cargo space: need {required}, have {available}")]
    InsufficientCargoSpace { required: i64, available: i64 },
    #[error("ship type not available at shipyard: {0}")]
    ShipTypeNotAvailable(String),

    // routing
    #[error("no route found after exploring {steps_explored} states")]
    NoRouteFound {
        steps_explored: usize,
        hint: Option<String>,
    },
    #[error("no waypoints cached for system {0}; run a waypoint sync first")]
    EmptyWaypointCache(String),
    #[error("route has no travel steps")]
    RouteHasNoTravelSteps,

    // remote
    #[error("circuit breaker is open")]
    CircuitOpen,
    #[error("rate limit budget exhausted")]
    RateLimitedExhausted,
    #[error("remote api unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("max retries exceeded after {attempts} attempts: {last}")]
    MaxRetriesExceeded { attempts: u32, last: String },
    #[error("remote returned client error {status}: {body}")]
    Http4xx { status: u16, body: String },
    #[error("remote returned server error {status}")]
    Http5xx { status: u16 },

    // concurrency
    #[error("operation canceled")]
    OperationCanceled,
    #[error("operation timed out")]
    Timeout,

    // infrastructure
    #[error("io error: {0}")]
    Io(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Stable wire code, matched by operators and by the CLI wrapper.
    pub fn code(&self) -> &'static str {
        match self {
            Error::MalformedRequest(_) => "MalformedRequest",
            Error::UnknownMethod(_) => "UnknownMethod",
            Error::InvalidParams(_) => "InvalidParams",
            Error::PlayerNotFound(_) => "PlayerNotFound",
            Error::ShipNotFound(_) => "ShipNotFound",
            Error::ShipyardNotFound(_) => "ShipyardNotFound",
            Error::NoShipyardFound(_) => "NoShipyardFound",
            Error::WaypointNotFound(_) => "WaypointNotFound",
            Error::ContractNotFound(_) => "ContractNotFound",
            Error::ShipNotDocked => "ShipNotDocked",
            Error::ShipNotInOrbit => "ShipNotInOrbit",
            Error::InsufficientCredits { .. } => "InsufficientCredits",
            Error::InsufficientCargoSpace { .. } => "InsufficientCargoSpace",
            Error::ShipTypeNotAvailable(_) => "ShipTypeNotAvailable",
            Error::NoRouteFound { .. } => "NoRouteFound",
            Error::EmptyWaypointCache(_) => "EmptyWaypointCache",
            Error::RouteHasNoTravelSteps => "RouteHasNoTravelSteps",
            Error::CircuitOpen => "CircuitOpen",
            Error::RateLimitedExhausted => "RateLimitedExhausted",
            Error::RemoteUnavailable(_) => "RemoteUnavailable",
            Error::MaxRetriesExceeded { .. } => "MaxRetriesExceeded",
            Error::Http4xx { .. } => "Http4xx",
            Error::Http5xx { .. } => "Http5xx",
            Error::OperationCanceled => "OperationCanceled",
            Error::Timeout => "Timeout",
            Error::Io(_) => "Io",
            Error::Database(_) => "Database",
            Error::Serialization(_) => "Serialization",
        }
    }

    /// Transient errors make the supervisor restart the container with
    /// backoff; everything else is terminal for the container.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Http5xx { .. }
                | Error::RemoteUnavailable(_)
                | Error::MaxRetriesExceeded { .. }
                | Error::RateLimitedExhausted
                | Error::Timeout
                | Error::Database(_)
        )
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Error::OperationCanceled)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(Error::CircuitOpen.code(), "CircuitOpen");
        assert_eq!(
            Error::Http4xx { status: 404, body: "".into() }.code(),
            "Http4xx"
        );
        assert_eq!(
            Error::NoRouteFound { steps_explored: 3, hint: None }.code(),
            "NoRouteFound"
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::Http5xx { status: 503 }.is_transient());
        assert!(Error::Timeout.is_transient());
        assert!(!Error::CircuitOpen.is_transient());
        assert!(!Error::ShipNotDocked.is_transient());
        assert!(!Error::OperationCanceled.is_transient());
        assert!(Error::OperationCanceled.is_canceled());
    }
}
