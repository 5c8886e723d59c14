use crate::errors::{Error, Result};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const FAILURE_THRESHOLD: u32 = 5;
pub const OPEN_DURATION: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed { failures: u32 },
    Open { since: Instant },
    HalfOpen,
}

/// Fast-fail gate around the remote API. One failed request *sequence*
/// (after the gateway's retries are exhausted) counts as one failure; K
/// consecutive failures open the circuit for `open_duration`, after which a
/// single probe is let through.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    open_duration: Duration,
    state: Mutex<State>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        CircuitBreaker::new(FAILURE_THRESHOLD, OPEN_DURATION)
    }
}

impl CircuitBreaker {
    pub fn new(threshold: u32, open_duration: Duration) -> CircuitBreaker {
        CircuitBreaker {
            threshold,
            open_duration,
            state: Mutex::new(State::Closed { failures: 0 }),
        }
    }

    /// Gate a call. Must be invoked before touching the rate limiter or the
    /// socket; `CircuitOpen` means neither was touched.
    pub fn check(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match *state {
            State::Closed { .. } => Ok(()),
            State::Open { since } => {
                if since.elapsed() >= self.open_duration {
                    // let exactly one probe through
                    *state = State::HalfOpen;
                    Ok(())
                } else {
                    Err(Error::CircuitOpen)
                }
            }
            State::HalfOpen => Err(Error::CircuitOpen),
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock().unwrap();
        *state = State::Closed { failures: 0 };
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock().unwrap();
        *state = match *state {
            State::Closed { failures } => {
                let failures = failures + 1;
                if failures >= self.threshold {
                    State::Open { since: Instant::now() }
                } else {
                    State::Closed { failures }
                }
            }
            State::HalfOpen => State::Open { since: Instant::now() },
            open => open,
        };
    }

    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        *state = State::Closed { failures: 0 };
    }

    pub fn is_open(&self) -> bool {
        matches!(*self.state.lock().unwrap(), State::Open { .. })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(5, Duration::from_secs(60));
        for _ in 0..4 {
            breaker.check().unwrap();
            breaker.record_failure();
        }
        breaker.check().unwrap();
        breaker.record_failure();
        assert!(breaker.is_open());
        assert!(matches!(breaker.check(), Err(Error::CircuitOpen)));
    }

    #[test]
    fn test_success_resets_failure_count() {
        let breaker = CircuitBreaker::new(5, Duration::from_secs(60));
        for _ in 0..4 {
            breaker.record_failure();
        }
        breaker.record_success();
        for _ in 0..4 {
            breaker.record_failure();
        }
        assert!(breaker.check().is_ok());
    }

    #[test]
    fn test_half_open_probe_then_close_or_reopen() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(20));
        breaker.record_failure();
        assert!(matches!(breaker.check(), Err(Error::CircuitOpen)));
        std::thread::sleep(Duration::from_millis(30));
        // single probe allowed; a concurrent call is still rejected
        breaker.check().unwrap();
        assert!(matches!(breaker.check(), Err(Error::CircuitOpen)));
        // probe fails: straight back to open
        breaker.record_failure();
        assert!(matches!(breaker.check(), Err(Error::CircuitOpen)));
        std::thread::sleep(Duration::from_millis(30));
        breaker.check().unwrap();
        breaker.record_success();
        assert!(breaker.check().is_ok());
        assert!(breaker.check().is_ok());
    }

    #[test]
    fn test_manual_reset() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(60));
        breaker.record_failure();
        assert!(matches!(breaker.check(), Err(Error::CircuitOpen)));
        breaker.reset();
        assert!(breaker.check().is_ok());
    }
}
