/// Circuit breaker with consecutive-failure tracking
///
/// State transitions:
/// - Closed → Open: consecutive failures reach `fail_max`
/// - Open → HalfOpen: `reset_timeout` elapsed since the last failure
/// - HalfOpen → Closed: the single probe succeeds
/// - HalfOpen → Open: the single probe fails
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, requests pass through
    Closed,
    /// Circuit is open, requests fail fast
    Open,
    /// Testing if the upstream recovered, a single probe allowed
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failure count that opens the circuit
    pub fail_max: u32,
    /// Duration to wait after the last failure before allowing a probe
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            fail_max: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E: std::error::Error> {
    #[error("circuit breaker '{0}' is open - failing fast")]
    Open(String),
    #[error(transparent)]
    Inner(E),
}

struct BreakerState {
    current: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    probe_in_flight: bool,
}

/// Shared per-upstream breaker; cheap to clone across request handlers.
#[derive(Clone)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Arc<Mutex<BreakerState>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Arc::new(Mutex::new(BreakerState {
                current: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure: None,
                probe_in_flight: false,
            })),
        }
    }

    /// Execute a future with circuit breaker protection.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error,
    {
        if !self.try_acquire() {
            return Err(CircuitBreakerError::Open(self.name.clone()));
        }

        match f().await {
            Ok(result) => {
                self.record_success();
                Ok(result)
            }
            Err(e) => {
                self.record_failure();
                Err(CircuitBreakerError::Inner(e))
            }
        }
    }

    fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();

        match state.current {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = state
                    .last_failure
                    .map(|at| at.elapsed() >= self.config.reset_timeout)
                    .unwrap_or(true);
                if elapsed {
                    info!(breaker = %self.name, "circuit breaker: open -> half-open");
                    state.current = CircuitState::HalfOpen;
                    state.probe_in_flight = true;
                    true
                } else {
                    false
                }
            }
            // One probe at a time while half-open
            CircuitState::HalfOpen => {
                if state.probe_in_flight {
                    false
                } else {
                    state.probe_in_flight = true;
                    true
                }
            }
        }
    }

    fn record_success(&self) {
        let mut state = self.state.lock();
        state.consecutive_failures = 0;
        state.probe_in_flight = false;

        if state.current != CircuitState::Closed {
            info!(breaker = %self.name, "circuit breaker: -> closed");
            state.current = CircuitState::Closed;
        }
    }

    fn record_failure(&self) {
        let mut state = self.state.lock();
        state.consecutive_failures += 1;
        state.last_failure = Some(Instant::now());
        state.probe_in_flight = false;

        match state.current {
            CircuitState::Closed => {
                if state.consecutive_failures >= self.config.fail_max {
                    warn!(
                        breaker = %self.name,
                        failures = state.consecutive_failures,
                        "circuit breaker: closed -> open"
                    );
                    state.current = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => {
                warn!(breaker = %self.name, "circuit breaker: half-open -> open (probe failed)");
                state.current = CircuitState::Open;
            }
            CircuitState::Open => {}
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state, for monitoring endpoints.
    pub fn state(&self) -> CircuitState {
        self.state.lock().current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    fn breaker(fail_max: u32, reset_timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                fail_max,
                reset_timeout,
            },
        )
    }

    #[tokio::test]
    async fn closed_to_open_on_consecutive_failures() {
        let cb = breaker(3, Duration::from_secs(60));

        for _ in 0..3 {
            let _ = cb.call(|| async { Err::<(), _>(Boom) }).await;
        }
        assert_eq!(cb.state(), CircuitState::Open);

        // Next call short-circuits without running the closure.
        let result = cb
            .call(|| async {
                panic!("upstream must not be contacted while open");
                #[allow(unreachable_code)]
                Ok::<(), Boom>(())
            })
            .await;
        assert!(matches!(result, Err(CircuitBreakerError::Open(_))));
    }

    #[tokio::test]
    async fn upstream_4xx_equivalent_success_resets_counter() {
        let cb = breaker(3, Duration::from_secs(60));

        for _ in 0..2 {
            let _ = cb.call(|| async { Err::<(), _>(Boom) }).await;
        }
        let _ = cb.call(|| async { Ok::<(), Boom>(()) }).await;
        for _ in 0..2 {
            let _ = cb.call(|| async { Err::<(), _>(Boom) }).await;
        }
        // Only two consecutive failures since the success.
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn open_allows_single_probe_after_timeout() {
        let cb = breaker(2, Duration::from_millis(50));

        for _ in 0..2 {
            let _ = cb.call(|| async { Err::<(), _>(Boom) }).await;
        }
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(80)).await;

        let probe = cb.call(|| async { Ok::<(), Boom>(()) }).await;
        assert!(probe.is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_probe_failure_reopens() {
        let cb = breaker(2, Duration::from_millis(50));

        for _ in 0..2 {
            let _ = cb.call(|| async { Err::<(), _>(Boom) }).await;
        }
        tokio::time::sleep(Duration::from_millis(80)).await;

        let _ = cb.call(|| async { Err::<(), _>(Boom) }).await;
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn open_rejects_before_timeout() {
        let cb = breaker(1, Duration::from_secs(60));

        let _ = cb.call(|| async { Err::<(), _>(Boom) }).await;
        assert_eq!(cb.state(), CircuitState::Open);

        let result = cb.call(|| async { Ok::<(), Boom>(()) }).await;
        assert!(matches!(result, Err(CircuitBreakerError::Open(_))));
    }
}
