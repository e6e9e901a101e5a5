//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down, requests fail fast
//! - Half-Open: cooldown elapsed, a single probe request is allowed
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= failure_threshold
//! Open → Half-Open: can_send_request after cooldown since last failure
//! Half-Open → Closed: probe request succeeds
//! Half-Open → Open: probe request fails
//! ```
//!
//! # Design Decisions
//! - Per-backend circuit breaker (not global)
//! - Fail fast in Open state (no waiting for timeout)
//! - Single probe in Half-Open (prevents hammering recovering backend)
//! - Cooldown measured from the most recent failure, not from entering Open

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use url::Url;

use crate::observability::metrics;
use crate::resilience::clock::Clock;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    /// Only meaningful outside Closed.
    last_failure: Option<Instant>,
    probe_sent: bool,
}

/// Point-in-time view of a breaker, for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub url: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
}

/// Health gate for a single backend URL.
#[derive(Debug)]
pub struct CircuitBreaker {
    url: Url,
    failure_threshold: u32,
    cooldown: Duration,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a closed breaker. A zero threshold is treated as 1.
    pub fn new(url: Url, failure_threshold: u32, cooldown: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            url,
            failure_threshold: failure_threshold.max(1),
            cooldown,
            clock,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure: None,
                probe_sent: false,
            }),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            url: self.url.to_string(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
        }
    }

    /// Decide whether a request may go to this backend right now.
    ///
    /// Returning `false` never changes state. When the cooldown has elapsed
    /// on an open breaker, the breaker moves to half-open and the approving
    /// call consumes the single probe.
    pub fn can_send_request(&self) -> bool {
        let mut inner = self.lock();
        let state = inner.state;
        match state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let now = self.clock.now();
                let cooled_down = inner
                    .last_failure
                    .map(|at| now.saturating_duration_since(at) >= self.cooldown)
                    .unwrap_or(true);
                if !cooled_down {
                    return false;
                }
                inner.state = CircuitState::HalfOpen;
                inner.probe_sent = true;
                drop(inner);
                self.transitioned(CircuitState::Open, CircuitState::HalfOpen);
                true
            }
            CircuitState::HalfOpen => {
                if inner.probe_sent {
                    false
                } else {
                    inner.probe_sent = true;
                    true
                }
            }
        }
    }

    /// Record that an approved request succeeded.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        let previous = inner.state;
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.probe_sent = false;
        drop(inner);

        if previous != CircuitState::Closed {
            self.transitioned(previous, CircuitState::Closed);
        }
    }

    /// Record that an approved request failed.
    pub fn record_failure(&self) {
        let now = self.clock.now();
        let mut inner = self.lock();
        let previous = inner.state;
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.last_failure = Some(now);

        // A half-open breaker has already seen threshold failures, so any
        // probe failure lands here too.
        if inner.consecutive_failures >= self.failure_threshold {
            inner.state = CircuitState::Open;
            inner.probe_sent = false;
        }
        let current = inner.state;
        let failures = inner.consecutive_failures;
        drop(inner);

        if previous != current {
            self.transitioned(previous, current);
        } else {
            tracing::debug!(
                backend = %self.url,
                state = %current,
                consecutive_failures = failures,
                "Backend failure recorded"
            );
        }
    }

    fn transitioned(&self, from: CircuitState, to: CircuitState) {
        match to {
            CircuitState::Open => tracing::warn!(
                backend = %self.url,
                from = %from,
                cooldown_secs = self.cooldown.as_secs(),
                "Circuit opened"
            ),
            _ => tracing::info!(backend = %self.url, from = %from, to = %to, "Circuit state changed"),
        }
        metrics::record_breaker_transition(self.url.as_str(), to);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().expect("circuit breaker mutex poisoned")
    }
}
