//! Round-robin selection with liveness skip.

use std::sync::{Arc, Mutex};

use crate::resilience::circuit_breaker::CircuitBreaker;

/// The breakers registered for one service plus its rotating cursor.
///
/// The cursor always stays within `[0, breakers.len())`.
#[derive(Debug)]
pub struct RoundRobin {
    breakers: Vec<Arc<CircuitBreaker>>,
    cursor: Mutex<usize>,
}

impl RoundRobin {
    /// Returns `None` for an empty backend list.
    pub fn new(breakers: Vec<Arc<CircuitBreaker>>) -> Option<Self> {
        if breakers.is_empty() {
            return None;
        }
        Some(Self {
            breakers,
            cursor: Mutex::new(0),
        })
    }

    pub fn breakers(&self) -> &[Arc<CircuitBreaker>] {
        &self.breakers
    }

    pub fn cursor(&self) -> usize {
        *self.cursor.lock().expect("round robin cursor mutex poisoned")
    }

    /// Pick the next eligible breaker, starting at the cursor.
    ///
    /// Scans at most one full cycle. The first breaker that approves is
    /// returned and the cursor moves just past it; later breakers are not
    /// consulted, so no half-open probe is spent needlessly. When nothing
    /// approves the cursor is left where it was.
    pub fn next_server(&self) -> Option<(usize, Arc<CircuitBreaker>)> {
        let mut cursor = self.cursor.lock().expect("round robin cursor mutex poisoned");
        let len = self.breakers.len();
        let start = *cursor;

        for offset in 0..len {
            let index = (start + offset) % len;
            let breaker = &self.breakers[index];
            if breaker.can_send_request() {
                *cursor = (index + 1) % len;
                return Some((index, breaker.clone()));
            }
        }
        None
    }
}
