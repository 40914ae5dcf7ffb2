//! # Circuit Breaker Module
//!
//! Stops calling the OCR engine for a while after it fails repeatedly, so a
//! broken Tesseract install does not cost every request a full timeout.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::ocr_config::RecoveryConfig;

/// Circuit breaker for OCR operations
///
/// ```text
/// CLOSED ────failures ≥ threshold────► OPEN
///    ▲                                   │
///    └────────── reset timeout ──────────┘
/// ```
///
/// The breaker opens once `circuit_breaker_threshold` consecutive failures
/// have been recorded and closes again after `circuit_breaker_reset_secs`
/// without new failures, letting the next request probe the engine.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    config: RecoveryConfig,
}

#[derive(Debug, Default)]
struct BreakerState {
    failure_count: u32,
    last_failure_time: Option<Instant>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration
    ///
    /// ```rust
    /// use reaction_finder::ocr_config::RecoveryConfig;
    /// use reaction_finder::circuit_breaker::CircuitBreaker;
    ///
    /// let circuit_breaker = CircuitBreaker::new(RecoveryConfig::default());
    /// assert!(!circuit_breaker.is_open());
    /// ```
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            state: Mutex::new(BreakerState::default()),
            config,
        }
    }

    /// Check if circuit breaker is open (blocking requests)
    ///
    /// Resets the counters once the reset timeout has elapsed.
    pub fn is_open(&self) -> bool {
        let mut state = self.state.lock();

        if state.failure_count >= self.config.circuit_breaker_threshold {
            if let Some(last_time) = state.last_failure_time {
                if last_time.elapsed() < Duration::from_secs(self.config.circuit_breaker_reset_secs) {
                    return true;
                }
                *state = BreakerState::default();
            }
        }
        false
    }

    /// Record a failure to increment the failure counter
    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        state.failure_count += 1;
        state.last_failure_time = Some(Instant::now());
    }

    /// Record a success to reset the failure counter
    pub fn record_success(&self) {
        *self.state.lock() = BreakerState::default();
    }

    /// Current number of consecutive failures
    pub fn failure_count(&self) -> u32 {
        self.state.lock().failure_count
    }
}
