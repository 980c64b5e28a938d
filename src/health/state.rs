//! Backend health state machine.
//!
//! # States
//! - Healthy: backend receives traffic
//! - Suspect: at least one consecutive failed probe, still on the ring
//! - Evicted: removed from registry and ring; tracking ends
//!
//! # State Transitions
//! ```text
//! Healthy → Suspect: probe fails, failures < failure_threshold
//! Suspect → Evicted: consecutive failures >= failure_threshold
//! Suspect → Healthy: probe succeeds (failure counter resets)
//! Healthy → Evicted: failure_threshold == 1
//! ```
//!
//! # Design Decisions
//! - Hysteresis prevents flapping
//! - Evicted is terminal; re-registration starts a fresh record

use std::time::Instant;

/// Health of a registered backend as seen by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Suspect,
    Evicted,
}

/// What a probe result did to a backend's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    BecameSuspect,
    Recovered,
    Evicted,
}

/// Per-backend tracking record.
#[derive(Debug, Clone)]
pub struct BackendHealth {
    state: HealthState,
    consecutive_failures: u32,
    last_checked: Option<Instant>,
}

impl BackendHealth {
    pub fn new() -> Self {
        Self {
            state: HealthState::Healthy,
            consecutive_failures: 0,
            last_checked: None,
        }
    }

    pub fn state(&self) -> HealthState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_checked(&self) -> Option<Instant> {
        self.last_checked
    }

    /// Record a successful probe.
    pub fn record_success(&mut self, now: Instant) -> Transition {
        self.last_checked = Some(now);
        self.consecutive_failures = 0;
        match self.state {
            HealthState::Suspect => {
                self.state = HealthState::Healthy;
                Transition::Recovered
            }
            HealthState::Healthy | HealthState::Evicted => Transition::Unchanged,
        }
    }

    /// Record a failed probe. `failure_threshold` below 1 is treated as 1.
    pub fn record_failure(&mut self, failure_threshold: u32, now: Instant) -> Transition {
        self.last_checked = Some(now);
        if self.state == HealthState::Evicted {
            return Transition::Unchanged;
        }

        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures >= failure_threshold.max(1) {
            self.state = HealthState::Evicted;
            Transition::Evicted
        } else if self.state == HealthState::Healthy {
            self.state = HealthState::Suspect;
            Transition::BecameSuspect
        } else {
            Transition::Unchanged
        }
    }
}

impl Default for BackendHealth {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_one_evicts_on_first_failure() {
        let mut health = BackendHealth::new();
        assert_eq!(health.record_failure(1, Instant::now()), Transition::Evicted);
        assert_eq!(health.state(), HealthState::Evicted);
    }

    #[test]
    fn test_suspect_then_evicted_at_threshold() {
        let mut health = BackendHealth::new();
        let now = Instant::now();
        assert_eq!(health.record_failure(3, now), Transition::BecameSuspect);
        assert_eq!(health.record_failure(3, now), Transition::Unchanged);
        assert_eq!(health.state(), HealthState::Suspect);
        assert_eq!(health.consecutive_failures(), 2);
        assert_eq!(health.record_failure(3, now), Transition::Evicted);
        assert_eq!(health.last_checked(), Some(now));
    }

    #[test]
    fn test_success_from_suspect_recovers_and_resets() {
        let mut health = BackendHealth::new();
        let now = Instant::now();
        health.record_failure(3, now);
        health.record_failure(3, now);
        assert_eq!(health.record_success(now), Transition::Recovered);
        assert_eq!(health.state(), HealthState::Healthy);
        assert_eq!(health.consecutive_failures(), 0);

        // Counting starts over: two more failures do not evict.
        health.record_failure(3, now);
        assert_eq!(health.record_failure(3, now), Transition::Unchanged);
        assert_eq!(health.state(), HealthState::Suspect);
    }

    #[test]
    fn test_evicted_is_terminal() {
        let mut health = BackendHealth::new();
        let now = Instant::now();
        health.record_failure(1, now);
        assert_eq!(health.record_success(now), Transition::Unchanged);
        assert_eq!(health.record_failure(1, now), Transition::Unchanged);
        assert_eq!(health.state(), HealthState::Evicted);
    }

    #[test]
    fn test_zero_threshold_behaves_like_one() {
        let mut health = BackendHealth::new();
        assert_eq!(health.record_failure(0, Instant::now()), Transition::Evicted);
    }
}
