//! Provisioning lifecycle.
//!
//! Every resource moves through the same states:
//!
//! ```text
//! NotPresent -> Creating -> WaitingReady -> Finalizing -> Ready
//! ```
//!
//! `Failed` can be reached from any state before `Ready` and is never left.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Stage of a single resource's provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionState {
    /// Nothing exists yet.
    NotPresent,
    /// Backing state and the primary workload are being created.
    Creating,
    /// Polling the workload's readiness signal.
    WaitingReady,
    /// Extracting artifacts and checking downstream health.
    Finalizing,
    /// Fully provisioned.
    Ready,
    /// A step failed.
    Failed,
}

impl ProvisionState {
    /// The state that follows this one on success.
    fn next(self) -> Option<Self> {
        match self {
            Self::NotPresent => Some(Self::Creating),
            Self::Creating => Some(Self::WaitingReady),
            Self::WaitingReady => Some(Self::Finalizing),
            Self::Finalizing => Some(Self::Ready),
            Self::Ready | Self::Failed => None,
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }
}

impl fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotPresent => "not present",
            Self::Creating => "creating",
            Self::WaitingReady => "waiting for ready",
            Self::Finalizing => "finalizing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Tracks one resource through the lifecycle, keeping every state visited.
#[derive(Debug, Clone)]
pub struct StateMachine {
    resource: String,
    history: Vec<ProvisionState>,
}

impl StateMachine {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            history: vec![ProvisionState::NotPresent],
        }
    }

    pub fn state(&self) -> ProvisionState {
        self.history
            .last()
            .copied()
            .unwrap_or(ProvisionState::NotPresent)
    }

    /// Every state visited, oldest first.
    pub fn history(&self) -> &[ProvisionState] {
        &self.history
    }

    /// Move to `next`, which must directly follow the current state.
    pub fn advance(&mut self, next: ProvisionState) -> Result<()> {
        let current = self.state();
        if current.next() != Some(next) {
            return Err(Error::Transition {
                from: current,
                to: next,
            });
        }
        log::debug!("{}: {current} -> {next}", self.resource);
        self.history.push(next);
        Ok(())
    }

    /// Move to `Failed` unless the resource is already terminal.
    pub fn fail(&mut self) {
        let current = self.state();
        if current.is_terminal() {
            return;
        }
        log::debug!("{}: {current} -> failed", self.resource);
        self.history.push(ProvisionState::Failed);
    }
}

/// Timing of the lifecycle's blocking steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionOptions {
    /// Upper bound on waiting for the readiness signal.
    pub start_timeout: Duration,
    /// Upper bound on downstream health checks.
    pub health_timeout: Duration,
    /// Sleep between readiness polls.
    pub poll_interval: Duration,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            start_timeout: Duration::from_secs(120),
            health_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Poll `check` until it reports true or `timeout` elapses.
///
/// Returns `Ok(false)` on timeout. An error from `check` ends the wait
/// immediately. `check` always runs at least once.
pub fn wait_for<F>(timeout: Duration, interval: Duration, mut check: F) -> anyhow::Result<bool>
where
    F: FnMut() -> anyhow::Result<bool>,
{
    let start = Instant::now();
    loop {
        if check()? {
            return Ok(true);
        }
        if start.elapsed() >= timeout {
            return Ok(false);
        }
        thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_happy_path() {
        let mut machine = StateMachine::new("k8s_cluster.k3s");
        for state in [
            ProvisionState::Creating,
            ProvisionState::WaitingReady,
            ProvisionState::Finalizing,
            ProvisionState::Ready,
        ] {
            machine.advance(state).unwrap();
        }
        assert_eq!(machine.state(), ProvisionState::Ready);
        assert_eq!(machine.history().len(), 5);
    }

    #[test]
    fn test_skipping_a_state_is_rejected() {
        let mut machine = StateMachine::new("k8s_cluster.k3s");
        let err = machine.advance(ProvisionState::WaitingReady).unwrap_err();
        assert!(matches!(
            err,
            Error::Transition {
                from: ProvisionState::NotPresent,
                to: ProvisionState::WaitingReady
            }
        ));
        assert_eq!(machine.state(), ProvisionState::NotPresent);
    }

    #[test]
    fn test_failed_is_absorbing() {
        let mut machine = StateMachine::new("k8s_cluster.k3s");
        machine.advance(ProvisionState::Creating).unwrap();
        machine.fail();
        assert_eq!(machine.state(), ProvisionState::Failed);

        assert!(machine.advance(ProvisionState::WaitingReady).is_err());
        machine.fail();
        assert_eq!(
            machine.history(),
            &[
                ProvisionState::NotPresent,
                ProvisionState::Creating,
                ProvisionState::Failed
            ]
        );
    }

    #[test]
    fn test_ready_cannot_fail() {
        let mut machine = StateMachine::new("k8s_cluster.k3s");
        machine.advance(ProvisionState::Creating).unwrap();
        machine.advance(ProvisionState::WaitingReady).unwrap();
        machine.advance(ProvisionState::Finalizing).unwrap();
        machine.advance(ProvisionState::Ready).unwrap();
        machine.fail();
        assert_eq!(machine.state(), ProvisionState::Ready);
    }

    #[test]
    fn test_default_options() {
        let options = ProvisionOptions::default();
        assert_eq!(options.start_timeout, Duration::from_secs(120));
        assert_eq!(options.health_timeout, Duration::from_secs(60));
        assert_eq!(options.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_wait_for_eventual_success() {
        let attempts = Cell::new(0);
        let ready = wait_for(Duration::from_secs(5), Duration::from_millis(1), || {
            attempts.set(attempts.get() + 1);
            Ok(attempts.get() == 3)
        })
        .unwrap();
        assert!(ready);
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_wait_for_timeout() {
        let attempts = Cell::new(0);
        let ready = wait_for(Duration::from_millis(20), Duration::from_millis(5), || {
            attempts.set(attempts.get() + 1);
            Ok(false)
        })
        .unwrap();
        assert!(!ready);
        assert!(attempts.get() >= 2);
    }

    #[test]
    fn test_wait_for_error_stops_polling() {
        let attempts = Cell::new(0);
        let result = wait_for(Duration::from_secs(5), Duration::from_millis(1), || {
            attempts.set(attempts.get() + 1);
            anyhow::bail!("logs unavailable")
        });
        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }
}
