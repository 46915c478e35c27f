//! Restart policy.
//!
//! Evaluated once per exit, inside the exit monitor of the generation that
//! exited. `retry_count` already includes that exit.

use serde::{Deserialize, Serialize};
use std::fmt;
use warden_spec::{ProcessSpec, StopBehavior};

/// Outcome of the restart policy for one exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartDecision {
    Restart,
    /// The exit code is in the acceptable set.
    CleanExit,
    AutoRestartDisabled,
    /// `retry_count` went past `max_retries`.
    RetriesExhausted,
    /// The exit followed `stop()` or `kill()` under `StopBehavior::SuppressRestart`.
    StopRequested,
    /// The handle was closed or dropped.
    Closed,
}

impl RestartDecision {
    pub fn is_restart(&self) -> bool {
        matches!(self, RestartDecision::Restart)
    }
}

impl fmt::Display for RestartDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RestartDecision::Restart => "restart",
            RestartDecision::CleanExit => "clean exit",
            RestartDecision::AutoRestartDisabled => "auto restart disabled",
            RestartDecision::RetriesExhausted => "retries exhausted",
            RestartDecision::StopRequested => "stop requested",
            RestartDecision::Closed => "handle closed",
        };
        f.write_str(text)
    }
}

/// The restart predicate: auto restart is on, the exit was abnormal and the
/// retry budget is not used up.
///
/// ```
/// use warden_spec::{ProcessSpec, SupervisionOptions};
/// use warden_supervisor::should_restart;
///
/// let spec = ProcessSpec::new("worker", SupervisionOptions {
///     auto_restart: true,
///     max_retries: 2,
///     ..Default::default()
/// }).unwrap();
///
/// assert!(should_restart(1, &spec, 1));
/// assert!(should_restart(1, &spec, 2));
/// assert!(!should_restart(1, &spec, 3));
/// assert!(!should_restart(0, &spec, 1));
/// ```
pub fn should_restart(exit_code: i32, spec: &ProcessSpec, retry_count: u32) -> bool {
    spec.auto_restart() && !spec.is_acceptable(exit_code) && retry_count <= spec.max_retries()
}

/// Like [`should_restart`], but also weighs a pending stop request and a
/// closed handle, and says why.
pub fn decide(
    exit_code: i32,
    spec: &ProcessSpec,
    retry_count: u32,
    stop_requested: bool,
    closed: bool,
) -> RestartDecision {
    if closed {
        return RestartDecision::Closed;
    }
    if stop_requested && spec.stop_behavior() == StopBehavior::SuppressRestart {
        return RestartDecision::StopRequested;
    }
    if !spec.auto_restart() {
        return RestartDecision::AutoRestartDisabled;
    }
    if spec.is_acceptable(exit_code) {
        return RestartDecision::CleanExit;
    }
    if retry_count > spec.max_retries() {
        return RestartDecision::RetriesExhausted;
    }
    RestartDecision::Restart
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_spec::SupervisionOptions;

    fn spec(auto_restart: bool, codes: Vec<i32>, max_retries: u32, stop: StopBehavior) -> ProcessSpec {
        ProcessSpec::new(
            "worker",
            SupervisionOptions {
                auto_restart,
                acceptable_exit_codes: codes,
                max_retries,
                stop_behavior: stop,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_auto_restart_disabled_never_restarts() {
        let s = spec(false, vec![0], 10, StopBehavior::SuppressRestart);
        for code in [0, 1, 137] {
            assert!(!should_restart(code, &s, 1));
        }
        assert_eq!(decide(1, &s, 1, false, false), RestartDecision::AutoRestartDisabled);
    }

    #[test]
    fn test_acceptable_codes_suppress_restart() {
        let s = spec(true, vec![0, 2], 3, StopBehavior::SuppressRestart);
        assert!(!should_restart(0, &s, 1));
        assert!(!should_restart(2, &s, 1));
        assert!(should_restart(1, &s, 1));
        assert_eq!(decide(2, &s, 1, false, false), RestartDecision::CleanExit);
    }

    #[test]
    fn test_retry_budget_boundary() {
        let s = spec(true, vec![0], 2, StopBehavior::SuppressRestart);
        assert_eq!(decide(1, &s, 1, false, false), RestartDecision::Restart);
        assert_eq!(decide(1, &s, 2, false, false), RestartDecision::Restart);
        assert_eq!(decide(1, &s, 3, false, false), RestartDecision::RetriesExhausted);

        let none = spec(true, vec![0], 0, StopBehavior::SuppressRestart);
        assert!(!should_restart(1, &none, 1));
    }

    #[test]
    fn test_stop_behavior() {
        let suppress = spec(true, vec![0], 3, StopBehavior::SuppressRestart);
        assert_eq!(decide(143, &suppress, 1, true, false), RestartDecision::StopRequested);

        let policy = spec(true, vec![0], 3, StopBehavior::ExitPolicy);
        assert_eq!(decide(143, &policy, 1, true, false), RestartDecision::Restart);
    }

    #[test]
    fn test_closed_wins() {
        let s = spec(true, vec![0], 3, StopBehavior::ExitPolicy);
        assert_eq!(decide(1, &s, 1, false, true), RestartDecision::Closed);
    }

    #[test]
    fn test_decide_agrees_with_predicate() {
        let s = spec(true, vec![0, 3], 2, StopBehavior::SuppressRestart);
        for code in [0, 1, 3, 137] {
            for retry_count in 0..5 {
                assert_eq!(
                    should_restart(code, &s, retry_count),
                    decide(code, &s, retry_count, false, false).is_restart(),
                    "code {} retry_count {}",
                    code,
                    retry_count
                );
            }
        }
    }
}
