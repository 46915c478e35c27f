//! # warden-state
//!
//! Lifecycle of a supervised process:
//!
//! ```text
//! Idle ──start──▶ Running ──exit──▶ Exited ──restart──▶ Restarting ──launch──▶ Running
//!                    ▲                 │                    │
//!                    │                 ▼                    ▼
//!                    └────start──── Terminal ◀───failure────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use warden_common::{ProcessError, ProcessResult};

/// Transitions kept per machine; older ones are discarded.
pub const MAX_HISTORY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Never launched.
    Idle,
    /// A generation is alive.
    Running,
    /// The current generation exited; the restart decision is pending.
    Exited,
    /// Relaunching after an exit.
    Restarting,
    /// Supervision ended. Only an explicit start leaves this state.
    Terminal,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::Idle => write!(f, "idle"),
            ProcessState::Running => write!(f, "running"),
            ProcessState::Exited => write!(f, "exited"),
            ProcessState::Restarting => write!(f, "restarting"),
            ProcessState::Terminal => write!(f, "terminal"),
        }
    }
}

impl ProcessState {
    /// States from which `start()` launches a new generation.
    pub fn can_start(&self) -> bool {
        matches!(self, ProcessState::Idle | ProcessState::Terminal)
    }

    /// States in which a generation is alive or about to be.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ProcessState::Running | ProcessState::Exited | ProcessState::Restarting
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessState::Terminal)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from_state: ProcessState,
    pub to_state: ProcessState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Validated state machine with a bounded transition history.
#[derive(Debug, Clone)]
pub struct ProcessStateMachine {
    process_id: String,
    current_state: ProcessState,
    previous_state: Option<ProcessState>,
    history: VecDeque<StateTransition>,
    last_transition_time: DateTime<Utc>,
}

impl ProcessStateMachine {
    pub fn new(process_id: impl Into<String>) -> Self {
        Self {
            process_id: process_id.into(),
            current_state: ProcessState::Idle,
            previous_state: None,
            history: VecDeque::new(),
            last_transition_time: Utc::now(),
        }
    }

    pub fn current_state(&self) -> ProcessState {
        self.current_state
    }

    pub fn previous_state(&self) -> Option<ProcessState> {
        self.previous_state
    }

    pub fn is_valid_transition(&self, target: ProcessState) -> bool {
        use ProcessState::*;

        matches!(
            (self.current_state, target),
            (Idle, Running)
                | (Running, Exited)
                | (Exited, Restarting)
                | (Exited, Terminal)
                | (Restarting, Running)
                | (Restarting, Terminal)
                | (Terminal, Running)
        )
    }

    pub fn transition_to(
        &mut self,
        target: ProcessState,
        reason: Option<String>,
    ) -> ProcessResult<()> {
        if !self.is_valid_transition(target) {
            return Err(ProcessError::invalid_state(
                &self.process_id,
                self.current_state.to_string(),
                target.to_string(),
            ));
        }

        let now = Utc::now();
        let from = self.current_state;
        self.history.push_back(StateTransition {
            from_state: from,
            to_state: target,
            timestamp: now,
            reason,
        });
        while self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }

        self.previous_state = Some(from);
        self.current_state = target;
        self.last_transition_time = now;

        tracing::debug!(
            process = %self.process_id,
            from = %from,
            to = %target,
            "State transition"
        );

        Ok(())
    }

    /// Oldest first.
    pub fn history(&self) -> Vec<StateTransition> {
        self.history.iter().cloned().collect()
    }

    pub fn last_transition(&self) -> Option<&StateTransition> {
        self.history.back()
    }

    pub fn last_transition_time(&self) -> DateTime<Utc> {
        self.last_transition_time
    }

    pub fn time_in_current_state(&self) -> chrono::Duration {
        Utc::now() - self.last_transition_time
    }

    pub fn count_transitions_to(&self, state: ProcessState) -> usize {
        self.history.iter().filter(|t| t.to_state == state).count()
    }
}
