//! Error types for the warden supervisor.
//!
//! Three families exist, matching the three places a supervised process can
//! go wrong:
//!
//! - [`ConfigurationError`]: the description of the process is malformed.
//!   Raised while building a spec and never retried.
//! - [`LaunchError`]: the operating system refused to start the process.
//!   Returned synchronously from `start()` and never retried automatically.
//! - [`ProcessError`]: the umbrella used by registry and control operations.
//!
//! Restart exhaustion is not an error: it is reported through the
//! handle's state.
//!
//! # Example
//! ```
//! use warden_common::{ConfigurationError, ProcessError, ProcessResult};
//!
//! fn parse(command: &str) -> ProcessResult<()> {
//!     if command.trim().is_empty() {
//!         return Err(ConfigurationError::EmptyCommand.into());
//!     }
//!     Ok(())
//! }
//!
//! assert!(matches!(parse(""), Err(ProcessError::Configuration(_))));
//! ```

use std::io;
use thiserror::Error;

/// Result type for process operations.
pub type ProcessResult<T> = std::result::Result<T, ProcessError>;

/// A process description that can never be launched as written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The command line tokenized to zero arguments.
    #[error("Command line is empty")]
    EmptyCommand,

    /// A quoted run was opened and never closed.
    #[error("Unterminated {quote} quote in command line: {command}")]
    UnterminatedQuote { quote: char, command: String },

    /// A process name contained characters outside `[A-Za-z0-9_.-]`.
    #[error("Invalid process name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// An exit code in transport form was not an integer.
    #[error("Invalid exit code '{value}'")]
    InvalidExitCode { value: String },

    /// An environment chunk in transport form was not `key=value`.
    #[error("Invalid environment entry '{entry}': expected key=value")]
    InvalidEnvironment { entry: String },

    /// Any other contradictory or missing field.
    #[error("Invalid configuration for '{id}': {reason}")]
    Invalid { id: String, reason: String },
}

impl ConfigurationError {
    pub fn invalid(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// The operating system refused to start a process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Spawning failed: missing executable, permission denied, bad working
    /// directory, or a uid/gid switch the supervisor is not allowed to make.
    #[error("Failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The impersonation identity could not be applied.
    #[error("Credential for '{username}' rejected: {reason}")]
    Credential { username: String, reason: String },

    /// `start()` was called outside a Tokio runtime.
    #[error("No async runtime available to supervise '{program}'")]
    NoRuntime { program: String },
}

impl LaunchError {
    pub fn spawn(program: impl Into<String>, source: io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    pub fn credential(username: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Credential {
            username: username.into(),
            reason: reason.into(),
        }
    }

    /// The I/O error kind behind a spawn failure, if any.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Spawn { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

/// Umbrella error for control and registry operations.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error("Process not found: {id}")]
    NotFound { id: String },

    #[error("Process already exists: {id}")]
    AlreadyExists { id: String },

    /// Delivering a signal failed for a reason other than the target being gone.
    #[error("Failed to signal process {id} (pid {pid}): {reason}")]
    Signal { id: String, pid: u32, reason: String },

    /// A lifecycle transition the state machine does not allow.
    #[error("Invalid state transition for {id}: {from} -> {to}")]
    InvalidState { id: String, from: String, to: String },
}

impl ProcessError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn already_exists(id: impl Into<String>) -> Self {
        Self::AlreadyExists { id: id.into() }
    }

    pub fn signal(id: impl Into<String>, pid: u32, reason: impl Into<String>) -> Self {
        Self::Signal {
            id: id.into(),
            pid,
            reason: reason.into(),
        }
    }

    pub fn invalid_state(
        id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            id: id.into(),
            from: from.into(),
            to: to.into(),
        }
    }
}
