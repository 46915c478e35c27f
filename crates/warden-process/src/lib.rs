//! # Warden Process
//!
//! Cross-platform process primitives used by the supervisor:
//! - launching a child with piped output ([`spawn_supervised`])
//! - liveness probing by PID ([`process_exists`])
//! - graceful and forced termination ([`terminate_gracefully`], [`force_kill`])
//! - exit status decoding ([`exit_code_of`])
//! - impersonation credentials ([`SecureCredential`])

pub mod check;
pub mod credential;
pub mod execute;
pub mod exit;
pub mod terminate;

pub use check::process_exists;
pub use credential::SecureCredential;
pub use execute::{spawn_supervised, LaunchRequest};
pub use exit::{exit_code_of, SIGNAL_EXIT_BASE};
pub use terminate::{force_kill, terminate_gracefully, SignalOutcome};
