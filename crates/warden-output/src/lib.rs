//! # warden-output
//!
//! Routes the stdout and stderr of supervised processes to sinks, one line at
//! a time. Lines from a generation that is no longer current are dropped.

pub mod router;
pub mod sink;
pub mod types;

pub use router::{OutputRouter, OUTPUT_DRAIN_TIMEOUT};
pub use sink::{log_exit, log_line, ExitCallback, LineBuffer, LineCallback, OutputSinks};
pub use types::{ExitEvent, OutputLine, RouterStats, StreamType};
