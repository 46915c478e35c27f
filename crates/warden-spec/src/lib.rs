//! # warden-spec
//!
//! The declarative side of supervision: [`ProcessSpec`] says what to run and
//! how to react when it exits. Specs are validated once, at construction, and
//! are immutable afterwards.

pub mod command_line;
pub mod spec;

pub use command_line::split_command_line;
pub use spec::{ProcessSpec, StopBehavior, SupervisionOptions};

// Re-exported so a spec can be built from this crate alone.
pub use warden_output::{ExitEvent, OutputLine, OutputSinks, StreamType};
pub use warden_process::SecureCredential;
