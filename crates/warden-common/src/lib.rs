//! # Warden Common
//!
//! Error types and identifiers shared by every warden crate.

pub mod errors;
pub mod types;

pub use errors::{ConfigurationError, LaunchError, ProcessError, ProcessResult};
pub use types::{ProcessName, MAX_NAME_LEN};
