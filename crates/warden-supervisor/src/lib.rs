//! # warden-supervisor
//!
//! Supervision of external processes:
//! - [`ProcessHandle`]: launches one process at a time, watches it exit and
//!   relaunches it according to its spec;
//! - [`should_restart`] / [`decide`]: the restart policy;
//! - [`Supervisor`]: a named registry of handles;
//! - [`SuperviseRecord`]: the flattened form kept by external stores;
//! - [`config`]: YAML configuration for the host binary.
//!
//! ```no_run
//! use warden_spec::{ProcessSpec, SupervisionOptions};
//! use warden_supervisor::ProcessHandle;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let spec = ProcessSpec::new("/usr/bin/worker --once", SupervisionOptions {
//!     auto_restart: true,
//!     max_retries: 3,
//!     ..Default::default()
//! })?;
//!
//! let handle = ProcessHandle::new(spec)?;
//! handle.start()?;
//! handle.wait_terminal().await;
//! println!("exit code {}", handle.exit_code());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod handle;
pub mod record;
pub mod registry;

pub use engine::{decide, should_restart, RestartDecision};
pub use handle::ProcessHandle;
pub use record::{parse_environment, parse_exit_codes, RunStatus, SuperviseForm, SuperviseRecord};
pub use registry::Supervisor;
pub use warden_state::{ProcessState, StateTransition};
