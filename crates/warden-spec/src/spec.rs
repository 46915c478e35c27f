//! Process specification.

use crate::command_line::split_command_line;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use warden_common::{ConfigurationError, ProcessName};
use warden_output::OutputSinks;
use warden_process::SecureCredential;

/// What an exit caused by `stop()` or `kill()` means for restarts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBehavior {
    /// The exit ends supervision; the handle goes terminal.
    #[default]
    SuppressRestart,
    /// The exit is judged by the restart policy like any other.
    ExitPolicy,
}

/// Everything about a process except its command line.
#[derive(Debug, Clone)]
pub struct SupervisionOptions {
    /// Defaults to the executable's file name.
    pub name: Option<String>,
    pub working_directory: Option<PathBuf>,
    pub environment: BTreeMap<String, String>,
    pub credential: Option<SecureCredential>,
    pub auto_start: bool,
    pub auto_restart: bool,
    pub acceptable_exit_codes: Vec<i32>,
    pub max_retries: u32,
    pub stop_behavior: StopBehavior,
    pub sinks: OutputSinks,
}

impl Default for SupervisionOptions {
    fn default() -> Self {
        Self {
            name: None,
            working_directory: None,
            environment: BTreeMap::new(),
            credential: None,
            auto_start: false,
            auto_restart: false,
            acceptable_exit_codes: vec![0],
            max_retries: 3,
            stop_behavior: StopBehavior::default(),
            sinks: OutputSinks::default(),
        }
    }
}

/// Immutable description of how to launch and supervise one process.
///
/// ```
/// use warden_spec::{ProcessSpec, SupervisionOptions};
///
/// let spec = ProcessSpec::new(
///     "/bin/sh -c 'exit 1'",
///     SupervisionOptions {
///         auto_restart: true,
///         max_retries: 2,
///         ..Default::default()
///     },
/// )
/// .unwrap();
///
/// assert_eq!(spec.name().as_str(), "sh");
/// assert_eq!(spec.argv(), ["/bin/sh", "-c", "exit 1"]);
/// assert!(spec.is_acceptable(0));
/// ```
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    name: ProcessName,
    command: String,
    argv: Vec<String>,
    working_directory: Option<PathBuf>,
    environment: BTreeMap<String, String>,
    credential: Option<SecureCredential>,
    auto_start: bool,
    auto_restart: bool,
    acceptable_exit_codes: BTreeSet<i32>,
    max_retries: u32,
    stop_behavior: StopBehavior,
    sinks: OutputSinks,
}

impl ProcessSpec {
    pub fn new(
        command: impl Into<String>,
        options: SupervisionOptions,
    ) -> Result<Self, ConfigurationError> {
        let command = command.into();
        let argv = split_command_line(&command)?;

        let name = match options.name {
            Some(name) => ProcessName::parse(name)?,
            None => ProcessName::from_program(&argv[0]),
        };

        for (key, value) in &options.environment {
            validate_env_entry(key, value)?;
        }

        Ok(Self {
            name,
            command,
            argv,
            working_directory: options.working_directory,
            environment: options.environment,
            credential: options.credential,
            auto_start: options.auto_start,
            auto_restart: options.auto_restart,
            acceptable_exit_codes: options.acceptable_exit_codes.into_iter().collect(),
            max_retries: options.max_retries,
            stop_behavior: options.stop_behavior,
            sinks: options.sinks,
        })
    }

    pub fn name(&self) -> &ProcessName {
        &self.name
    }

    /// The command line as given.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The tokenized command line; never empty.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    pub fn working_directory(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }

    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    pub fn credential(&self) -> Option<&SecureCredential> {
        self.credential.as_ref()
    }

    pub fn auto_start(&self) -> bool {
        self.auto_start
    }

    pub fn auto_restart(&self) -> bool {
        self.auto_restart
    }

    pub fn acceptable_exit_codes(&self) -> &BTreeSet<i32> {
        &self.acceptable_exit_codes
    }

    pub fn is_acceptable(&self, exit_code: i32) -> bool {
        self.acceptable_exit_codes.contains(&exit_code)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn stop_behavior(&self) -> StopBehavior {
        self.stop_behavior
    }

    pub fn sinks(&self) -> &OutputSinks {
        &self.sinks
    }
}

fn validate_env_entry(key: &str, value: &str) -> Result<(), ConfigurationError> {
    if key.is_empty() || key.contains('=') || key.contains('\0') || value.contains('\0') {
        return Err(ConfigurationError::InvalidEnvironment {
            entry: format!("{}={}", key, value),
        });
    }
    Ok(())
}
