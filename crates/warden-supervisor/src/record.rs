//! Flattened supervision record.
//!
//! The shape an external store or API keeps for each supervised process:
//! plain fields, the command line under `verb`, credentials inline, and the
//! last observed exit count and run status. Transport forms carry exit codes
//! and the environment as single strings; [`parse_exit_codes`] and
//! [`parse_environment`] turn those into structured values.

use crate::handle::ProcessHandle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use warden_common::ConfigurationError;
use warden_process::SecureCredential;
use warden_spec::{ProcessSpec, SupervisionOptions};
use warden_state::ProcessState;

/// Coarse run status as shown to record consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Stopped,
    Running,
    Restarting,
    /// Supervision ended on an exit code outside the acceptable set.
    Failed,
}

impl RunStatus {
    pub fn of(handle: &ProcessHandle) -> Self {
        match handle.state() {
            ProcessState::Idle => RunStatus::Stopped,
            ProcessState::Running => RunStatus::Running,
            ProcessState::Exited | ProcessState::Restarting => RunStatus::Restarting,
            ProcessState::Terminal => {
                if handle.spec().is_acceptable(handle.exit_code()) {
                    RunStatus::Stopped
                } else {
                    RunStatus::Failed
                }
            }
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Stopped => write!(f, "stopped"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Restarting => write!(f, "restarting"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SuperviseRecord {
    /// Command line to run.
    pub verb: String,
    pub name: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default)]
    pub exit_count: u32,
    #[serde(default)]
    pub status: RunStatus,
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default = "default_exit_retries")]
    pub exit_retries: u32,
    #[serde(default)]
    pub auto_restart: bool,
    #[serde(default = "default_exit_codes")]
    pub exit_codes: Vec<i32>,
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

fn default_exit_retries() -> u32 {
    3
}

fn default_exit_codes() -> Vec<i32> {
    vec![0]
}

impl SuperviseRecord {
    pub fn new(name: impl Into<String>, verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            name: name.into(),
            domain: None,
            username: None,
            password: None,
            exit_count: 0,
            status: RunStatus::Stopped,
            auto_start: false,
            exit_retries: default_exit_retries(),
            auto_restart: false,
            exit_codes: default_exit_codes(),
            working_directory: None,
            environment: BTreeMap::new(),
        }
    }

    /// The command line; `verb` under its usual name.
    pub fn command(&self) -> &str {
        &self.verb
    }

    /// Build the spec this record describes. An empty `name` falls back to
    /// the executable's file name.
    pub fn to_spec(&self) -> Result<ProcessSpec, ConfigurationError> {
        let name = Some(self.name.trim())
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        ProcessSpec::new(
            self.verb.clone(),
            SupervisionOptions {
                name,
                working_directory: self.working_directory.clone(),
                environment: self.environment.clone(),
                credential: SecureCredential::from_parts(
                    self.domain.as_deref(),
                    self.username.as_deref(),
                    self.password.clone(),
                ),
                auto_start: self.auto_start,
                auto_restart: self.auto_restart,
                acceptable_exit_codes: self.exit_codes.clone(),
                max_retries: self.exit_retries,
                ..Default::default()
            },
        )
    }

    /// Copy the observable state of `handle` into this record.
    pub fn refresh_from(&mut self, handle: &ProcessHandle) {
        self.exit_count = handle.retry_count();
        self.status = RunStatus::of(handle);
    }

    /// A record describing `handle`. The secret is never recovered from the
    /// spec, so `password` is always `None`.
    pub fn from_handle(handle: &ProcessHandle) -> Self {
        let spec = handle.spec();
        let credential = spec.credential();
        let mut record = Self {
            verb: spec.command().to_string(),
            name: spec.name().to_string(),
            domain: credential.and_then(|c| c.domain()).map(str::to_string),
            username: credential.map(|c| c.username().to_string()),
            password: None,
            exit_count: 0,
            status: RunStatus::Stopped,
            auto_start: spec.auto_start(),
            exit_retries: spec.max_retries(),
            auto_restart: spec.auto_restart(),
            exit_codes: spec.acceptable_exit_codes().iter().copied().collect(),
            working_directory: spec.working_directory().map(PathBuf::from),
            environment: spec.environment().clone(),
        };
        record.refresh_from(handle);
        record
    }
}

impl fmt::Debug for SuperviseRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuperviseRecord")
            .field("verb", &self.verb)
            .field("name", &self.name)
            .field("domain", &self.domain)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("exit_count", &self.exit_count)
            .field("status", &self.status)
            .field("auto_start", &self.auto_start)
            .field("exit_retries", &self.exit_retries)
            .field("auto_restart", &self.auto_restart)
            .field("exit_codes", &self.exit_codes)
            .field("working_directory", &self.working_directory)
            .field("environment", &self.environment)
            .finish()
    }
}

/// Transport form of a record, as posted by a client: exit codes and
/// environment are single strings.
#[derive(Clone, Default, Deserialize)]
pub struct SuperviseForm {
    pub verb: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default)]
    pub auto_restart: bool,
    #[serde(default)]
    pub exit_retries: Option<u32>,
    /// `"0, 2"`
    #[serde(default)]
    pub exit_codes: String,
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
    /// `"A=1; B=2"`
    #[serde(default)]
    pub environment: String,
}

impl SuperviseForm {
    pub fn into_record(self) -> Result<SuperviseRecord, ConfigurationError> {
        let exit_codes = parse_exit_codes(&self.exit_codes)?;
        let environment = parse_environment(&self.environment)?;

        let mut record = SuperviseRecord::new(self.name, self.verb);
        record.domain = self.domain;
        record.username = self.username;
        record.password = self.password;
        record.auto_start = self.auto_start;
        record.auto_restart = self.auto_restart;
        record.exit_retries = self.exit_retries.unwrap_or_else(default_exit_retries);
        record.exit_codes = exit_codes;
        record.working_directory = self.working_directory;
        record.environment = environment;
        Ok(record)
    }
}

impl fmt::Debug for SuperviseForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuperviseForm")
            .field("verb", &self.verb)
            .field("name", &self.name)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("exit_codes", &self.exit_codes)
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

/// Parse a comma separated list of exit codes.
///
/// ```
/// use warden_supervisor::parse_exit_codes;
///
/// assert_eq!(parse_exit_codes("0, 2").unwrap(), vec![0, 2]);
/// assert!(parse_exit_codes("").unwrap().is_empty());
/// assert!(parse_exit_codes("0,x").is_err());
/// ```
pub fn parse_exit_codes(buffer: &str) -> Result<Vec<i32>, ConfigurationError> {
    if buffer.trim().is_empty() {
        return Ok(Vec::new());
    }
    buffer
        .split(',')
        .map(|code| {
            let code = code.trim();
            code.parse::<i32>()
                .map_err(|_| ConfigurationError::InvalidExitCode {
                    value: code.to_string(),
                })
        })
        .collect()
}

/// Parse `;` separated `key=value` pairs. Keys and values are trimmed; a
/// value may itself contain `=`.
///
/// ```
/// use warden_supervisor::parse_environment;
///
/// let env = parse_environment("A=1; B = x=y").unwrap();
/// assert_eq!(env["A"], "1");
/// assert_eq!(env["B"], "x=y");
/// ```
pub fn parse_environment(buffer: &str) -> Result<BTreeMap<String, String>, ConfigurationError> {
    let mut environment = BTreeMap::new();
    if buffer.trim().is_empty() {
        return Ok(environment);
    }

    for chunk in buffer.split(';') {
        let invalid = || ConfigurationError::InvalidEnvironment {
            entry: chunk.trim().to_string(),
        };
        let (key, value) = chunk.split_once('=').ok_or_else(invalid)?;
        let key = key.trim();
        if key.is_empty() {
            return Err(invalid());
        }
        environment.insert(key.to_string(), value.trim().to_string());
    }
    Ok(environment)
}
