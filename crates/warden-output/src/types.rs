//! Core types for output routing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stream type (stdout or stderr)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    Stdout,
    Stderr,
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamType::Stdout => write!(f, "stdout"),
            StreamType::Stderr => write!(f, "stderr"),
        }
    }
}

/// One line read from a child stream, newline stripped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputLine {
    pub process: String,
    pub generation: u64,
    pub stream: StreamType,
    /// 1-based position within this stream of this generation.
    pub line_num: u64,
    pub line: String,
    pub timestamp: DateTime<Utc>,
}

/// Fired once per generation when the child terminates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitEvent {
    pub process: String,
    pub generation: u64,
    pub pid: u32,
    pub exit_code: i32,
    /// Cumulative exits observed by the handle, this one included.
    pub retry_count: u32,
    pub timestamp: DateTime<Utc>,
}

/// Delivery counters for one router.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterStats {
    pub stdout_lines: u64,
    pub stderr_lines: u64,
    pub bytes: u64,
    /// Lines dropped because the router was cancelled or superseded.
    pub dropped_lines: u64,
}
