//! Identifiers shared across the warden crates.

use crate::errors::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest accepted process name.
pub const MAX_NAME_LEN: usize = 64;

/// Name of a supervised process, as used in logs and by the registry.
///
/// # Example
/// ```
/// use warden_common::ProcessName;
///
/// let name = ProcessName::parse("web-1").unwrap();
/// assert_eq!(name.as_str(), "web-1");
/// assert!(ProcessName::parse("no spaces").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProcessName(String);

impl ProcessName {
    /// Validates and wraps a name. Allowed: alphanumerics, `-`, `_`, `.`.
    pub fn parse(name: impl Into<String>) -> Result<Self, ConfigurationError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ConfigurationError::InvalidName {
                name,
                reason: "name cannot be empty".to_string(),
            });
        }
        if name.len() > MAX_NAME_LEN {
            return Err(ConfigurationError::InvalidName {
                name,
                reason: format!("name longer than {} characters", MAX_NAME_LEN),
            });
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(ConfigurationError::InvalidName {
                name,
                reason: "only alphanumerics, '-', '_' and '.' are allowed".to_string(),
            });
        }
        Ok(Self(name))
    }

    /// Derives a name from an executable path: the file name without
    /// directories or extension, with anything outside `[A-Za-z0-9_.-]`
    /// replaced by `_`. Never fails; an unusable path yields `process`.
    pub fn from_program(program: &str) -> Self {
        let file = program
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .unwrap_or(program);
        let stem = match file.rfind('.') {
            Some(dot) if dot > 0 => &file[..dot],
            _ => file,
        };
        let name: String = stem
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .take(MAX_NAME_LEN)
            .collect();

        if name.is_empty() {
            Self("process".to_string())
        } else {
            Self(name)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProcessName {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ProcessName> for String {
    fn from(name: ProcessName) -> Self {
        name.0
    }
}

impl fmt::Display for ProcessName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
