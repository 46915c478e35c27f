use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use warden_common::ConfigurationError;
use warden_process::SecureCredential;
use warden_spec::{ProcessSpec, StopBehavior, SupervisionOptions};

pub mod validation;

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WardenConfig {
    #[serde(default)]
    pub supervisor: SupervisorOptions,
    pub processes: Vec<ProcessConfig>,
}

/// Host-wide options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorOptions {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// How long shutdown waits for stopped processes before killing them.
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// One supervised process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    pub name: String,
    pub command: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<CredentialConfig>,
    /// Hosted processes start with the host unless told otherwise.
    #[serde(default = "default_true")]
    pub auto_start: bool,
    #[serde(default)]
    pub auto_restart: bool,
    #[serde(default = "default_acceptable_exit_codes")]
    pub acceptable_exit_codes: Vec<i32>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub stop_behavior: StopBehavior,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
}

impl std::fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("domain", &self.domain)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl ProcessConfig {
    pub fn to_spec(&self) -> Result<ProcessSpec, ConfigurationError> {
        let credential = self.credential.as_ref().and_then(|c| {
            SecureCredential::from_parts(
                c.domain.as_deref(),
                Some(c.username.as_str()),
                Some(c.password.clone()),
            )
        });

        ProcessSpec::new(
            self.command.clone(),
            SupervisionOptions {
                name: Some(self.name.clone()),
                working_directory: self.working_directory.clone(),
                environment: self.environment.clone(),
                credential,
                auto_start: self.auto_start,
                auto_restart: self.auto_restart,
                acceptable_exit_codes: self.acceptable_exit_codes.clone(),
                max_retries: self.max_retries,
                stop_behavior: self.stop_behavior,
                ..Default::default()
            },
        )
    }
}

impl WardenConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).with_context(|| {
            format!("Failed to read config file: {}", path.as_ref().display())
        })?;

        Self::load_from_string(&content)
    }

    /// Load configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        let config: WardenConfig =
            serde_yaml::from_str(content).context("Failed to parse YAML configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    pub fn enabled_processes(&self) -> Vec<&ProcessConfig> {
        self.processes.iter().filter(|p| p.enabled).collect()
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_true() -> bool {
    true
}

fn default_acceptable_exit_codes() -> Vec<i32> {
    vec![0]
}

fn default_max_retries() -> u32 {
    3
}

pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() != 0 {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        } else {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    /// `"500ms"`, `"10s"` or `"1m"`.
    pub fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        let invalid = || format!("Invalid duration: {}", s);

        // "ms" before "s", since "ms" ends with 's'
        if let Some(num) = s.strip_suffix("ms") {
            num.parse().map(Duration::from_millis).map_err(|_| invalid())
        } else if let Some(num) = s.strip_suffix('s') {
            num.parse().map(Duration::from_secs).map_err(|_| invalid())
        } else if let Some(num) = s.strip_suffix('m') {
            num.parse::<u64>()
                .map(|mins| Duration::from_secs(mins * 60))
                .map_err(|_| invalid())
        } else {
            Err(format!("Duration must end with 's', 'ms', or 'm': {}", s))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
supervisor:
  log_level: debug
  shutdown_timeout: 500ms
processes:
  - name: web
    command: "/usr/bin/python3 -m http.server 8080"
    auto_restart: true
    max_retries: 5
    acceptable_exit_codes: [0, 2]
    environment:
      PYTHONUNBUFFERED: "1"
  - name: batch
    command: /bin/true
    enabled: false
    stop_behavior: exit_policy
    credential:
      username: svc
      password: hunter2
"#;

    #[test]
    fn test_load_sample() {
        let config = WardenConfig::load_from_string(SAMPLE).unwrap();
        assert_eq!(config.supervisor.log_level, "debug");
        assert_eq!(config.supervisor.shutdown_timeout, Duration::from_millis(500));
        assert_eq!(config.processes.len(), 2);
        assert_eq!(config.enabled_processes().len(), 1);

        let web = config.processes[0].to_spec().unwrap();
        assert_eq!(web.name().as_str(), "web");
        assert_eq!(web.argv().len(), 4);
        assert!(web.auto_start());
        assert!(web.auto_restart());
        assert_eq!(web.max_retries(), 5);
        assert!(web.is_acceptable(2));

        let batch = config.processes[1].to_spec().unwrap();
        assert_eq!(batch.stop_behavior(), StopBehavior::ExitPolicy);
        assert_eq!(batch.credential().map(|c| c.username()), Some("svc"));
        assert!(!format!("{:?}", config.processes[1]).contains("hunter2"));
    }

    #[test]
    fn test_defaults_apply() {
        let config = WardenConfig::load_from_string(
            "processes:\n  - name: one\n    command: /bin/true\n",
        )
        .unwrap();
        assert_eq!(config.supervisor.shutdown_timeout, Duration::from_secs(10));
        let p = &config.processes[0];
        assert!(p.enabled);
        assert!(p.auto_start);
        assert!(!p.auto_restart);
        assert_eq!(p.acceptable_exit_codes, vec![0]);
        assert_eq!(p.max_retries, 3);
        assert_eq!(p.stop_behavior, StopBehavior::SuppressRestart);
    }

    #[test]
    fn test_parse_duration() {
        use duration_serde::parse_duration;
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("xs").is_err());
    }

    #[test]
    fn test_load_from_missing_file_has_context() {
        let err = WardenConfig::load_from_file("/definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.yaml");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = WardenConfig::load_from_file(&path).unwrap();
        assert_eq!(config.processes[0].name, "web");
    }
}
