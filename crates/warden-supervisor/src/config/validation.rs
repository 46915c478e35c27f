use super::*;
use anyhow::{anyhow, Result};
use std::collections::HashSet;
use tracing::warn;
use warden_common::ProcessName;
use warden_spec::split_command_line;

/// Validate the complete configuration
pub fn validate_config(config: &WardenConfig) -> Result<()> {
    validate_supervisor_options(&config.supervisor)?;
    validate_process_configs(&config.processes)
}

fn validate_supervisor_options(options: &SupervisorOptions) -> Result<()> {
    if options.shutdown_timeout.is_zero() {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    match options.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(anyhow!(
            "Invalid log level: {}, must be one of: trace, debug, info, warn, error",
            options.log_level
        )),
    }
}

fn validate_process_configs(processes: &[ProcessConfig]) -> Result<()> {
    if processes.is_empty() {
        return Err(anyhow!("At least one process must be configured"));
    }

    let mut names = HashSet::new();
    for process in processes {
        if !names.insert(process.name.as_str()) {
            return Err(anyhow!("Duplicate process name: {}", process.name));
        }
        validate_process_config(process)?;
    }

    Ok(())
}

fn validate_process_config(process: &ProcessConfig) -> Result<()> {
    ProcessName::parse(process.name.as_str())?;

    split_command_line(&process.command)
        .map_err(|e| anyhow!("Process {}: {}", process.name, e))?;

    if let Some(ref credential) = process.credential {
        let has_user = !credential.username.trim().is_empty();
        let has_secret = !credential.password.is_empty();
        if has_user != has_secret {
            warn!(
                process = %process.name,
                "Incomplete credential, process will run as the supervisor's user"
            );
        }
    }

    if process.auto_restart && process.acceptable_exit_codes.is_empty() {
        warn!(
            process = %process.name,
            "No acceptable exit codes: every exit will be treated as a failure"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process(name: &str, command: &str) -> ProcessConfig {
        ProcessConfig {
            name: name.to_string(),
            command: command.to_string(),
            enabled: true,
            working_directory: None,
            environment: BTreeMap::new(),
            credential: None,
            auto_start: true,
            auto_restart: false,
            acceptable_exit_codes: vec![0],
            max_retries: 3,
            stop_behavior: StopBehavior::default(),
        }
    }

    fn config(processes: Vec<ProcessConfig>) -> WardenConfig {
        WardenConfig {
            supervisor: SupervisorOptions::default(),
            processes,
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&config(vec![process("a", "/bin/true")])).is_ok());
    }

    #[test]
    fn test_empty_process_list() {
        assert!(validate_config(&config(vec![])).is_err());
    }

    #[test]
    fn test_duplicate_names() {
        let err = validate_config(&config(vec![
            process("a", "/bin/true"),
            process("a", "/bin/false"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("Duplicate process name"));
    }

    #[test]
    fn test_unsafe_name() {
        assert!(validate_config(&config(vec![process("a/b", "/bin/true")])).is_err());
    }

    #[test]
    fn test_bad_commands() {
        assert!(validate_config(&config(vec![process("a", "   ")])).is_err());
        assert!(validate_config(&config(vec![process("a", "echo 'oops")])).is_err());
    }

    #[test]
    fn test_supervisor_options() {
        let mut cfg = config(vec![process("a", "/bin/true")]);
        cfg.supervisor.log_level = "loud".to_string();
        assert!(validate_config(&cfg).is_err());

        let mut cfg = config(vec![process("a", "/bin/true")]);
        cfg.supervisor.shutdown_timeout = Duration::ZERO;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn test_incomplete_credential_is_not_fatal() {
        let mut p = process("a", "/bin/true");
        p.credential = Some(CredentialConfig {
            domain: None,
            username: "svc".to_string(),
            password: String::new(),
        });
        assert!(validate_config(&config(vec![p])).is_ok());
    }
}
