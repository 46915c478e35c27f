//! Process launch.
//!
//! Builds a Tokio [`Command`] from an argument vector, a working directory,
//! environment overrides and an optional credential, then spawns it with
//! piped stdout/stderr and a null stdin.

use crate::credential::SecureCredential;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, Command};
use warden_common::LaunchError;

/// Everything the OS needs to start one generation of a process.
#[derive(Debug, Clone, Copy)]
pub struct LaunchRequest<'a> {
    /// `argv[0]` is the executable; the rest are passed as-is.
    pub argv: &'a [String],
    pub working_directory: Option<&'a Path>,
    /// Applied on top of the inherited environment; same-name entries win.
    pub environment: &'a BTreeMap<String, String>,
    pub credential: Option<&'a SecureCredential>,
}

/// Spawn a process for supervision.
///
/// Must run inside a Tokio runtime: the child is reaped by the runtime's
/// process driver.
pub fn spawn_supervised(request: &LaunchRequest<'_>) -> Result<Child, LaunchError> {
    let program = request.argv.first().cloned().unwrap_or_default();

    if tokio::runtime::Handle::try_current().is_err() {
        return Err(LaunchError::NoRuntime { program });
    }

    let mut cmd = Command::new(&program);
    cmd.args(request.argv.iter().skip(1));

    if let Some(dir) = request.working_directory {
        cmd.current_dir(dir);
    }

    for (key, value) in request.environment {
        cmd.env(key, value);
    }

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .kill_on_drop(false);

    if let Some(credential) = request.credential {
        apply_credential(&mut cmd, credential)?;
    }

    // Own process group, so console control events target only this child.
    #[cfg(windows)]
    {
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
    }

    cmd.spawn().map_err(|e| LaunchError::spawn(program, e))
}

#[cfg(unix)]
fn apply_credential(cmd: &mut Command, credential: &SecureCredential) -> Result<(), LaunchError> {
    use nix::unistd::User;

    let user = User::from_name(credential.username())
        .map_err(|e| LaunchError::credential(credential.username(), e.to_string()))?
        .ok_or_else(|| LaunchError::credential(credential.username(), "no such user"))?;

    if credential.domain().is_some() {
        tracing::debug!(
            username = credential.username(),
            "Ignoring credential domain on this platform"
        );
    }

    cmd.uid(user.uid.as_raw());
    cmd.gid(user.gid.as_raw());
    Ok(())
}

#[cfg(not(unix))]
fn apply_credential(_cmd: &mut Command, credential: &SecureCredential) -> Result<(), LaunchError> {
    Err(LaunchError::credential(
        credential.qualified_username(),
        "impersonated launch is not supported on this platform",
    ))
}
