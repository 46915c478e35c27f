//! Process existence checking.

/// Check whether a process with the given PID exists.
///
/// On Unix this is `kill(pid, 0)`: no signal is sent, only the existence
/// check runs. A process we lack permission to signal still exists. On
/// Windows the process is opened with limited query rights.
///
/// This never fails: any error other than "permission denied" is reported
/// as "does not exist", which is what a liveness probe wants.
///
/// ```rust,no_run
/// use warden_process::process_exists;
///
/// if process_exists(1234) {
///     println!("1234 is alive");
/// }
/// ```
pub fn process_exists(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }

    #[cfg(unix)]
    {
        process_exists_unix(pid)
    }

    #[cfg(windows)]
    {
        process_exists_windows(pid)
    }
}

#[cfg(unix)]
fn process_exists_unix(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };

    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(Errno::ESRCH) => false,
        Err(e) => {
            tracing::debug!(pid, error = %e, "Liveness probe failed");
            false
        }
    }
}

#[cfg(windows)]
fn process_exists_windows(pid: u32) -> bool {
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::Threading::{OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION};

    unsafe {
        match OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) {
            Ok(handle) => {
                let _ = CloseHandle(handle);
                true
            }
            Err(_) => false,
        }
    }
}
