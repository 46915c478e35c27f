//! Process termination primitives.
//!
//! Both functions treat a target that is already gone as success: stopping a
//! process that has exited is a no-op, not an error.

use warden_common::{ProcessError, ProcessResult};

/// What happened when a termination signal was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// The signal reached a live process.
    Delivered,
    /// No such process; nothing was sent.
    AlreadyExited,
}

/// Ask a process to shut down (SIGTERM on Unix, Ctrl+Break on Windows).
pub fn terminate_gracefully(pid: u32) -> ProcessResult<SignalOutcome> {
    #[cfg(unix)]
    {
        send_unix(pid, nix::sys::signal::Signal::SIGTERM)
    }

    #[cfg(windows)]
    {
        use windows::Win32::System::Console::{GenerateConsoleCtrlEvent, CTRL_BREAK_EVENT};

        if !crate::process_exists(pid) {
            return Ok(SignalOutcome::AlreadyExited);
        }
        // Children are spawned in their own process group, so the group id is the pid.
        unsafe { GenerateConsoleCtrlEvent(CTRL_BREAK_EVENT, pid) }
            .map(|_| SignalOutcome::Delivered)
            .map_err(|e| ProcessError::signal(pid.to_string(), pid, e.to_string()))
    }
}

/// Force a process to stop (SIGKILL on Unix, TerminateProcess on Windows).
pub fn force_kill(pid: u32) -> ProcessResult<SignalOutcome> {
    #[cfg(unix)]
    {
        send_unix(pid, nix::sys::signal::Signal::SIGKILL)
    }

    #[cfg(windows)]
    {
        use windows::Win32::Foundation::CloseHandle;
        use windows::Win32::System::Threading::{OpenProcess, TerminateProcess, PROCESS_TERMINATE};

        unsafe {
            let handle = match OpenProcess(PROCESS_TERMINATE, false, pid) {
                Ok(h) if !h.is_invalid() => h,
                _ => return Ok(SignalOutcome::AlreadyExited),
            };
            let result = TerminateProcess(handle, 1);
            let _ = CloseHandle(handle);
            result
                .map(|_| SignalOutcome::Delivered)
                .map_err(|e| ProcessError::signal(pid.to_string(), pid, e.to_string()))
        }
    }
}

#[cfg(unix)]
fn send_unix(pid: u32, signal: nix::sys::signal::Signal) -> ProcessResult<SignalOutcome> {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let raw = i32::try_from(pid)
        .ok()
        .filter(|raw| *raw > 0)
        .ok_or_else(|| ProcessError::signal(pid.to_string(), pid, "pid out of range"))?;

    match kill(Pid::from_raw(raw), signal) {
        Ok(()) => {
            tracing::debug!(pid, signal = ?signal, "Signal delivered");
            Ok(SignalOutcome::Delivered)
        }
        Err(Errno::ESRCH) => Ok(SignalOutcome::AlreadyExited),
        Err(e) => Err(ProcessError::signal(pid.to_string(), pid, e.to_string())),
    }
}
