//! Exit status decoding.

use std::process::ExitStatus;

/// Offset added to a signal number when a process was killed by a signal,
/// matching the shell's `$?` convention.
pub const SIGNAL_EXIT_BASE: i32 = 128;

/// Collapse an [`ExitStatus`] into a single integer exit code.
///
/// A normal exit yields its code. On Unix a process terminated by a signal
/// yields `128 + signal`. Anything else yields `-1`.
pub fn exit_code_of(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return SIGNAL_EXIT_BASE + signal;
        }
    }

    -1
}
