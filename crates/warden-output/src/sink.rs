//! Sinks: where routed lines and exit events end up.
//!
//! A collaborator registers plain closures. Anything left unset falls back to
//! the default sinks, which write through `tracing`.

use crate::types::{ExitEvent, OutputLine, StreamType};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Receives every line of one stream, raw (empty lines included).
pub type LineCallback = Arc<dyn Fn(&OutputLine) + Send + Sync>;

/// Receives the exit event of each generation.
pub type ExitCallback = Arc<dyn Fn(&ExitEvent) + Send + Sync>;

/// Sink registration for one supervised process.
#[derive(Clone, Default)]
pub struct OutputSinks {
    pub stdout: Option<LineCallback>,
    pub stderr: Option<LineCallback>,
    pub exit: Option<ExitCallback>,
}

impl OutputSinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_stdout(mut self, f: impl Fn(&OutputLine) + Send + Sync + 'static) -> Self {
        self.stdout = Some(Arc::new(f));
        self
    }

    pub fn on_stderr(mut self, f: impl Fn(&OutputLine) + Send + Sync + 'static) -> Self {
        self.stderr = Some(Arc::new(f));
        self
    }

    pub fn on_exit(mut self, f: impl Fn(&ExitEvent) + Send + Sync + 'static) -> Self {
        self.exit = Some(Arc::new(f));
        self
    }

    /// Route a line to the custom sink for its stream, or to the log.
    pub fn deliver_line(&self, line: &OutputLine) {
        let custom = match line.stream {
            StreamType::Stdout => self.stdout.as_ref(),
            StreamType::Stderr => self.stderr.as_ref(),
        };
        match custom {
            Some(callback) => callback(line),
            None => log_line(line),
        }
    }

    pub fn deliver_exit(&self, event: &ExitEvent) {
        match &self.exit {
            Some(callback) => callback(event),
            None => log_exit(event),
        }
    }
}

impl fmt::Debug for OutputSinks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSinks")
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .field("exit", &self.exit.is_some())
            .finish()
    }
}

/// Default line sink. Blank lines are dropped; the rest is trimmed and
/// logged at info (stdout) or error (stderr).
pub fn log_line(line: &OutputLine) {
    let text = line.line.trim();
    if text.is_empty() {
        return;
    }
    match line.stream {
        StreamType::Stdout => info!(
            process = %line.process,
            generation = line.generation,
            "{}",
            text
        ),
        StreamType::Stderr => error!(
            process = %line.process,
            generation = line.generation,
            "{}",
            text
        ),
    }
}

/// Default exit sink.
pub fn log_exit(event: &ExitEvent) {
    if event.exit_code == 0 {
        info!(
            process = %event.process,
            pid = event.pid,
            generation = event.generation,
            retry_count = event.retry_count,
            "Process exited cleanly"
        );
    } else {
        warn!(
            process = %event.process,
            pid = event.pid,
            generation = event.generation,
            exit_code = event.exit_code,
            retry_count = event.retry_count,
            "Process exited with non-zero code"
        );
    }
}

/// Bounded in-memory capture of the most recent lines.
///
/// ```
/// use warden_output::{LineBuffer, OutputSinks};
///
/// let buffer = LineBuffer::new(100);
/// let sinks = OutputSinks::new()
///     .on_stdout(buffer.callback())
///     .on_stderr(buffer.callback());
/// # let _ = sinks;
/// ```
#[derive(Clone)]
pub struct LineBuffer {
    lines: Arc<Mutex<VecDeque<OutputLine>>>,
    max_size: usize,
}

impl LineBuffer {
    pub fn new(max_size: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(max_size.min(1024)))),
            max_size: max_size.max(1),
        }
    }

    pub fn push(&self, line: &OutputLine) {
        let mut lines = self.lines.lock();
        lines.push_back(line.clone());
        while lines.len() > self.max_size {
            lines.pop_front();
        }
    }

    /// A closure that appends to this buffer, for use as a sink.
    pub fn callback(&self) -> impl Fn(&OutputLine) + Send + Sync + 'static {
        let buffer = self.clone();
        move |line| buffer.push(line)
    }

    pub fn lines(&self) -> Vec<OutputLine> {
        self.lines.lock().iter().cloned().collect()
    }

    /// Line texts of one stream, oldest first.
    pub fn texts(&self, stream: StreamType) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|l| l.stream == stream)
            .map(|l| l.line.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl fmt::Debug for LineBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineBuffer")
            .field("len", &self.len())
            .field("max_size", &self.max_size)
            .finish()
    }
}
