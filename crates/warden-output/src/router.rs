//! Per-generation output router.
//!
//! One router is attached to each launched generation. It owns a reader task
//! per piped stream; each task reads lines until end-of-stream or
//! cancellation and hands them to the registered sinks.

use crate::sink::OutputSinks;
use crate::types::{OutputLine, RouterStats, StreamType};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Grace period a finished process gets to flush its pipes.
pub const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Default)]
struct Counters {
    stdout_lines: AtomicU64,
    stderr_lines: AtomicU64,
    bytes: AtomicU64,
    dropped_lines: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> RouterStats {
        RouterStats {
            stdout_lines: self.stdout_lines.load(Ordering::Relaxed),
            stderr_lines: self.stderr_lines.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            dropped_lines: self.dropped_lines.load(Ordering::Relaxed),
        }
    }
}

/// Everything a reader task needs besides the stream itself.
#[derive(Clone)]
struct ReaderContext {
    process: String,
    generation: u64,
    current_generation: Arc<AtomicU64>,
    sinks: OutputSinks,
    counters: Arc<Counters>,
    cancel_token: CancellationToken,
}

impl ReaderContext {
    /// A line may only be delivered while this generation is still current.
    fn is_live(&self) -> bool {
        !self.cancel_token.is_cancelled()
            && self.current_generation.load(Ordering::SeqCst) == self.generation
    }
}

/// Drains the stdout and stderr of one generation.
pub struct OutputRouter {
    process: String,
    generation: u64,
    cancel_token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl OutputRouter {
    /// Start reader tasks for whichever streams are present.
    ///
    /// `current_generation` is the owning handle's generation counter; lines
    /// are dropped once it no longer equals `generation`. Must be called
    /// inside a Tokio runtime.
    pub fn attach<O, E>(
        process: impl Into<String>,
        generation: u64,
        current_generation: Arc<AtomicU64>,
        stdout: Option<O>,
        stderr: Option<E>,
        sinks: OutputSinks,
    ) -> Self
    where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        let process = process.into();
        let cancel_token = CancellationToken::new();
        let counters = Arc::new(Counters::default());
        let ctx = ReaderContext {
            process: process.clone(),
            generation,
            current_generation,
            sinks,
            counters: Arc::clone(&counters),
            cancel_token: cancel_token.clone(),
        };

        let mut tasks = Vec::with_capacity(2);
        if let Some(stream) = stdout {
            let ctx = ctx.clone();
            tasks.push(tokio::spawn(read_stream(stream, StreamType::Stdout, ctx)));
        }
        if let Some(stream) = stderr {
            tasks.push(tokio::spawn(read_stream(stream, StreamType::Stderr, ctx)));
        }

        debug!(
            process = %process,
            generation,
            readers = tasks.len(),
            "Output router attached"
        );

        Self {
            process,
            generation,
            cancel_token,
            tasks,
            counters,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stats(&self) -> RouterStats {
        self.counters.snapshot()
    }

    /// Stop delivery immediately. Readers exit at their next await point.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Wait up to `timeout` for both streams to reach end-of-stream, then
    /// cancel whatever is left and join every reader.
    ///
    /// When this returns no sink will be called again for this generation.
    pub async fn finish(mut self, timeout: Duration) -> RouterStats {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut pending = Vec::new();

        for mut task in self.tasks.drain(..) {
            if tokio::time::timeout_at(deadline, &mut task).await.is_err() {
                pending.push(task);
            }
        }

        self.cancel_token.cancel();

        if !pending.is_empty() {
            // Typically a grandchild that inherited the pipe and is still alive.
            debug!(
                process = %self.process,
                generation = self.generation,
                readers = pending.len(),
                "Output not drained within grace period, cancelling readers"
            );
        }
        for task in pending {
            let _ = task.await;
        }

        let stats = self.counters.snapshot();
        debug!(
            process = %self.process,
            generation = self.generation,
            stdout_lines = stats.stdout_lines,
            stderr_lines = stats.stderr_lines,
            dropped_lines = stats.dropped_lines,
            "Output router finished"
        );
        stats
    }
}

impl Drop for OutputRouter {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

impl std::fmt::Debug for OutputRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputRouter")
            .field("process", &self.process)
            .field("generation", &self.generation)
            .field("readers", &self.tasks.len())
            .field("cancelled", &self.cancel_token.is_cancelled())
            .finish()
    }
}

async fn read_stream<R>(stream: R, stream_type: StreamType, ctx: ReaderContext)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::with_capacity(256);
    let mut line_num = 0u64;

    loop {
        buf.clear();
        let read = tokio::select! {
            _ = ctx.cancel_token.cancelled() => {
                debug!(process = %ctx.process, stream = %stream_type, "Stream reader cancelled");
                break;
            }
            read = reader.read_until(b'\n', &mut buf) => read,
        };

        match read {
            Ok(0) => break,
            Ok(n) => {
                ctx.counters.bytes.fetch_add(n as u64, Ordering::Relaxed);

                if !ctx.is_live() {
                    ctx.counters.dropped_lines.fetch_add(1, Ordering::Relaxed);
                    continue;
                }

                line_num += 1;
                let line = OutputLine {
                    process: ctx.process.clone(),
                    generation: ctx.generation,
                    stream: stream_type,
                    line_num,
                    line: decode_line(&buf),
                    timestamp: Utc::now(),
                };
                match stream_type {
                    StreamType::Stdout => &ctx.counters.stdout_lines,
                    StreamType::Stderr => &ctx.counters.stderr_lines,
                }
                .fetch_add(1, Ordering::Relaxed);

                ctx.sinks.deliver_line(&line);
            }
            Err(e) => {
                debug!(
                    process = %ctx.process,
                    stream = %stream_type,
                    error = %e,
                    "Error reading from stream"
                );
                break;
            }
        }
    }

    debug!(
        process = %ctx.process,
        generation = ctx.generation,
        stream = %stream_type,
        lines = line_num,
        "Stream reader finished"
    );
}

/// Lossy UTF-8 with the line terminator (`\n` or `\r\n`) removed.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}
