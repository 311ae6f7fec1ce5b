//! In-memory log ring buffer with sink eviction.
//!
//! The memory logger keeps the last N log lines in a fixed-capacity buffer
//! and serves them over HTTP for diagnostics. Lines arrive over an unbounded
//! channel from the access-logging stage and the diagnostic output tee; a
//! single consumer task appends them, flushing the whole generation to the
//! configured sink when the buffer fills or when a dump command arrives.
//!
//! # Concurrency
//!
//! All mutable ring state (entries, snapshot id, evicted counter) lives
//! behind one `RwLock`. Only the consumer task takes the write lock; request
//! handlers take read guards for `head`/`tail`/`size`, so readers observe a
//! consistent (possibly slightly stale) generation and never a torn entry.
//!
//! # Generations
//!
//! Each flush starts a new generation: entry ids restart at zero, the
//! snapshot id increments exactly once, and the evicted counter accumulates
//! the flushed entry count. A command-driven dump records a synthetic trailer
//! entry (snapshot id, entry count, bytes written, error if any) as id 0 of
//! the new generation; an overflow flush reports its summary through tracing
//! only and the incoming line becomes id 0.

pub mod sink;
pub mod tee;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use sink::Sink;
pub use tee::LogTee;

/// One buffered log line.
///
/// `id` is zero-based within the current generation and resets on every
/// flush; `ts` is epoch nanoseconds at append time.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub id: usize,
    pub ts: i64,
    pub line: String,
}

/// Buffer occupancy report for the `/logs/size` endpoint.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SizeReport {
    pub max: usize,
    pub current: usize,
    pub evicted: u64,
}

/// Commands accepted by the consumer besides log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCommand {
    /// Flush the current generation to the sink immediately.
    Dump,
}

/// The ring state. Writes happen only on the consumer task.
#[derive(Debug)]
pub struct LogBuffer {
    capacity: usize,
    entries: Vec<LogEntry>,
    snapshot_id: u64,
    evicted: u64,
}

impl LogBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::with_capacity(capacity),
            snapshot_id: 0,
            evicted: 0,
        }
    }

    /// First `min(n, current)` entries of the current generation.
    pub fn head(&self, n: usize) -> Vec<LogEntry> {
        self.entries.iter().take(n).cloned().collect()
    }

    /// Last `min(n, current)` entries, falling back to `head` when `n`
    /// covers the whole generation.
    pub fn tail(&self, n: usize) -> Vec<LogEntry> {
        let len = self.entries.len();
        if n >= len {
            return self.head(n);
        }
        self.entries.iter().skip(len - n).cloned().collect()
    }

    pub fn size(&self) -> SizeReport {
        SizeReport {
            max: self.capacity,
            current: self.entries.len(),
            evicted: self.evicted,
        }
    }

    pub fn snapshot_id(&self) -> u64 {
        self.snapshot_id
    }
}

/// Cloneable producer/reader handle shared with middleware and handlers.
#[derive(Clone)]
pub struct MemoryLogHandle {
    line_tx: mpsc::UnboundedSender<String>,
    cmd_tx: mpsc::UnboundedSender<LogCommand>,
    buffer: Arc<RwLock<LogBuffer>>,
}

impl MemoryLogHandle {
    /// Queue a line for the ring. Never blocks; a send after the consumer
    /// has exited is silently dropped (logging must not fail requests).
    pub fn emit(&self, line: impl Into<String>) {
        let _ = self.line_tx.send(line.into());
    }

    /// Ask the consumer to flush the current generation now.
    pub fn request_dump(&self) {
        let _ = self.cmd_tx.send(LogCommand::Dump);
    }

    /// Sender for the diagnostic output tee.
    pub fn line_sender(&self) -> mpsc::UnboundedSender<String> {
        self.line_tx.clone()
    }

    pub async fn head(&self, n: usize) -> Vec<LogEntry> {
        self.buffer.read().await.head(n)
    }

    pub async fn tail(&self, n: usize) -> Vec<LogEntry> {
        self.buffer.read().await.tail(n)
    }

    pub async fn size(&self) -> SizeReport {
        self.buffer.read().await.size()
    }

    pub async fn snapshot_id(&self) -> u64 {
        self.buffer.read().await.snapshot_id()
    }
}

/// The single consumer task state. Created by [`channel`]; run with
/// [`LogConsumer::run`] on a dedicated task.
pub struct LogConsumer {
    service: String,
    sink: Sink,
    cancel: CancellationToken,
    line_rx: mpsc::UnboundedReceiver<String>,
    cmd_rx: mpsc::UnboundedReceiver<LogCommand>,
    buffer: Arc<RwLock<LogBuffer>>,
}

/// Create a connected handle/consumer pair for one server instance.
pub fn channel(
    service: &str,
    capacity: usize,
    sink: Sink,
    cancel: CancellationToken,
) -> (MemoryLogHandle, LogConsumer) {
    let (line_tx, line_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let buffer = Arc::new(RwLock::new(LogBuffer::new(capacity)));

    let handle = MemoryLogHandle {
        line_tx,
        cmd_tx,
        buffer: buffer.clone(),
    };
    let consumer = LogConsumer {
        service: service.to_string(),
        sink,
        cancel,
        line_rx,
        cmd_rx,
        buffer,
    };
    (handle, consumer)
}

impl LogConsumer {
    /// Drain both channels until cancelled or all senders are gone.
    ///
    /// Cancellation drains whatever is still buffered before exiting, so a
    /// graceful shutdown loses no lines.
    pub async fn run(mut self) {
        info!(
            service = %self.service,
            "Starting entry-bound memory logger"
        );

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    self.drain().await;
                    break;
                }
                line = self.line_rx.recv() => match line {
                    Some(line) => self.append(line).await,
                    None => break,
                },
                cmd = self.cmd_rx.recv() => {
                    if let Some(LogCommand::Dump) = cmd {
                        self.dump().await;
                    }
                }
            }
        }

        info!(service = %self.service, "Memory log channel closed");
    }

    async fn drain(&mut self) {
        while let Ok(line) = self.line_rx.try_recv() {
            self.append(line).await;
        }
        while let Ok(cmd) = self.cmd_rx.try_recv() {
            if cmd == LogCommand::Dump {
                self.dump().await;
            }
        }
        debug!(service = %self.service, "Memory logger drained on shutdown");
    }

    async fn append(&mut self, line: String) {
        let mut buf = self.buffer.write().await;
        if buf.entries.len() == buf.capacity {
            let flush = self.flush_locked(&mut buf).await;
            info!(
                service = %self.service,
                snapshot_id = flush.snapshot_id,
                entries = flush.entries,
                bytes_written = flush.bytes_written,
                error = flush.error.as_deref().unwrap_or("none"),
                "Evicted memory log generation to sink"
            );
        }
        let id = buf.entries.len();
        buf.entries.push(LogEntry {
            id,
            ts: now_nanos(),
            line,
        });
    }

    async fn dump(&mut self) {
        let mut buf = self.buffer.write().await;
        let flush = self.flush_locked(&mut buf).await;
        let trailer = format!(
            "API driven memory log dump: snapshotID={}, entries={}, bytesWritten={}, error={}",
            flush.snapshot_id,
            flush.entries,
            flush.bytes_written,
            flush.error.as_deref().unwrap_or("none"),
        );
        buf.entries.push(LogEntry {
            id: 0,
            ts: now_nanos(),
            line: trailer,
        });
    }

    /// Flush the current generation: one snapshot-id increment, sink write,
    /// evicted accounting, fresh empty generation. Sink errors are captured
    /// in the summary and never propagate.
    async fn flush_locked(&self, buf: &mut LogBuffer) -> FlushSummary {
        buf.snapshot_id += 1;
        let count = buf.entries.len();
        let result = self.sink.write(&self.service, buf.snapshot_id, &buf.entries).await;
        buf.evicted += count as u64;
        buf.entries = Vec::with_capacity(buf.capacity);

        let (bytes_written, error) = match result {
            Ok(n) => (n, None),
            Err(e) => {
                warn!(service = %self.service, error = %e, "Memory log flush failed");
                (0, Some(e.to_string()))
            }
        };
        FlushSummary {
            snapshot_id: buf.snapshot_id,
            entries: count,
            bytes_written,
            error,
        }
    }
}

struct FlushSummary {
    snapshot_id: u64,
    entries: usize,
    bytes_written: usize,
    error: Option<String>,
}

/// Epoch nanoseconds, used for entry timestamps and generated request ids.
pub fn now_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
}
