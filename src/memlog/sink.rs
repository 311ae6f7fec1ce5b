//! Durable destinations for flushed log generations.
//!
//! The file sink writes `<dir>/<service>.log.<snapshotID>` in append mode;
//! the stdout sink writes the same payload to standard output. Both receive
//! a pretty-printed JSON array of the flushed entries.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::LogEntry;
use crate::config::LogSinkKind;

/// Errors from a sink write. Captured in the flush summary; never
/// propagated to request handling.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Flush destination selected at build time.
#[derive(Debug, Clone)]
pub enum Sink {
    File { dir: PathBuf },
    Stdout,
}

impl Sink {
    pub fn from_config(kind: LogSinkKind, dir: &Path) -> Self {
        match kind {
            LogSinkKind::File => Sink::File {
                dir: dir.to_path_buf(),
            },
            LogSinkKind::Stdout => Sink::Stdout,
        }
    }

    /// Serialize and write one generation; returns bytes written.
    pub async fn write(
        &self,
        service: &str,
        snapshot_id: u64,
        entries: &[LogEntry],
    ) -> Result<usize, SinkError> {
        let payload = serde_json::to_vec_pretty(entries)?;

        match self {
            Sink::File { dir } => {
                let path = dir.join(format!("{service}.log.{snapshot_id}"));
                debug!(path = %path.display(), "Flushing memory log to file sink");
                let mut file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .await?;
                file.write_all(&payload).await?;
                file.flush().await?;
                Ok(payload.len())
            }
            Sink::Stdout => {
                debug!("Flushing memory log to stdout sink");
                let mut out = tokio::io::stdout();
                out.write_all(&payload).await?;
                out.write_all(b"\n").await?;
                out.flush().await?;
                Ok(payload.len())
            }
        }
    }
}
