//! Diagnostic output tee.
//!
//! A `MakeWriter` for the tracing subscriber that writes formatted events to
//! stdout and forwards each line into the memory-log channel, so ordinary
//! diagnostic output lands in the ring alongside access lines.
//!
//! The subscriber must exist before the server is built (or build-time
//! diagnostics are lost), but the memory log only exists after. A detached
//! tee bridges the gap: lines buffer in its channel until [`forward`]
//! connects them to the built server's log handle.
//!
//! ```rust,ignore
//! let (tee, tee_rx) = LogTee::detached();
//! tracing_subscriber::fmt().with_writer(tee).init();
//! let server = builder.build("svc", port)?;
//! if let Some(handle) = server.state().mem_log.clone() {
//!     tokio::spawn(cradle::memlog::tee::forward(tee_rx, handle));
//! }
//! ```

use std::io::{self, Write};

use tokio::sync::mpsc;
use tracing_subscriber::fmt::MakeWriter;

use super::MemoryLogHandle;
use crate::middleware::logging::ACCESS_LOG_TARGET;

/// Tee factory handed to `tracing_subscriber::fmt().with_writer(..)`.
#[derive(Clone)]
pub struct LogTee {
    tx: mpsc::UnboundedSender<String>,
}

impl LogTee {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }

    /// Tee created before the memory log exists. Lines buffer in the
    /// returned receiver; connect it with [`forward`] once the server is
    /// built, or drop the receiver to discard them.
    pub fn detached() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

/// Pump buffered tee lines into the memory log until the tee is dropped.
pub async fn forward(mut rx: mpsc::UnboundedReceiver<String>, handle: MemoryLogHandle) {
    while let Some(line) = rx.recv().await {
        handle.emit(line);
    }
}

impl<'a> MakeWriter<'a> for LogTee {
    type Writer = TeeWriter;

    fn make_writer(&'a self) -> Self::Writer {
        TeeWriter {
            tx: self.tx.clone(),
        }
    }
}

/// Per-event writer produced by [`LogTee`].
pub struct TeeWriter {
    tx: mpsc::UnboundedSender<String>,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = io::stdout().write(buf)?;
        if let Ok(text) = std::str::from_utf8(buf) {
            let line = text.trim_end();
            // Access lines already reach the ring directly from the logging
            // stage; forwarding them again would duplicate entries.
            if !line.is_empty() && !line.contains(ACCESS_LOG_TARGET) {
                let _ = self.tx.send(line.to_string());
            }
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}
