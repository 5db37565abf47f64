//! One-shot readiness detection over supervised process output.

use tokio::sync::{mpsc, oneshot};

use crate::{OutputChunk, OutputSource};

/// Substring of the harness's diagnostic output that signals its DAP server
/// is bound and accepting connections.
pub const READY_MARKER: &str = "listening";

/// Resolves exactly once, the first time [`READY_MARKER`] appears on the
/// supervised process's stderr. Later matches are ignored.
pub struct ReadinessWatch {
    rx: oneshot::Receiver<()>,
}

impl ReadinessWatch {
    /// Subscribe to a supervised process's output stream.
    pub fn subscribe(mut output: mpsc::UnboundedReceiver<OutputChunk>) -> Self {
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let mut signal = Some(tx);
            // keep draining after the first match so the channel never
            // backs up for the lifetime of the process
            while let Some(chunk) = output.recv().await {
                if chunk.source != OutputSource::Stderr {
                    continue;
                }
                if chunk.line.contains(READY_MARKER) {
                    if let Some(signal) = signal.take() {
                        let _ = signal.send(());
                    }
                }
            }
        });
        Self { rx }
    }

    /// Wait for the readiness signal.
    ///
    /// If the output stream ends without the marker this never resolves;
    /// callers race it against process exit.
    pub async fn ready(self) {
        match self.rx.await {
            Ok(()) => {}
            Err(_) => std::future::pending().await,
        }
    }
}
