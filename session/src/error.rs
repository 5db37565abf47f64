//! Error types for session orchestration.

use std::{io, time::Duration};

/// Errors that can occur while beginning a debugging session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A launch request did not name the harness package to run.
    #[error("launch configuration requires a \"program\" field pointing to a Go package directory")]
    MissingProgram,

    /// The harness process could not be started.
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        /// The command line that failed to start.
        command: String,
        /// The underlying spawn failure.
        #[source]
        source: io::Error,
    },

    /// The harness exited before its DAP server reported readiness.
    #[error("process exited with code {code:?} before the DAP server was ready")]
    PrematureExit {
        /// The exit code, if the process exited rather than being killed.
        code: Option<i32>,
    },

    /// No probe connection succeeded before the attach deadline.
    #[error("timeout waiting for {host}:{port} after {timeout:?}")]
    ProbeTimeout {
        /// The probed host.
        host: String,
        /// The probed port.
        port: u16,
        /// The deadline that was exceeded.
        timeout: Duration,
    },
}
