//! Debug session orchestration.
//!
//! A [`Session`] either launches a Go harness program that embeds a DAP
//! server, or attaches to one that is already running, and hands back the
//! TCP endpoint the debugging front end should connect to.
//!
//! For launches the harness is run as `go run [buildArgs...] . --port
//! <port> [args...]` from its package directory and supervised until it
//! prints the readiness marker on stderr; whichever of readiness and
//! process exit happens first decides the outcome. For attaches the
//! configured endpoint is probed until it accepts a connection or the
//! deadline passes.

use std::time::Duration;

use session_config::{RequestKind, SessionConfig};
use supervisor::{ReadinessWatch, SupervisedProcess};

mod error;
pub mod probe;

pub use error::SessionError;

/// How long an attach request probes the endpoint before giving up.
pub const ATTACH_TIMEOUT: Duration = Duration::from_secs(30);

/// The toolchain binary used to run the harness package.
const DEFAULT_RUNNER: &str = "go";

/// A connection endpoint handed back to the debugging front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Orchestrates one debugging session at a time.
///
/// The session owns at most one supervised harness process. Beginning a new
/// session kills a stale process first, and [`Session::end`] kills the
/// active one; both are safe to call when no process is running.
pub struct Session {
    runner: String,
    attach_timeout: Duration,
    process: Option<SupervisedProcess>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_runner(DEFAULT_RUNNER)
    }

    /// Use a different toolchain binary in place of `go`.
    pub fn with_runner(runner: impl Into<String>) -> Self {
        Self {
            runner: runner.into(),
            attach_timeout: ATTACH_TIMEOUT,
            process: None,
        }
    }

    /// Override the attach probe deadline (defaults to [`ATTACH_TIMEOUT`]).
    pub fn attach_timeout(mut self, timeout: Duration) -> Self {
        self.attach_timeout = timeout;
        self
    }

    /// Begin a session for `config`, returning the endpoint the front end
    /// should open its DAP connection to.
    #[tracing::instrument(skip(self, config), fields(request = ?config.request))]
    pub async fn begin(&mut self, config: &SessionConfig) -> Result<Endpoint, SessionError> {
        // a stale process from an earlier session must not outlive it
        self.end();

        match config.request {
            RequestKind::Launch => self.launch(config).await,
            RequestKind::Attach => {
                probe::wait_for_port(&config.host, config.port, self.attach_timeout).await?;
                Ok(Endpoint {
                    host: config.host.clone(),
                    port: config.port,
                })
            }
        }
    }

    /// End the session, terminating the supervised process if one is
    /// active. Calling this with no active process is a no-op.
    pub fn end(&mut self) {
        if let Some(mut process) = self.process.take() {
            tracing::debug!(pid = ?process.id(), "ending session");
            process.terminate();
        }
    }

    /// OS pid of the supervised harness process, if a launch is active.
    pub fn process_id(&self) -> Option<u32> {
        self.process.as_ref().and_then(|p| p.id())
    }

    async fn launch(&mut self, config: &SessionConfig) -> Result<Endpoint, SessionError> {
        let Some(program) = config.program.as_deref() else {
            return Err(SessionError::MissingProgram);
        };

        let args = run_args(config);
        let cwd = config.cwd.as_deref().unwrap_or(program);
        let command = format!("{} {}", self.runner, args.join(" "));
        tracing::info!(cwd = %cwd.display(), %command, "launching harness");

        let (mut process, output) = SupervisedProcess::spawn(&self.runner, &args, cwd, &config.env)
            .map_err(|source| SessionError::Spawn {
                command: command.clone(),
                source,
            })?;

        let ready = ReadinessWatch::subscribe(output);
        tokio::select! {
            // a marker printed just before exit still counts as ready
            biased;

            _ = ready.ready() => {
                tracing::debug!("harness ready");
                self.process = Some(process);
                Ok(Endpoint {
                    host: config.host.clone(),
                    port: config.port,
                })
            }
            code = process.wait() => {
                tracing::warn!(?code, "harness exited before readiness");
                Err(SessionError::PrematureExit { code })
            }
        }
    }
}

/// Argument list for the harness invocation:
/// `run [buildArgs...] . --port <port> [args...]`
fn run_args(config: &SessionConfig) -> Vec<String> {
    let mut args = vec!["run".to_string()];
    args.extend(config.build_args.iter().cloned());
    args.push(".".to_string());
    args.push("--port".to_string());
    args.push(config.port.to_string());
    args.extend(config.args.iter().cloned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_args_order() {
        let mut config = SessionConfig::launch("/pkg");
        config.build_args = vec!["-tags".to_string(), "debug".to_string()];
        config.args = vec!["--script".to_string(), "foo.ts".to_string()];

        assert_eq!(
            run_args(&config),
            ["run", "-tags", "debug", ".", "--port", "4711", "--script", "foo.ts"]
        );
    }

    #[test]
    fn endpoint_display() {
        let endpoint = Endpoint {
            host: "127.0.0.1".to_string(),
            port: 4711,
        };
        assert_eq!(endpoint.to_string(), "127.0.0.1:4711");
    }
}
