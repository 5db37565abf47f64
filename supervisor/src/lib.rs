//! Supervision of a single debug harness child process.
//!
//! [`SupervisedProcess`] owns the child process handle and republishes its
//! stdout/stderr as line events; [`ReadinessWatch`] turns that stream into a
//! one-shot readiness signal. The caller races readiness against
//! [`SupervisedProcess::wait`] so a process that dies before becoming ready
//! resolves the launch as a failure instead of hanging.

use std::{collections::HashMap, ffi::OsStr, io, path::Path, process::Stdio};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child, Command},
    sync::mpsc,
};

mod readiness;
pub use readiness::{READY_MARKER, ReadinessWatch};

/// Which stream of the child produced a line of output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    Stdout,
    Stderr,
}

/// One line of child output, republished to subscribers.
#[derive(Debug, Clone)]
pub struct OutputChunk {
    pub source: OutputSource,
    pub line: String,
}

/// A child process whose output streams are captured and whose lifetime is
/// owned by the caller.
///
/// There is exactly one terminal event per process: either spawning fails
/// (reported synchronously by [`SupervisedProcess::spawn`]) or the process
/// exits and [`SupervisedProcess::wait`] yields the exit code. The process
/// is killed when the handle is dropped.
pub struct SupervisedProcess {
    child: Child,
}

impl SupervisedProcess {
    /// Spawn `program` with the given arguments, working directory and
    /// environment overrides (overlaid on the inherited environment,
    /// override wins).
    ///
    /// Returns the process handle and the receiving end of its output
    /// stream.
    pub fn spawn(
        program: impl AsRef<OsStr>,
        args: &[String],
        cwd: &Path,
        env: &HashMap<String, String>,
    ) -> io::Result<(Self, mpsc::UnboundedReceiver<OutputChunk>)> {
        let mut child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .envs(env)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let stdout = child.stdout.take().unwrap();
        let stderr = child.stderr.take().unwrap();
        republish(stdout, OutputSource::Stdout, tx.clone());
        republish(stderr, OutputSource::Stderr, tx);

        Ok((Self { child }, rx))
    }

    /// OS pid, while the process is still running.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the process to exit, yielding its exit code if it had one.
    pub async fn wait(&mut self) -> Option<i32> {
        match self.child.wait().await {
            Ok(status) => status.code(),
            Err(e) => {
                tracing::warn!(error = %e, "waiting for process exit");
                None
            }
        }
    }

    /// Deliver a termination signal without waiting for the exit.
    ///
    /// Failure to deliver means the process is already gone, so it is
    /// logged and swallowed.
    pub fn terminate(&mut self) {
        tracing::debug!("terminating supervised process");
        if let Err(e) = self.child.start_kill() {
            tracing::warn!(error = %e, "could not terminate process");
        }
    }
}

fn republish(
    stream: impl AsyncRead + Unpin + Send + 'static,
    source: OutputSource,
    tx: mpsc::UnboundedSender<OutputChunk>,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "reading process output");
                    break;
                }
            };
            tracing::debug!(?source, %line, "harness output");
            let _ = tx.send(OutputChunk { source, line });
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_sh(script: &str) -> (SupervisedProcess, mpsc::UnboundedReceiver<OutputChunk>) {
        SupervisedProcess::spawn(
            "sh",
            &["-c".to_string(), script.to_string()],
            Path::new("."),
            &HashMap::new(),
        )
        .expect("spawning sh")
    }

    async fn collect(mut output: mpsc::UnboundedReceiver<OutputChunk>) -> Vec<OutputChunk> {
        let mut chunks = Vec::new();
        while let Some(chunk) = output.recv().await {
            chunks.push(chunk);
        }
        chunks
    }

    #[tokio::test]
    async fn republishes_output_lines() {
        let (mut process, output) = spawn_sh("echo out; echo err >&2");
        let chunks = collect(output).await;
        process.wait().await;

        assert!(
            chunks
                .iter()
                .any(|c| c.source == OutputSource::Stdout && c.line == "out")
        );
        assert!(
            chunks
                .iter()
                .any(|c| c.source == OutputSource::Stderr && c.line == "err")
        );
    }

    #[tokio::test]
    async fn exit_code_is_reported() {
        let (mut process, _output) = spawn_sh("exit 3");
        assert_eq!(process.wait().await, Some(3));
    }

    #[tokio::test]
    async fn env_overlays_inherited_environment() {
        let env = HashMap::from([("HARNESS_FLAG".to_string(), "on".to_string())]);
        let (mut process, output) = SupervisedProcess::spawn(
            "sh",
            &["-c".to_string(), "echo $HARNESS_FLAG".to_string()],
            Path::new("."),
            &env,
        )
        .expect("spawning sh");
        let chunks = collect(output).await;
        process.wait().await;

        assert!(chunks.iter().any(|c| c.line == "on"));
    }

    #[tokio::test]
    async fn runs_from_given_working_directory() {
        let cwd = std::env::temp_dir().canonicalize().unwrap();
        let (mut process, output) = SupervisedProcess::spawn(
            "sh",
            &["-c".to_string(), "pwd -P".to_string()],
            &cwd,
            &HashMap::new(),
        )
        .expect("spawning sh");
        let chunks = collect(output).await;
        process.wait().await;

        assert!(chunks.iter().any(|c| c.line == cwd.display().to_string()));
    }

    #[tokio::test]
    async fn terminate_after_exit_is_noop() {
        let (mut process, _output) = spawn_sh("true");
        process.wait().await;
        process.terminate();
        process.terminate();
    }

    #[tokio::test]
    async fn terminate_kills_running_process() {
        let (mut process, _output) = spawn_sh("sleep 30");
        process.terminate();
        // killed by signal, so no exit code
        assert_eq!(process.wait().await, None);
    }
}
