//! Plugin invoker
//!
//! Runs one plugin executable per call, races it against a deadline and
//! classifies the outcome. Only standard output is captured.

use crate::metrics;
use plugbot_core::config::InvokerConfig;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::Semaphore;

/// How long output is still collected once the plugin has exited
const OUTPUT_GRACE: Duration = Duration::from_millis(100);

/// Why an invocation did not complete cleanly
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The executable could not be started
    #[error("failed to launch plugin: {0}")]
    Launch(#[source] std::io::Error),

    /// The plugin exited with a nonzero code, or was killed by a signal (`None`)
    #[error("plugin exited with {}", describe_exit(.code))]
    Exit { code: Option<i32> },

    /// The deadline elapsed and the plugin was killed
    #[error("plugin timed out after {0:?}")]
    Timeout(Duration),

    /// Reading the plugin's output or waiting on it failed
    #[error("plugin i/o failed: {0}")]
    Io(#[source] std::io::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "a signal".to_string(),
    }
}

/// Completion status of an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationStatus {
    /// Exited with code 0
    Success,
    /// Exited with a nonzero code (`None` when terminated by a signal)
    NonZeroExit { code: Option<i32> },
    /// The process never started
    LaunchFailed,
    /// Killed at the deadline
    TimedOut,
    /// Killed because its output or exit status could not be collected;
    /// says nothing about the plugin's own health
    IoFailed,
}

impl InvocationStatus {
    /// Short label used in logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NonZeroExit { .. } => "nonzero_exit",
            Self::LaunchFailed => "launch_failed",
            Self::TimedOut => "timed_out",
            Self::IoFailed => "io_failed",
        }
    }
}

/// Outcome of one invocation, owned by the caller
#[derive(Debug)]
pub struct InvocationResult {
    /// Captured standard output (lossy UTF-8); partial when timed out
    pub output: String,
    /// How the invocation ended
    pub status: InvocationStatus,
    /// Error detail for every status except `Success`
    pub error: Option<InvokeError>,
    /// Wall-clock time from spawn to return
    pub elapsed: Duration,
    /// OS process id, if the process was started
    pub pid: Option<u32>,
}

impl InvocationResult {
    /// Whether the plugin exited with code 0
    pub fn is_success(&self) -> bool {
        self.status == InvocationStatus::Success
    }
}

/// Split an argument string on whitespace.
///
/// An empty or blank string yields no arguments at all.
pub fn tokenize(arguments: &str) -> Vec<String> {
    arguments.split_whitespace().map(str::to_string).collect()
}

/// Executes plugins under a deadline.
///
/// Cloning is cheap; clones share the concurrency limit.
#[derive(Debug, Clone)]
pub struct Invoker {
    timeout: Duration,
    limiter: Option<Arc<Semaphore>>,
}

impl Invoker {
    /// Create an invoker from configuration
    pub fn new(config: &InvokerConfig) -> Self {
        let limiter = match config.max_concurrent {
            0 => None,
            permits => Some(Arc::new(Semaphore::new(permits))),
        };
        Self {
            timeout: config.timeout(),
            limiter,
        }
    }

    /// Configured deadline
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `path` with the whitespace-split `arguments` under the configured deadline
    pub async fn run(&self, path: &Path, arguments: &str) -> InvocationResult {
        self.run_with_timeout(path, arguments, self.timeout).await
    }

    /// Run `path` with an explicit deadline
    pub async fn run_with_timeout(
        &self,
        path: &Path,
        arguments: &str,
        timeout: Duration,
    ) -> InvocationResult {
        // the semaphore is never closed
        let _permit = match &self.limiter {
            Some(limiter) => limiter.acquire().await.ok(),
            None => None,
        };

        let args = tokenize(arguments);
        tracing::info!(command = %path.display(), args = args.len(), "starting exec");

        let started = Instant::now();
        let spawned = Command::new(path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                return finish(InvocationResult {
                    output: String::new(),
                    status: InvocationStatus::LaunchFailed,
                    error: Some(InvokeError::Launch(e)),
                    elapsed: started.elapsed(),
                    pid: None,
                });
            }
        };

        let pid = child.id();
        let mut stdout = child.stdout.take();
        let mut buf = Vec::new();

        // The exit status decides completion, not EOF: a background child
        // can hold the pipe open long after the plugin itself has exited.
        let ended = {
            let reading = async {
                match stdout.as_mut() {
                    Some(out) => drain(out, &mut buf).await,
                    None => Ok(()),
                }
            };
            tokio::pin!(reading);
            let deadline = tokio::time::sleep(timeout);
            tokio::pin!(deadline);

            let mut read_done = false;
            let ended = loop {
                tokio::select! {
                    read = &mut reading, if !read_done => {
                        read_done = true;
                        if let Err(e) = read {
                            break Ended::Io(e);
                        }
                    }
                    exit = child.wait() => match exit {
                        Ok(exit) => break Ended::Exited(exit),
                        Err(e) => break Ended::Io(e),
                    },
                    _ = &mut deadline => break Ended::Deadline,
                }
            };

            if matches!(ended, Ended::Exited(_)) && !read_done {
                match tokio::time::timeout(OUTPUT_GRACE, &mut reading).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::debug!(?pid, error = %e, "output read failed after exit"),
                    Err(_) => tracing::debug!(?pid, "stdout still open after exit, not waiting for it"),
                }
            }
            ended
        };
        drop(stdout);

        let (status, error) = match ended {
            Ended::Exited(exit) => classify(exit),
            Ended::Io(e) => {
                terminate(&mut child, pid).await;
                (InvocationStatus::IoFailed, Some(InvokeError::Io(e)))
            }
            Ended::Deadline => {
                terminate(&mut child, pid).await;
                (InvocationStatus::TimedOut, Some(InvokeError::Timeout(timeout)))
            }
        };

        finish(InvocationResult {
            output: String::from_utf8_lossy(&buf).into_owned(),
            status,
            error,
            elapsed: started.elapsed(),
            pid,
        })
    }
}

/// First thing that ended the race against the deadline
enum Ended {
    Exited(ExitStatus),
    Io(std::io::Error),
    Deadline,
}

/// Read `out` to EOF, appending to `buf` chunk by chunk.
///
/// Only complete reads are appended, so `buf` keeps everything received so
/// far if this future is dropped at the deadline.
async fn drain<R>(out: &mut R, buf: &mut Vec<u8>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 4096];
    loop {
        let n = out.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn classify(exit: ExitStatus) -> (InvocationStatus, Option<InvokeError>) {
    if exit.success() {
        (InvocationStatus::Success, None)
    } else {
        let code = exit.code();
        (
            InvocationStatus::NonZeroExit { code },
            Some(InvokeError::Exit { code }),
        )
    }
}

/// Kill the child and reap it. Failures are logged only.
async fn terminate(child: &mut Child, pid: Option<u32>) {
    if let Err(e) = child.start_kill() {
        tracing::warn!(?pid, error = %e, "failed to kill plugin process");
    }
    if let Err(e) = child.wait().await {
        tracing::warn!(?pid, error = %e, "failed to reap plugin process");
    }
}

fn finish(result: InvocationResult) -> InvocationResult {
    tracing::debug!(
        status = result.status.label(),
        elapsed = ?result.elapsed,
        bytes = result.output.len(),
        "exec finished"
    );
    metrics::record(result.status.label(), result.elapsed);
    result
}
