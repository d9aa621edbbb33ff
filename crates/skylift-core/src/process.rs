//! Line-streamed subprocess execution.
//!
//! External tools (image builder, cluster CLI) produce output that must
//! reach an observer while the process runs, not after it exits. This
//! module spawns a process with piped output, relays each line through a
//! [`LineSink`] the moment it is read, and returns the exit status.

use std::process::{ExitStatus, Stdio};

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::event::LineSink;

/// Errors from streamed subprocess execution.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The process could not be spawned.
    #[error("failed to spawn process: {0}")]
    Spawn(std::io::Error),

    /// Waiting for the process failed.
    #[error("failed to wait for process: {0}")]
    Wait(std::io::Error),

    /// The consumer abandoned the stream; the process was killed.
    #[error("output stream abandoned, process terminated")]
    Abandoned,
}

/// Spawn a process and relay stdout and stderr lines into the sink.
///
/// A non-zero exit is not an error here; callers translate the returned
/// status into their own phase outcome. When the consuming stream is
/// abandoned the process is killed rather than left producing output
/// nobody reads.
pub async fn stream_lines(mut cmd: Command, sink: &LineSink) -> Result<ExitStatus, ProcessError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(ProcessError::Spawn)?;

    let stdout_task = forward_lines(child.stdout.take(), sink.clone());
    let stderr_task = forward_lines(child.stderr.take(), sink.clone());

    let abandoned = {
        let sink = sink.clone();
        async move {
            while !sink.is_abandoned() {
                tokio::time::sleep(std::time::Duration::from_millis(250)).await;
            }
        }
    };

    let status = tokio::select! {
        status = child.wait() => status.map_err(ProcessError::Wait)?,
        () = abandoned => {
            warn!("output stream abandoned, killing process");
            child.kill().await.ok();
            return Err(ProcessError::Abandoned);
        }
    };

    // Drain whatever the readers still hold before reporting the exit.
    stdout_task.await.ok();
    stderr_task.await.ok();

    debug!(status = %status, "process finished");
    Ok(status)
}

fn forward_lines<R>(reader: Option<R>, sink: LineSink) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(reader) = reader else { return };
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if !sink.line(line) {
                break;
            }
        }
    })
}
