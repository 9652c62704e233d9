//! Sidecar worker process
//!
//! The worker is a Python script speaking line-delimited JSON: requests on
//! stdin, messages on stdout, free-form diagnostics on stderr.

use crate::transport::{ChannelTransport, InboundFrame};
use nai_common::config::sidecar_script;
use nai_common::ipc::JobRequest;
use nai_common::{Error, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Running worker; killed when dropped
pub struct Sidecar {
    child: Child,
}

impl Sidecar {
    /// Start `<python> <root>/sidecar/main.py`.
    ///
    /// Returns the process handle, a transport writing to its stdin and the
    /// stream of frames read from its stdout and stderr.
    pub fn spawn(
        python: &Path,
        root: &Path,
    ) -> Result<(Self, ChannelTransport, mpsc::UnboundedReceiver<InboundFrame>)> {
        let script = sidecar_script(root);
        info!("Spawning sidecar: {} {}", python.display(), script.display());

        let mut child = Command::new(python)
            .arg(&script)
            .current_dir(root)
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONUTF8", "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Transport("sidecar stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Transport("sidecar stdout unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Transport("sidecar stderr unavailable".to_string()))?;

        let (transport, requests) = ChannelTransport::new();
        let (frames_tx, frames) = mpsc::unbounded_channel();

        tokio::spawn(write_requests(stdin, requests));
        tokio::spawn(forward_lines(stdout, frames_tx.clone(), InboundFrame::Message));
        tokio::spawn(forward_lines(stderr, frames_tx, InboundFrame::Log));

        Ok((Self { child }, transport, frames))
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Kill the worker and wait for it to exit.
    pub async fn shutdown(mut self) -> Result<()> {
        self.child.kill().await?;
        debug!("Sidecar stopped");
        Ok(())
    }
}

/// Write each request as one JSON line until the channel or the pipe closes.
///
/// Returning drops the receiver, which makes the transport report itself as
/// disconnected.
async fn write_requests(mut stdin: ChildStdin, mut requests: mpsc::UnboundedReceiver<JobRequest>) {
    while let Some(request) = requests.recv().await {
        let line = match request.to_line() {
            Ok(line) => line,
            Err(e) => {
                warn!("Dropping unserializable request {}: {}", request.id, e);
                continue;
            }
        };
        debug!("-> {}", line);
        let written = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        };
        if let Err(e) = written.await {
            warn!("Sidecar stdin closed: {}", e);
            return;
        }
    }
}

async fn forward_lines<R>(
    reader: R,
    frames: mpsc::UnboundedSender<InboundFrame>,
    wrap: fn(String) -> InboundFrame,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                if frames.send(wrap(line)).is_err() {
                    return;
                }
            }
            Ok(None) => return,
            Err(e) => {
                warn!("Error reading sidecar output: {}", e);
                return;
            }
        }
    }
}
