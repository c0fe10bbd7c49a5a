use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::BridgeError;

const CHANNEL_CAPACITY: usize = 64;

/// Line-oriented duplex channel to the helper. The bridge only sees channels,
/// so tests can substitute an in-memory pair for the real child process.
pub struct Transport {
    pub(crate) outgoing: mpsc::Sender<String>,
    pub(crate) incoming: mpsc::Receiver<String>,
}

/// The far end of [`Transport::pair`]: receives request lines, sends response
/// and event lines. Test-side stand-in for the helper process.
pub struct TransportPeer {
    pub tx: mpsc::Sender<String>,
    pub rx: mpsc::Receiver<String>,
}

impl Transport {
    /// In-memory transport for tests and for wiring without a real helper.
    pub fn pair() -> (Transport, TransportPeer) {
        let (out_tx, out_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (in_tx, in_rx) = mpsc::channel(CHANNEL_CAPACITY);
        (
            Transport {
                outgoing: out_tx,
                incoming: in_rx,
            },
            TransportPeer {
                tx: in_tx,
                rx: out_rx,
            },
        )
    }

    /// Spawn the helper binary and pump line-delimited JSON over its stdio.
    /// The child is reaped by the reader task once stdout closes.
    pub fn spawn_helper(path: &Path) -> Result<Transport, BridgeError> {
        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BridgeError::Io(format!("spawn {}: {}", path.display(), e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::Io("helper stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::Io("helper stdout not captured".into()))?;

        let (out_tx, mut out_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
        let (in_tx, in_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);

        tokio::spawn(async move {
            while let Some(line) = out_rx.recv().await {
                if stdin.write_all(line.as_bytes()).await.is_err()
                    || stdin.write_all(b"\n").await.is_err()
                    || stdin.flush().await.is_err()
                {
                    warn!("helper stdin closed, stopping writer");
                    break;
                }
            }
        });

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if in_tx.send(line).await.is_err() {
                            debug!("bridge dropped, stopping helper reader");
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("helper stdout read error: {}", e);
                        break;
                    }
                }
            }
            match child.wait().await {
                Ok(status) => info!("native helper exited: {}", status),
                Err(e) => warn!("failed to reap native helper: {}", e),
            }
        });

        Ok(Transport {
            outgoing: out_tx,
            incoming: in_rx,
        })
    }
}
