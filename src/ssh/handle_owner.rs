//! Handle Owner Task
//!
//! Only one task owns the `Handle<ClientHandler>` of a connection. Everything
//! else talks to it through a cloneable [`HandleController`] that sends
//! commands over an mpsc channel, so the handle is never shared behind a lock
//! across `.await` points.
//!
//! The task ends when every controller is dropped, when a disconnect is
//! requested, or when the transport closes underneath it. Once it has ended,
//! [`HandleController::is_connected`] returns `false`, which is how the
//! registry notices a remote-initiated close.

use std::time::Duration;

use russh::client::{Handle, Msg};
use russh::Channel;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::client::ClientHandler;
use super::error::ConnectionError;

/// How often the owner task checks whether the transport is still open
const TRANSPORT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Commands sent to the Handle Owner Task
pub enum HandleCommand {
    /// Open a session channel (SFTP subsystem or exec)
    ChannelOpenSession {
        reply_tx: oneshot::Sender<Result<Channel<Msg>, russh::Error>>,
    },

    /// Disconnect the SSH connection
    Disconnect,
}

/// Controller for sending commands to the Handle Owner Task
#[derive(Clone)]
pub struct HandleController {
    cmd_tx: mpsc::Sender<HandleCommand>,
}

impl HandleController {
    /// Wrap an existing command sender. Used by tests; production code goes
    /// through [`spawn_handle_owner_task`].
    pub fn new(cmd_tx: mpsc::Sender<HandleCommand>) -> Self {
        Self { cmd_tx }
    }

    /// Open a session channel
    pub async fn open_session_channel(&self) -> Result<Channel<Msg>, ConnectionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(HandleCommand::ChannelOpenSession { reply_tx })
            .await
            .map_err(|_| ConnectionError::Disconnected)?;
        reply_rx
            .await
            .map_err(|_| ConnectionError::Disconnected)?
            .map_err(|e| ConnectionError::Channel(format!("Channel open failure: {}", e)))
    }

    /// Disconnect the SSH connection
    pub async fn disconnect(&self) {
        let _ = self.cmd_tx.send(HandleCommand::Disconnect).await;
    }

    /// Check if the Handle Owner Task is still running
    pub fn is_connected(&self) -> bool {
        !self.cmd_tx.is_closed()
    }
}

/// Spawn the Handle Owner Task, consuming the handle
pub fn spawn_handle_owner_task(
    handle: Handle<ClientHandler>,
    connection_id: String,
) -> HandleController {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<HandleCommand>(64);

    tokio::spawn(async move {
        let handle = handle;
        let mut transport_poll = tokio::time::interval(TRANSPORT_POLL_INTERVAL);

        info!("Handle owner task started for {}", connection_id);

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(HandleCommand::ChannelOpenSession { reply_tx }) => {
                        let result = handle.channel_open_session().await;
                        if reply_tx.send(result).is_err() {
                            warn!("Caller dropped before receiving channel_open_session result");
                        }
                    }
                    Some(HandleCommand::Disconnect) => {
                        info!("Disconnect requested for {}", connection_id);
                        break;
                    }
                    None => {
                        info!("All controllers dropped for {}", connection_id);
                        break;
                    }
                },
                _ = transport_poll.tick() => {
                    if handle.is_closed() {
                        info!("SSH connection closed by remote: {}", connection_id);
                        break;
                    }
                }
            }
        }

        drain_pending_commands(&mut cmd_rx);

        let _ = handle
            .disconnect(russh::Disconnect::ByApplication, "Session closed", "en")
            .await;
        debug!("Handle owner task terminated for {}", connection_id);
    });

    HandleController { cmd_tx }
}

/// Drain all pending commands, returning Disconnect to each waiting caller
fn drain_pending_commands(cmd_rx: &mut mpsc::Receiver<HandleCommand>) {
    cmd_rx.close();

    while let Ok(cmd) = cmd_rx.try_recv() {
        match cmd {
            HandleCommand::ChannelOpenSession { reply_tx } => {
                let _ = reply_tx.send(Err(russh::Error::Disconnect));
            }
            HandleCommand::Disconnect => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_controller_reports_closed_owner() {
        let (tx, rx) = mpsc::channel(1);
        let controller = HandleController::new(tx);
        assert!(controller.is_connected());

        drop(rx);
        assert!(!controller.is_connected());
    }

    #[tokio::test]
    async fn test_open_channel_after_owner_exit_is_disconnected() {
        let (tx, rx) = mpsc::channel(1);
        let controller = HandleController::new(tx);
        drop(rx);

        let err = controller.open_session_channel().await.err().unwrap();
        assert!(matches!(err, ConnectionError::Disconnected));
    }
}
