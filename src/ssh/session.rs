//! Live SSH session handle
//!
//! A [`RemoteSession`] is what the registry stores per identity: a cheap,
//! cloneable wrapper around the [`HandleController`] of one authenticated
//! connection. SFTP channels and exec channels are opened from it on demand.

use std::time::Duration;

use async_trait::async_trait;
use russh::ChannelMsg;
use tracing::{debug, warn};

use super::config::ConnectionIdentity;
use super::connection_registry::ManagedSession;
use super::error::ConnectionError;
use super::handle_owner::HandleController;

/// Upper bound on a single remote command
const EXEC_TIMEOUT: Duration = Duration::from_secs(30);

/// Output of a remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the server closed the channel without an exit status
    pub exit_code: Option<u32>,
}

/// Anything that can run a shell command on the remote host
#[async_trait]
pub trait RemoteExec: Send + Sync {
    async fn exec(&self, command: &str) -> Result<ExecOutput, ConnectionError>;
}

/// An authenticated SSH connection
#[derive(Clone)]
pub struct RemoteSession {
    identity: ConnectionIdentity,
    controller: HandleController,
}

impl RemoteSession {
    pub fn new(identity: ConnectionIdentity, controller: HandleController) -> Self {
        Self {
            identity,
            controller,
        }
    }

    pub fn identity(&self) -> &ConnectionIdentity {
        &self.identity
    }

    pub fn controller(&self) -> &HandleController {
        &self.controller
    }
}

#[async_trait]
impl ManagedSession for RemoteSession {
    fn is_alive(&self) -> bool {
        self.controller.is_connected()
    }

    async fn close(&self) {
        self.controller.disconnect().await;
    }
}

#[async_trait]
impl RemoteExec for RemoteSession {
    async fn exec(&self, command: &str) -> Result<ExecOutput, ConnectionError> {
        let mut channel = self.controller.open_session_channel().await?;

        debug!("Remote exec on {}: {}", self.identity, command);

        channel
            .exec(true, command)
            .await
            .map_err(|e| ConnectionError::Channel(format!("SSH exec error: {}", e)))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code: Option<u32> = None;

        let drained = tokio::time::timeout(EXEC_TIMEOUT, async {
            loop {
                match channel.wait().await {
                    Some(ChannelMsg::Data { data }) => stdout.extend_from_slice(&data),
                    // ext 1 is stderr
                    Some(ChannelMsg::ExtendedData { data, ext: 1 }) => {
                        stderr.extend_from_slice(&data)
                    }
                    Some(ChannelMsg::ExitStatus { exit_status }) => exit_code = Some(exit_status),
                    Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => break,
                    Some(_) => {}
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!("Remote exec timed out on {}: {}", self.identity, command);
            let _ = channel.close().await;
            return Err(ConnectionError::Timeout(format!(
                "Command timed out after {} seconds",
                EXEC_TIMEOUT.as_secs()
            )));
        }

        // Eof can arrive before the exit status
        if exit_code.is_none() {
            while let Ok(Some(msg)) =
                tokio::time::timeout(Duration::from_millis(500), channel.wait()).await
            {
                if let ChannelMsg::ExitStatus { exit_status } = msg {
                    exit_code = Some(exit_status);
                    break;
                }
            }
        }

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
            exit_code,
        })
    }
}
