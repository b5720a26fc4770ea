//! SSH Connection Registry
//!
//! Owns the live session of every connection identity together with the
//! config it was created from, so a dropped session can be rebuilt silently
//! (see [`super::supervisor`]).
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  ConnectionRegistry                                 │
//! │  ├── sessions: identity → Session   (at most one)   │
//! │  └── configs:  identity → ConnectionConfig          │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Lifecycle
//!
//! - `connect` stores the config first and drops it again if authentication
//!   fails.
//! - Inserting a session for an identity that already has one replaces (and
//!   closes) the old one.
//! - A session whose transport has died is pruned on the next `get`.
//! - `disconnect` removes both the session and the config, so nothing
//!   reconnects behind the caller's back afterwards.

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use super::config::{ConnectionConfig, ConnectionIdentity};
use super::error::ConnectionError;

/// A session the registry can hold
#[async_trait]
pub trait ManagedSession: Clone + Send + Sync + 'static {
    /// Whether the underlying transport is still usable
    fn is_alive(&self) -> bool;

    /// Terminate the transport
    async fn close(&self);
}

/// Creates sessions from configs
#[async_trait]
pub trait SessionConnector: Send + Sync + 'static {
    type Session: ManagedSession;

    async fn establish(
        &self,
        identity: &ConnectionIdentity,
        config: &ConnectionConfig,
    ) -> Result<Self::Session, ConnectionError>;
}

/// Registry of live sessions and their reconnection configs
pub struct ConnectionRegistry<C: SessionConnector> {
    connector: C,
    sessions: DashMap<ConnectionIdentity, C::Session>,
    configs: DashMap<ConnectionIdentity, ConnectionConfig>,
}

impl<C: SessionConnector> ConnectionRegistry<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            sessions: DashMap::new(),
            configs: DashMap::new(),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Authenticate a new session for `config` and store it under its
    /// identity.
    pub async fn connect(
        &self,
        config: ConnectionConfig,
    ) -> Result<ConnectionIdentity, ConnectionError> {
        let identity = config.identity();

        // Same slot, different credentials, while the old session is in use
        if self.get(&identity).is_some() {
            let conflicting = self
                .configs
                .get(&identity)
                .map(|stored| stored.credential != config.credential)
                .unwrap_or(false);
            if conflicting {
                return Err(ConnectionError::IdentityConflict(identity.to_string()));
            }
        }

        info!(
            "Creating SSH connection {} -> {}@{}:{}",
            identity, config.username, config.host, config.port
        );

        self.configs.insert(identity.clone(), config.clone());

        match self.connector.establish(&identity, &config).await {
            Ok(session) => {
                self.install(&identity, session).await;
                Ok(identity)
            }
            Err(e) => {
                warn!("SSH connection error for {}: {}", identity, e);
                self.configs.remove(&identity);
                Err(e)
            }
        }
    }

    /// Terminate and forget a session. Succeeds whether or not one existed.
    pub async fn disconnect(&self, identity: &ConnectionIdentity) {
        self.configs.remove(identity);

        if let Some((_, session)) = self.sessions.remove(identity) {
            session.close().await;
            info!("Connection {} disconnected and removed", identity);
        } else {
            debug!("Disconnect for {}: no live session", identity);
        }
    }

    /// Live session for `identity`, pruning it if the transport has died
    pub fn get(&self, identity: &ConnectionIdentity) -> Option<C::Session> {
        let session = self.sessions.get(identity).map(|entry| entry.value().clone())?;

        if session.is_alive() {
            return Some(session);
        }

        info!("SSH connection ended: {}", identity);
        self.sessions
            .remove_if(identity, |_, stored| !stored.is_alive());
        None
    }

    /// Stored reconnection config for `identity`
    pub fn config(&self, identity: &ConnectionIdentity) -> Option<ConnectionConfig> {
        self.configs.get(identity).map(|entry| entry.value().clone())
    }

    /// Put `session` under `identity`, closing any session it replaces
    pub(crate) async fn install(&self, identity: &ConnectionIdentity, session: C::Session) {
        if let Some(previous) = self.sessions.insert(identity.clone(), session) {
            debug!("Replacing existing session for {}", identity);
            previous.close().await;
        }
    }

    /// Number of sessions currently stored (live or not yet pruned)
    pub fn connection_count(&self) -> usize {
        self.sessions.len()
    }

    /// Disconnect everything (application shutdown)
    pub async fn disconnect_all(&self) {
        let identities: Vec<ConnectionIdentity> =
            self.sessions.iter().map(|e| e.key().clone()).collect();

        info!("Disconnecting {} SSH connections", identities.len());

        for identity in identities {
            self.disconnect(&identity).await;
        }
        self.configs.clear();
    }
}
