//! Session supervision
//!
//! Every remote operation asks for a usable session first. If the registry
//! no longer holds a live one (remote close, keep-alive failure), the stored
//! config is used to reconnect transparently under the same identity.

use tracing::{info, warn};

use super::config::ConnectionIdentity;
use super::connection_registry::{ConnectionRegistry, SessionConnector};
use super::error::ConnectionError;

impl<C: SessionConnector> ConnectionRegistry<C> {
    /// Return a live session for `identity`, reconnecting from the stored
    /// config when needed.
    ///
    /// A failed reconnect keeps the stored config so a later call can try
    /// again.
    pub async fn ensure_usable(
        &self,
        identity: &ConnectionIdentity,
    ) -> Result<C::Session, ConnectionError> {
        if let Some(session) = self.get(identity) {
            return Ok(session);
        }

        let config = self
            .config(identity)
            .ok_or_else(|| ConnectionError::NoReconnectConfig(identity.to_string()))?;

        info!("Reconnecting SSH session for {}", identity);

        match self.connector().establish(identity, &config).await {
            Ok(session) => {
                self.install(identity, session.clone()).await;
                info!("Reconnected SSH session for {}", identity);
                Ok(session)
            }
            Err(e) => {
                warn!("Reconnection failed for {}: {}", identity, e);
                Err(ConnectionError::ReconnectFailed(Box::new(e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use crate::ssh::connection_registry::tests::{config, MockConnector};
    use crate::ssh::connection_registry::ConnectionRegistry;
    use crate::ssh::error::ConnectionError;
    use crate::ssh::ConnectionIdentity;

    #[tokio::test]
    async fn test_live_session_returned_unchanged() {
        let registry = ConnectionRegistry::new(MockConnector::default());
        let identity = registry.connect(config("pw")).await.unwrap();

        let session = registry.ensure_usable(&identity).await.ok().unwrap();

        assert_eq!(session.serial, 1);
        assert_eq!(registry.connector().attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dead_session_reconnects_with_stored_config() {
        let registry = ConnectionRegistry::new(MockConnector::default());
        let identity = registry.connect(config("pw")).await.unwrap();
        registry.get(&identity).unwrap().kill();

        let session = registry.ensure_usable(&identity).await.ok().unwrap();

        assert_eq!(session.serial, 2);
        assert_eq!(registry.get(&identity).unwrap().serial, 2);
        assert_eq!(registry.connector().seen.lock().unwrap()[1], config("pw"));
    }

    #[tokio::test]
    async fn test_unknown_identity_has_no_config() {
        let registry = ConnectionRegistry::new(MockConnector::default());

        let err = registry
            .ensure_usable(&ConnectionIdentity::from("ghost:22:nobody"))
            .await
            .err()
            .unwrap();

        assert!(matches!(err, ConnectionError::NoReconnectConfig(_)));
    }

    #[tokio::test]
    async fn test_failed_reconnect_keeps_config() {
        let registry = ConnectionRegistry::new(MockConnector::default());
        let identity = registry.connect(config("pw")).await.unwrap();
        registry.get(&identity).unwrap().kill();
        registry.connector().fail.store(true, Ordering::SeqCst);

        let err = registry.ensure_usable(&identity).await.err().unwrap();

        assert!(matches!(err, ConnectionError::ReconnectFailed(_)));
        assert!(registry.config(&identity).is_some());

        registry.connector().fail.store(false, Ordering::SeqCst);
        assert!(registry.ensure_usable(&identity).await.is_ok());
    }

    #[tokio::test]
    async fn test_no_reconnect_after_explicit_disconnect() {
        let registry = ConnectionRegistry::new(MockConnector::default());
        let identity = registry.connect(config("pw")).await.unwrap();

        registry.disconnect(&identity).await;
        let err = registry.ensure_usable(&identity).await.err().unwrap();

        assert!(matches!(err, ConnectionError::NoReconnectConfig(_)));
        assert_eq!(registry.connector().attempts.load(Ordering::SeqCst), 1);
    }
}
