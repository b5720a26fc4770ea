//! SSH Client implementation using russh

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::keys::key::PrivateKeyWithHashAlg;
use russh::keys::{Algorithm, EcdsaCurve, HashAlg, PrivateKey, PublicKey};
use russh::{cipher, compression, kex, mac, Preferred};
use tracing::{debug, info};

use super::config::{ConnectionConfig, ConnectionIdentity, ConnectionPolicy, Credential};
use super::connection_registry::SessionConnector;
use super::error::ConnectionError;
use super::handle_owner::spawn_handle_owner_task;
use super::session::RemoteSession;

/// Algorithm sets offered during negotiation. Nothing outside these lists is
/// ever negotiated.
pub fn preferred_algorithms() -> Preferred {
    Preferred {
        kex: Cow::Owned(vec![
            kex::ECDH_SHA2_NISTP256,
            kex::ECDH_SHA2_NISTP384,
            kex::ECDH_SHA2_NISTP521,
            kex::DH_G14_SHA256,
            kex::CURVE25519,
            kex::EXTENSION_SUPPORT_AS_CLIENT,
            kex::EXTENSION_OPENSSH_STRICT_KEX_AS_CLIENT,
        ]),
        key: Cow::Owned(vec![
            Algorithm::Ed25519,
            Algorithm::Ecdsa {
                curve: EcdsaCurve::NistP256,
            },
            Algorithm::Ecdsa {
                curve: EcdsaCurve::NistP384,
            },
            Algorithm::Ecdsa {
                curve: EcdsaCurve::NistP521,
            },
            Algorithm::Rsa {
                hash: Some(HashAlg::Sha512),
            },
            Algorithm::Rsa {
                hash: Some(HashAlg::Sha256),
            },
        ]),
        cipher: Cow::Owned(vec![
            cipher::AES_128_CTR,
            cipher::AES_192_CTR,
            cipher::AES_256_CTR,
            cipher::AES_256_GCM,
        ]),
        mac: Cow::Owned(vec![mac::HMAC_SHA256, mac::HMAC_SHA512, mac::HMAC_SHA1]),
        compression: Cow::Owned(vec![compression::NONE]),
    }
}

/// Credential material ready for the authentication step
enum LoadedCredential {
    Key(PrivateKey),
    Password(String),
}

/// Read the credential before touching the network. A missing or unparsable
/// key file fails here.
fn load_credential(credential: &Credential) -> Result<LoadedCredential, ConnectionError> {
    match credential {
        Credential::PrivateKey { key_path } => {
            let text = std::fs::read_to_string(key_path)
                .map_err(|e| ConnectionError::KeyRead(format!("{}: {}", key_path, e)))?;
            let key = russh::keys::decode_secret_key(&text, None)
                .map_err(|e| ConnectionError::KeyRead(format!("{}: {}", key_path, e)))?;
            Ok(LoadedCredential::Key(key))
        }
        Credential::Password { password } => Ok(LoadedCredential::Password(password.clone())),
    }
}

/// Establishes authenticated SSH sessions
pub struct SshConnector {
    policy: ConnectionPolicy,
}

impl SshConnector {
    pub fn new(policy: ConnectionPolicy) -> Self {
        Self { policy }
    }

    fn client_config(&self) -> client::Config {
        client::Config {
            inactivity_timeout: None,
            keepalive_interval: Some(self.policy.keepalive_interval()),
            keepalive_max: self.policy.keepalive_max,
            preferred: preferred_algorithms(),
            ..Default::default()
        }
    }

    async fn authenticate(
        handle: &mut Handle<ClientHandler>,
        username: &str,
        credential: LoadedCredential,
    ) -> Result<(), ConnectionError> {
        let result = match credential {
            LoadedCredential::Password(password) => handle
                .authenticate_password(username, password)
                .await
                .map_err(|e| ConnectionError::Authentication(e.to_string()))?,
            LoadedCredential::Key(key) => {
                let hash = if key.algorithm().is_rsa() {
                    Some(HashAlg::Sha512)
                } else {
                    None
                };
                let key_with_hash = PrivateKeyWithHashAlg::new(Arc::new(key), hash);

                handle
                    .authenticate_publickey(username, key_with_hash)
                    .await
                    .map_err(|e| ConnectionError::Authentication(e.to_string()))?
            }
        };

        if !result.success() {
            return Err(ConnectionError::Authentication(
                "Authentication rejected by server".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for SshConnector {
    fn default() -> Self {
        Self::new(ConnectionPolicy::default())
    }
}

#[async_trait]
impl SessionConnector for SshConnector {
    type Session = RemoteSession;

    async fn establish(
        &self,
        identity: &ConnectionIdentity,
        config: &ConnectionConfig,
    ) -> Result<RemoteSession, ConnectionError> {
        let credential = load_credential(&config.credential)?;

        let addr = format!("{}:{}", config.host, config.port);
        info!("Connecting to SSH server at {}", addr);

        let socket_addr = tokio::net::lookup_host(&addr)
            .await
            .map_err(|e| ConnectionError::Network(format!("Failed to resolve address: {}", e)))?
            .next()
            .ok_or_else(|| ConnectionError::Network("No address found".to_string()))?;

        let ssh_config = Arc::new(self.client_config());
        let handler = ClientHandler::new(config.host.clone(), config.port);
        let username = config.username.clone();

        let handle = tokio::time::timeout(self.policy.timeout(), async move {
            let mut handle = client::connect(ssh_config, socket_addr, handler)
                .await
                .map_err(|e| ConnectionError::Network(e.to_string()))?;
            debug!("SSH handshake completed");

            Self::authenticate(&mut handle, &username, credential).await?;
            Ok::<_, ConnectionError>(handle)
        })
        .await
        .map_err(|_| {
            ConnectionError::Timeout(format!(
                "Connection to {} timed out after {}s",
                addr, self.policy.timeout_secs
            ))
        })??;

        info!("SSH connection established: {}", identity);

        let controller = spawn_handle_owner_task(handle, identity.to_string());
        Ok(RemoteSession::new(identity.clone(), controller))
    }
}

/// Client handler for russh callbacks
pub struct ClientHandler {
    host: String,
    port: u16,
}

impl ClientHandler {
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }
}

impl client::Handler for ClientHandler {
    type Error = ConnectionError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        // Negotiation already restricted the algorithm to the accepted set
        info!(
            "Host key for {}:{} ({}): {}",
            self.host,
            self.port,
            server_public_key.algorithm().as_str(),
            server_public_key.fingerprint(HashAlg::Sha256)
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferred_algorithms_are_restricted() {
        let preferred = preferred_algorithms();
        assert!(preferred.cipher.contains(&cipher::AES_256_CTR));
        assert!(!preferred.cipher.contains(&cipher::CHACHA20_POLY1305));
        assert!(preferred.mac.contains(&mac::HMAC_SHA1));
        assert!(!preferred.key.contains(&Algorithm::Rsa { hash: None }));
        assert_eq!(&*preferred.compression, &[compression::NONE][..]);
    }

    #[test]
    fn test_missing_key_file_is_key_read_error() {
        let err = load_credential(&Credential::private_key("/nonexistent/twinpane/id_ed25519"))
            .err()
            .unwrap();
        assert!(matches!(err, ConnectionError::KeyRead(_)));
    }

    #[test]
    fn test_garbage_key_file_is_key_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id_broken");
        std::fs::write(&path, "not a key").unwrap();

        let err = load_credential(&Credential::private_key(path.to_string_lossy()))
            .err()
            .unwrap();
        assert!(matches!(err, ConnectionError::KeyRead(_)));
    }

    #[tokio::test]
    async fn test_invalid_key_fails_before_network() {
        // The host is unresolvable; a key failure proves no lookup happened
        let connector = SshConnector::default();
        let config = ConnectionConfig::new(
            "host.invalid",
            22,
            "user",
            Credential::private_key("/nonexistent/twinpane/id_rsa"),
        );

        let err = connector
            .establish(&config.identity(), &config)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ConnectionError::KeyRead(_)));
    }
}
