//! Saved server profiles

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ssh::{ConnectionConfig, ConnectionError};
use crate::sync::BasePathPair;

/// One saved server, as stored in the profile file
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    /// Path to an SSH private key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Base directory of the local pane
    #[serde(default)]
    pub local_folder: String,
    /// Base directory of the remote pane
    #[serde(default)]
    pub remote_folder: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseTunnel>,
}

/// Database reachable through an SSH tunnel
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseTunnel {
    pub name: String,
    pub username: String,
    pub password: String,
    /// Local end of the tunnel
    pub local_port: u16,
}

fn default_port() -> u16 {
    22
}

/// Port of the database on the remote host
const REMOTE_DATABASE_PORT: u16 = 3306;

impl Profile {
    /// Connection config for this profile. The private key wins when both
    /// credentials are present.
    pub fn connection_config(&self) -> Result<ConnectionConfig, ConnectionError> {
        ConnectionConfig::from_parts(
            self.host.clone(),
            Some(self.port),
            self.username.clone(),
            self.private_key.clone(),
            self.password.clone(),
        )
    }

    pub fn base_paths(&self) -> BasePathPair {
        BasePathPair::new(self.local_folder.clone(), self.remote_folder.clone())
    }

    /// Shell command that opens the database tunnel, if one is configured
    pub fn tunnel_command(&self) -> Option<String> {
        self.database.as_ref().map(|db| {
            format!(
                "ssh -f -N -L {}:localhost:{} -p {} {}@{}",
                db.local_port, REMOTE_DATABASE_PORT, self.port, self.username, self.host
            )
        })
    }
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("private_key", &self.private_key)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("local_folder", &self.local_folder)
            .field("remote_folder", &self.remote_folder)
            .field("database", &self.database)
            .finish()
    }
}

impl fmt::Debug for DatabaseTunnel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseTunnel")
            .field("name", &self.name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("local_port", &self.local_port)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::Credential;

    fn profile() -> Profile {
        serde_json::from_str(
            r#"{
                "id": "staging",
                "name": "Staging",
                "host": "staging.example.com",
                "port": 1022,
                "username": "deploy",
                "privateKey": "/home/me/.ssh/staging",
                "localFolder": "/home/me/site",
                "remoteFolder": "/var/www/site",
                "database": {
                    "name": "app",
                    "username": "app",
                    "password": "s3cret",
                    "localPort": 3307
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_connection_config() {
        let config = profile().connection_config().unwrap();
        assert_eq!(config.identity().as_str(), "staging.example.com:1022:deploy");
        assert_eq!(config.credential, Credential::private_key("/home/me/.ssh/staging"));
    }

    #[test]
    fn test_missing_credentials() {
        let mut p = profile();
        p.private_key = None;
        assert!(matches!(
            p.connection_config(),
            Err(ConnectionError::MissingCredentials)
        ));
    }

    #[test]
    fn test_tunnel_command() {
        assert_eq!(
            profile().tunnel_command().as_deref(),
            Some("ssh -f -N -L 3307:localhost:3306 -p 1022 deploy@staging.example.com")
        );

        let mut p = profile();
        p.database = None;
        assert_eq!(p.tunnel_command(), None);
    }

    #[test]
    fn test_base_paths_and_defaults() {
        let p: Profile = serde_json::from_str(
            r#"{"id":"x","name":"X","host":"h","username":"u","password":"pw"}"#,
        )
        .unwrap();
        assert_eq!(p.port, 22);
        assert!(!p.base_paths().is_configured());
        assert!(profile().base_paths().is_configured());
    }

    #[test]
    fn test_debug_hides_passwords() {
        let rendered = format!("{:?}", profile());
        assert!(!rendered.contains("s3cret"));
    }
}
