//! SSH module - handles SSH connections and sessions
//!
//! This module provides the connection core on top of the russh library.
//!
//! # Features
//! - Key or password authentication with a restricted algorithm set
//! - One live session per `host:port:username` identity
//! - Transparent reconnection from the stored config (see `supervisor`)
//! - Per-identity operation pacing (see `rate_limit`)
//! - Remote command execution over exec channels

mod client;
mod config;
pub mod connection_registry;
mod error;
mod handle_owner;
pub mod rate_limit;
mod session;
mod supervisor;

pub use client::{preferred_algorithms, ClientHandler, SshConnector};
pub use config::{ConnectionConfig, ConnectionIdentity, ConnectionPolicy, Credential};
pub use connection_registry::{ConnectionRegistry, ManagedSession, SessionConnector};
pub use error::ConnectionError;
pub use handle_owner::{spawn_handle_owner_task, HandleCommand, HandleController};
pub use rate_limit::RateLimiter;
pub use session::{ExecOutput, RemoteExec, RemoteSession};
