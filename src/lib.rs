//! twinpane - core of a dual-pane local/SFTP file manager
//!
//! Built on russh for SSH/SFTP. The crate manages remote sessions (connect,
//! rate-limit, silent reconnect), deletes remote trees resiliently, and keeps
//! the local and remote panes pointed at corresponding directories.
//!
//! Entry point for a front end is [`commands::RemoteCommands`] together with
//! [`local`] for the local pane and [`config::ProfileStorage`] for saved
//! servers.

pub mod commands;
pub mod config;
pub mod local;
pub mod sftp;
pub mod ssh;
pub mod sync;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging. `RUST_LOG` overrides the default `info` level.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
