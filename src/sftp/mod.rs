//! SFTP file management module
//!
//! Remote browsing, transfer and deletion over an SSH connection.

pub mod delete;
pub mod error;
pub mod path_utils;
pub mod retry;
pub mod session;
pub mod types;

pub use delete::{delete_recursive, delete_via_shell_exec, shell_quote, DeletePolicy, RemoteFs};
pub use error::{DeleteError, ListError, SftpError, SyncError};
pub use retry::{calculate_backoff, retry_with_backoff, RetryConfig};
pub use session::SftpChannel;
pub use types::*;
