//! Configuration Management Module
//!
//! Persistent storage of saved server profiles.

pub mod storage;
pub mod types;

pub use storage::{profiles_file, strip_comments, ProfileStorage, StorageError};
pub use types::{DatabaseTunnel, Profile};
