//! Local filesystem support for the local pane

pub mod fs;

pub use fs::{create_local_directory, delete_local, expand_tilde, list_local_directory};
