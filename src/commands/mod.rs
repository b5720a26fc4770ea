//! Commands module
//!
//! The operations a front end calls. All remote state lives in one
//! [`RemoteCommands`] value owned by the caller.

pub mod remote;

pub use remote::{ConnectOutcome, DeleteMethod, RemoteCommands};
