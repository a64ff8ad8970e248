//! Shared types for the sandbox supervisor
//!
//! Holds the pieces both the process controller and the HTTP router need:
//! component identity for log lines, logging setup, the shared error type
//! and the wire types of the version-update endpoint.

pub mod errors;
pub mod logging;
pub mod types;

pub use errors::*;
pub use types::*;
