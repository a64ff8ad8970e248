//! Process generation controller for sandboxed workers
//!
//! Supervises the worker processes of one project on a single host: spawns a
//! replacement generation when a new version is published, promotes it once
//! its readiness probe passes, and drains the previous generation before
//! killing it.

pub mod config;
pub mod controller;
pub mod error;
pub mod services;
pub mod state;
pub mod traits;

// Re-export commonly used types
pub use config::{ControllerConfig, WorkerCommand};
pub use controller::{ProcessController, RequestGuard};
pub use error::{ControllerError, ControllerResult};
pub use services::{DirectoryVersionStore, GenerationInfo, ProcessKiller, WorkerProcess, WorkerStatus};
pub use state::{GenerationSnapshot, GenerationState, Promotion};
pub use traits::{MockVersionStore, MockWorkerKiller, Rebuilt, VersionStore, WorkerKiller};
