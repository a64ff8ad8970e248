//! Trait definitions with mockall annotations for testing
//!
//! The version store is an external collaborator and process termination
//! touches the OS; the controller reaches both through these seams so tests
//! can substitute mocks.

use std::path::Path;

use shared::{ProjectId, Version};

use crate::error::ControllerResult;
use crate::services::worker::WorkerProcess;

/// Outcome of materialising a version onto disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rebuilt {
    /// Version that was actually written, `latest` resolved to a number
    pub version: Version,
    /// Number of files written into the destination
    pub files: usize,
}

/// Content-addressed store that writes a code version into a directory
///
/// Implementations must be idempotent for a repeated call with the same
/// target version and must leave `dest` untouched when they fail.
#[mockall::automock]
#[async_trait::async_trait]
pub trait VersionStore: Send + Sync {
    /// Materialise `target` (or the latest version when `None`) into `dest`
    async fn rebuild(
        &self,
        project: ProjectId,
        target: Option<Version>,
        dest: &Path,
    ) -> ControllerResult<Rebuilt>;
}

/// Terminates worker processes on behalf of the controller
#[mockall::automock]
#[async_trait::async_trait]
pub trait WorkerKiller: Send + Sync {
    async fn kill(&self, worker: &mut WorkerProcess) -> ControllerResult<()>;
}
