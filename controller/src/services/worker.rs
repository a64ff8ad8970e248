//! Worker process wrapper
//!
//! One OS child process bound to one port and one code version. Readiness
//! is never self-reported here; the controller's probe loop decides when a
//! worker is healthy.

use std::time::Instant;

use shared::{component_debug, Component, Port, Version};
use tokio::process::{Child, Command};

use crate::config::WorkerCommand;
use crate::error::{ControllerError, ControllerResult};
use crate::services::worker_output;
use crate::traits::WorkerKiller;

/// Environment variable carrying the bound port into the worker
pub const PORT_ENV: &str = "PORT";
/// Environment variable carrying the resolved version into the worker
pub const VERSION_ENV: &str = "WORKER_VERSION";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    /// Constructed, OS process not spawned yet
    Created,
    Running,
    Killed,
}

/// Port and version of one generation, detached from its process handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationInfo {
    pub port: Port,
    pub version: Version,
    pub pid: Option<u32>,
}

#[derive(Debug)]
pub struct WorkerProcess {
    command: WorkerCommand,
    port: Port,
    version: Version,
    child: Option<Child>,
    pid: Option<u32>,
    status: WorkerStatus,
    started_at: Option<Instant>,
}

impl WorkerProcess {
    pub fn new(command: WorkerCommand, port: Port, version: Version) -> Self {
        Self {
            command,
            port,
            version,
            child: None,
            pid: None,
            status: WorkerStatus::Created,
            started_at: None,
        }
    }

    pub fn port(&self) -> Port {
        self.port
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn status(&self) -> WorkerStatus {
        self.status
    }

    pub fn uptime(&self) -> Option<std::time::Duration> {
        self.started_at.map(|started| started.elapsed())
    }

    pub fn info(&self) -> GenerationInfo {
        GenerationInfo {
            port: self.port,
            version: self.version,
            pid: self.pid,
        }
    }

    /// Spawn the OS process
    ///
    /// Returns as soon as the spawn call succeeds, not once the worker is
    /// ready to serve.
    pub fn run(&mut self) -> ControllerResult<()> {
        if self.status != WorkerStatus::Created {
            return Err(ControllerError::Startup {
                port: self.port,
                source: std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "worker was already started",
                ),
            });
        }

        let mut cmd = Command::new(&self.command.exec);
        cmd.args(&self.command.args)
            .current_dir(&self.command.work_dir)
            .env(PORT_ENV, self.port.to_string())
            .env(VERSION_ENV, self.version.to_string())
            .kill_on_drop(true);
        worker_output::configure_child_stdio(&mut cmd);

        let mut child = cmd.spawn().map_err(|source| ControllerError::Startup {
            port: self.port,
            source,
        })?;
        worker_output::spawn_output_forwarders(&mut child, self.port, self.version);

        self.pid = child.id();
        self.child = Some(child);
        self.status = WorkerStatus::Running;
        self.started_at = Some(Instant::now());

        component_debug!(
            Component::Worker,
            "Spawned {} (PID: {:?}) on port {} at version {}",
            self.command.exec,
            self.pid,
            self.port,
            self.version
        );
        Ok(())
    }

    /// Terminate the OS process
    ///
    /// Killing a worker that was never started, was already killed or has
    /// exited on its own is a no-op.
    pub async fn kill(&mut self) -> ControllerResult<()> {
        let Some(child) = self.child.as_mut() else {
            self.status = WorkerStatus::Killed;
            return Ok(());
        };

        match child.try_wait() {
            Ok(Some(exit)) => {
                component_debug!(
                    Component::Worker,
                    "Worker on port {} already exited with {}",
                    self.port,
                    exit
                );
            }
            _ => {
                child.kill().await.map_err(|source| ControllerError::Kill {
                    port: self.port,
                    source,
                })?;
                component_debug!(Component::Worker, "🛑 Killed worker on port {}", self.port);
            }
        }

        self.child = None;
        self.status = WorkerStatus::Killed;
        Ok(())
    }

    /// Whether the OS process is still alive
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }
}

/// Kills workers through their OS process handle
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessKiller;

#[async_trait::async_trait]
impl WorkerKiller for ProcessKiller {
    async fn kill(&self, worker: &mut WorkerProcess) -> ControllerResult<()> {
        worker.kill().await
    }
}
