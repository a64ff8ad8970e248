//! Process generation controller
//!
//! Owns the current / next / graceful generations of one supervised project.
//! `start_process` spawns a replacement worker as `next`; a background loop
//! probes it and promotes it to `current` once healthy, retiring the old
//! `current` into the graceful set; a second loop kills graceful workers as
//! soon as their in-flight request count drops to zero.
//!
//! All state lives behind a single reader/writer lock. Critical sections
//! never await: workers are taken out of the state before they are killed.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;

use shared::{
    component_debug, component_info, component_warn, logging, Component, Port, ProjectId, Version,
};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::{ControllerConfig, WorkerCommand};
use crate::error::{ControllerError, ControllerResult};
use crate::services::worker::WorkerProcess;
use crate::state::{GenerationSnapshot, GenerationState, Promotion};
use crate::services::worker::ProcessKiller;
use crate::traits::{VersionStore, WorkerKiller};

/// Supervisor of one project's worker generations
///
/// Cheap to clone; all clones share the same state. Must be created inside a
/// tokio runtime since construction spawns the promotion and reap loops.
#[derive(Clone)]
pub struct ProcessController {
    inner: Arc<Inner>,
}

struct Inner {
    project: ProjectId,
    command: WorkerCommand,
    config: ControllerConfig,
    store: Arc<dyn VersionStore>,
    killer: Arc<dyn WorkerKiller>,
    http: reqwest::Client,

    state: RwLock<GenerationState>,
    /// Serializes `start_process` and `close`
    start_lock: Mutex<()>,
    shutdown: CancellationToken,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl Inner {
    fn read_state(&self) -> RwLockReadGuard<'_, GenerationState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, GenerationState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    async fn probe(&self, port: Port) -> bool {
        let url = format!("http://{}:{}/health", self.config.host, port);
        match self.http.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                component_debug!(Component::Controller, "Health probe {} returned {}", url, resp.status());
                false
            }
            Err(e) => {
                component_debug!(Component::Controller, "Could not connect to {}: {}", url, e);
                false
            }
        }
    }

    async fn health_tick(&self) {
        let next_port = self.read_state().next_port();
        let Some(port) = next_port else {
            return;
        };

        if !self.probe(port).await {
            return;
        }

        let outcome = self.write_state().promote(port);
        match outcome {
            Promotion::Promoted { port, retired } => {
                component_info!(
                    Component::Controller,
                    "⬆️ Promoted generation on port {} to current (retired: {:?})",
                    port,
                    retired
                );
            }
            Promotion::Stale => {
                component_debug!(
                    Component::Controller,
                    "Discarded stale health result for port {}",
                    port
                );
            }
        }
    }

    /// Kill a still-pending `next`
    ///
    /// If the kill fails the worker is put back as `next` and the error is
    /// returned.
    async fn preempt_next(&self) -> ControllerResult<()> {
        let pending = self.write_state().take_next();
        let Some(mut pending) = pending else {
            return Ok(());
        };

        if let Err(e) = self.killer.kill(&mut pending).await {
            self.write_state().install_next(pending);
            return Err(e);
        }
        component_info!(
            Component::Controller,
            "Preempted pending generation v{} on port {}",
            pending.version(),
            pending.port()
        );
        Ok(())
    }

    async fn reap_tick(&self) {
        let drained = self.write_state().take_drained();
        for mut worker in drained {
            match self.killer.kill(&mut worker).await {
                Ok(()) => component_info!(
                    Component::Controller,
                    "♻️ Reaped drained generation v{} on port {}",
                    worker.version(),
                    worker.port()
                ),
                Err(e) => logging::log_error(Component::Controller, "Reaping graceful worker", &e),
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Probe `next` every health interval and promote it once healthy
async fn health_loop(inner: Weak<Inner>, shutdown: CancellationToken, period: Duration) {
    let mut ticker = ticker(period);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.health_tick().await;
    }
}

/// Kill drained graceful generations every reap interval
async fn reap_loop(inner: Weak<Inner>, shutdown: CancellationToken, period: Duration) {
    let mut ticker = ticker(period);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.reap_tick().await;
    }
}

impl ProcessController {
    pub fn new(
        project: ProjectId,
        command: WorkerCommand,
        config: ControllerConfig,
        store: Arc<dyn VersionStore>,
    ) -> ControllerResult<Self> {
        Self::with_killer(project, command, config, store, Arc::new(ProcessKiller))
    }

    /// Like [`new`](Self::new), with a custom way of terminating workers
    pub fn with_killer(
        project: ProjectId,
        command: WorkerCommand,
        config: ControllerConfig,
        store: Arc<dyn VersionStore>,
        killer: Arc<dyn WorkerKiller>,
    ) -> ControllerResult<Self> {
        config.validate()?;

        // Workers are always on the local host
        let http = reqwest::Client::builder()
            .timeout(config.probe_timeout)
            .no_proxy()
            .build()
            .map_err(|e| ControllerError::config(format!("health probe client: {e}")))?;

        let inner = Arc::new(Inner {
            project,
            command,
            config,
            store,
            killer,
            http,
            state: RwLock::new(GenerationState::new()),
            start_lock: Mutex::new(()),
            shutdown: CancellationToken::new(),
            tasks: std::sync::Mutex::new(Vec::new()),
        });

        let health = tokio::spawn(health_loop(
            Arc::downgrade(&inner),
            inner.shutdown.clone(),
            inner.config.health_interval,
        ));
        let reaper = tokio::spawn(reap_loop(
            Arc::downgrade(&inner),
            inner.shutdown.clone(),
            inner.config.reap_interval,
        ));
        inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([health, reaper]);

        logging::log_startup(
            Component::Controller,
            &format!(
                "controller for project {} (ports {}..={})",
                project,
                inner.config.port_start,
                inner.config.port_start + inner.config.max_port_offset
            ),
        );

        Ok(Self { inner })
    }

    pub fn host(&self) -> &str {
        &self.inner.config.host
    }

    pub fn project(&self) -> ProjectId {
        self.inner.project
    }

    pub fn work_dir(&self) -> &Path {
        &self.inner.command.work_dir
    }

    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Start a new generation at `target` (latest when `None`)
    ///
    /// Kills a still-pending `next` first, advances the port cursor,
    /// materialises the version, spawns the worker on that port and installs
    /// it as `next`. Returns the resolved version. On failure `current` and
    /// the graceful set are untouched and no `next` is installed; if killing
    /// the pending `next` fails it stays installed and the error is returned.
    pub async fn start_process(&self, target: Option<Version>) -> ControllerResult<Version> {
        let _serial = self.inner.start_lock.lock().await;
        if self.is_closed() {
            return Err(ControllerError::Closed);
        }

        self.inner.preempt_next().await?;

        let (port, held) = {
            let mut state = self.inner.write_state();
            let port = state.advance_port(self.inner.config.port_start, self.inner.config.max_port_offset);
            (port, state.is_port_held(port))
        };
        if held {
            component_warn!(
                Component::Controller,
                "Port {} is still held by an older generation; reusing it anyway",
                port
            );
        }

        let rebuilt = self
            .inner
            .store
            .rebuild(self.inner.project, target, &self.inner.command.work_dir)
            .await?;

        let mut worker = WorkerProcess::new(self.inner.command.clone(), port, rebuilt.version);
        worker.run()?;
        let pid = worker.pid();

        let displaced = self.inner.write_state().install_next(worker);
        if let Some(mut displaced) = displaced {
            if let Err(e) = self.inner.killer.kill(&mut displaced).await {
                logging::log_error(Component::Controller, "Killing displaced next worker", &e);
            }
        }

        component_info!(
            Component::Controller,
            "🚀 Started generation v{} on port {} (PID: {:?}, {} files)",
            rebuilt.version,
            port,
            pid,
            rebuilt.files
        );
        Ok(rebuilt.version)
    }

    pub fn increment_request_counter(&self, port: Port) {
        self.inner.write_state().increment(port);
    }

    pub fn decrement_request_counter(&self, port: Port) {
        self.inner.write_state().decrement(port);
    }

    /// Count a request against `port` until the returned guard is dropped
    pub fn track_request(&self, port: Port) -> RequestGuard {
        self.increment_request_counter(port);
        RequestGuard {
            inner: Arc::clone(&self.inner),
            port,
        }
    }

    pub fn remaining_requests(&self, port: Port) -> usize {
        self.inner.read_state().remaining_requests(port)
    }

    /// Count a request against the live port, if there is one
    ///
    /// Reading the live port and incrementing its counter happen under one
    /// write lock, so the generation cannot be retired and reaped in between.
    pub fn claim_live_port(&self) -> Option<RequestGuard> {
        let port = self.inner.write_state().claim_live_port()?;
        Some(RequestGuard {
            inner: Arc::clone(&self.inner),
            port,
        })
    }

    /// Port of `current` when no promotion is pending
    pub fn live_port(&self) -> Option<Port> {
        self.inner.read_state().live_port()
    }

    /// Deliver the live port once one exists
    ///
    /// Delivers immediately when `current` is set and no `next` is pending.
    /// Otherwise a waiter polls until that holds; it gives up without
    /// delivering once `cancel` fires, the receiver is dropped or the
    /// controller shuts down.
    pub fn live_port_channel(&self, cancel: CancellationToken) -> oneshot::Receiver<Port> {
        let (tx, rx) = oneshot::channel();

        let live = self.live_port();
        if let Some(port) = live {
            let _ = tx.send(port);
            return rx;
        }

        let inner = Arc::downgrade(&self.inner);
        let shutdown = self.inner.shutdown.clone();
        let period = self.inner.config.live_port_interval;
        tokio::spawn(async move {
            let mut tx = tx;
            let mut ticker = ticker(period);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    _ = shutdown.cancelled() => return,
                    _ = tx.closed() => return,
                    _ = ticker.tick() => {}
                }

                let Some(inner) = inner.upgrade() else {
                    return;
                };
                let live = inner.read_state().live_port();
                if let Some(port) = live {
                    if !cancel.is_cancelled() {
                        let _ = tx.send(port);
                    }
                    return;
                }
            }
        });

        rx
    }

    pub fn snapshot(&self) -> GenerationSnapshot {
        self.inner.read_state().snapshot()
    }

    /// Kill every generation and stop the background loops
    ///
    /// Draining is bypassed: graceful workers die even with requests in
    /// flight.
    pub async fn close(&self) {
        let _serial = self.inner.start_lock.lock().await;
        self.inner.shutdown.cancel();

        let workers = self.inner.write_state().take_all();
        for mut worker in workers {
            if let Err(e) = self.inner.killer.kill(&mut worker).await {
                logging::log_error(Component::Controller, "Killing worker on close", &e);
            }
        }

        let tasks = std::mem::take(&mut *self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for task in tasks {
            let _ = task.await;
        }

        logging::log_shutdown(Component::Controller, "all generations killed");
    }
}

/// In-flight request marker; decrements the port's counter on drop
#[must_use = "the request stops being counted as soon as the guard is dropped"]
pub struct RequestGuard {
    inner: Arc<Inner>,
    port: Port,
}

impl RequestGuard {
    pub fn port(&self) -> Port {
        self.port
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.inner.write_state().decrement(self.port);
    }
}

impl std::fmt::Debug for RequestGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGuard").field("port", &self.port).finish()
    }
}
