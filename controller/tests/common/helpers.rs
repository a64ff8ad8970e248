//! Test helpers for controller tests
//!
//! Workers in these tests are plain `sleep` processes; their readiness is
//! played by small axum servers bound to the ports the controller hands out.

use std::future::Future;
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, routing::get, Router};
use controller::{ControllerConfig, ProcessController, ProcessKiller, VersionStore, WorkerCommand, WorkerKiller};
use tempfile::TempDir;
use tokio::task::JoinHandle;

use super::fixtures::TestFixtures;

/// Reserve `count` consecutive loopback ports
pub fn bind_port_range(count: u16) -> Vec<TcpListener> {
    for _ in 0..50 {
        let first = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        let base = first.local_addr().expect("local addr").port();
        if base < 1024 || base.checked_add(count + 1).is_none() {
            continue;
        }

        let mut listeners = vec![first];
        for offset in 1..count {
            match TcpListener::bind(("127.0.0.1", base + offset)) {
                Ok(listener) => listeners.push(listener),
                Err(_) => break,
            }
        }
        if listeners.len() == count as usize {
            return listeners;
        }
    }
    panic!("could not reserve {count} consecutive ports");
}

/// Stand-in for a worker's readiness endpoint
pub struct HealthServer {
    pub port: u16,
    healthy: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

#[allow(dead_code)]
impl HealthServer {
    pub fn spawn(listener: TcpListener) -> Self {
        listener.set_nonblocking(true).expect("nonblocking listener");
        let listener = tokio::net::TcpListener::from_std(listener).expect("tokio listener");
        let port = listener.local_addr().expect("local addr").port();

        let healthy = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&healthy);
        let app = Router::new().route(
            "/health",
            get(move || {
                let flag = Arc::clone(&flag);
                async move {
                    if flag.load(Ordering::SeqCst) {
                        StatusCode::OK
                    } else {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                }
            }),
        );

        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { port, healthy, task }
    }

    /// One server per reserved port
    pub fn spawn_range(count: u16) -> Vec<Self> {
        bind_port_range(count).into_iter().map(Self::spawn).collect()
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

impl Drop for HealthServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Builder for controllers wired to a temporary work dir
pub struct ControllerBuilder {
    config: ControllerConfig,
    exec: String,
    args: Vec<String>,
    store: Option<Arc<dyn VersionStore>>,
    killer: Option<Arc<dyn WorkerKiller>>,
}

#[allow(dead_code)]
impl ControllerBuilder {
    pub fn new(port_start: u16) -> Self {
        Self {
            config: TestFixtures::fast_config(port_start),
            exec: "sleep".to_string(),
            args: vec!["30".to_string()],
            store: None,
            killer: None,
        }
    }

    /// Builder whose first generation binds the first health server's port
    pub fn for_servers(servers: &[HealthServer]) -> Self {
        Self::new(servers[0].port - 1)
    }

    pub fn with_config<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(ControllerConfig) -> ControllerConfig,
    {
        self.config = setup(self.config);
        self
    }

    pub fn with_exec(mut self, exec: &str, args: &[&str]) -> Self {
        self.exec = exec.to_string();
        self.args = args.iter().map(|arg| arg.to_string()).collect();
        self
    }

    pub fn with_store(mut self, store: impl VersionStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    pub fn with_killer(mut self, killer: impl WorkerKiller + 'static) -> Self {
        self.killer = Some(Arc::new(killer));
        self
    }

    pub fn build(self) -> (ProcessController, TempDir) {
        let work = tempfile::tempdir().expect("work dir");
        let command = WorkerCommand::new(self.exec, self.args, work.path());
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(TestFixtures::echo_store()));
        let killer = self.killer.unwrap_or_else(|| Arc::new(ProcessKiller));
        let controller =
            ProcessController::with_killer(TestFixtures::PROJECT, command, self.config, store, killer)
                .expect("valid controller config");
        (controller, work)
    }
}

/// Run a future with the settle timeout, failing the test if it hangs
#[allow(dead_code)]
pub async fn settle<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(TestFixtures::SETTLE_TIMEOUT, future)
        .await
        .expect("operation should settle")
}
