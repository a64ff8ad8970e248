//! Test helpers for router tests
//!
//! A [`Sandbox`] wires a controller running `sleep` workers to a router
//! served on an ephemeral loopback port. Each worker's HTTP side is played
//! by an [`EchoBackend`] bound to the port the controller hands out.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::Path;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use controller::{ProcessController, VersionStore, WorkerCommand};
use router::{RouterResult, RouterServer};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

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

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Value> {
    let headers: HashMap<String, String> = headers
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_str().unwrap_or_default().to_string()))
        .collect();

    Json(json!({
        "method": method.as_str(),
        "uri": uri.to_string(),
        "headers": headers,
        "body": String::from_utf8_lossy(&body),
    }))
}

async fn slow(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Value> {
    tokio::time::sleep(TestFixtures::SLOW_RESPONSE).await;
    echo(method, uri, headers, body).await
}

async fn status(Path(code): Path<u16>) -> Response {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    (
        status,
        [("x-upstream", "echo"), ("keep-alive", "timeout=5")],
        format!("status {code}"),
    )
        .into_response()
}

/// Healthy stand-in for a worker that echoes every request back as JSON
pub struct EchoBackend {
    pub port: u16,
    task: JoinHandle<()>,
}

#[allow(dead_code)]
impl EchoBackend {
    pub fn spawn(listener: TcpListener) -> Self {
        listener.set_nonblocking(true).expect("nonblocking listener");
        let listener = tokio::net::TcpListener::from_std(listener).expect("tokio listener");
        let port = listener.local_addr().expect("local addr").port();

        let app = Router::new()
            .route("/health", get(|| async { StatusCode::OK }))
            .route("/status/:code", get(status))
            .route("/slow", get(slow))
            .fallback(echo);

        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { port, task }
    }

    /// Stop accepting connections on this backend's port
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for EchoBackend {
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

/// Controller, echo backends and a served router
pub struct Sandbox {
    pub controller: ProcessController,
    pub backends: Vec<EchoBackend>,
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    shutdown: CancellationToken,
    server: Option<JoinHandle<RouterResult<()>>>,
    _work: TempDir,
}

#[allow(dead_code)]
impl Sandbox {
    pub async fn start(backends: u16) -> Self {
        Self::start_with_store(backends, TestFixtures::echo_store()).await
    }

    pub async fn start_with_store(backends: u16, store: impl VersionStore + 'static) -> Self {
        let backends: Vec<EchoBackend> = bind_port_range(backends)
            .into_iter()
            .map(EchoBackend::spawn)
            .collect();

        let work = tempfile::tempdir().expect("work dir");
        let command = WorkerCommand::new("sleep", vec!["30".to_string()], work.path());
        let config = TestFixtures::controller_config(backends[0].port - 1);
        let controller = ProcessController::new(TestFixtures::PROJECT, command, config, Arc::new(store))
            .expect("valid controller config");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind router");
        let addr = listener.local_addr().expect("router addr");

        let server = RouterServer::new(controller.clone(), TestFixtures::router_config())
            .expect("router server");
        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        let server = tokio::spawn(server.serve(listener, async move { signal.cancelled().await }));

        Self {
            controller,
            backends,
            addr,
            client: reqwest::Client::builder().no_proxy().build().expect("test client"),
            shutdown,
            server: Some(server),
            _work: work,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn deploy(&self, body: &str) -> reqwest::Response {
        self.client
            .post(self.url(router::VERSION_UPDATE_PATH))
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .expect("version update request")
    }

    /// Deploy `version` and wait until it serves traffic
    pub async fn deploy_live(&self, version: i64) {
        let response = self.deploy(&format!(r#"{{"version": {version}}}"#)).await;
        assert_eq!(response.status(), 200);
        assert!(
            wait_until(TestFixtures::SETTLE_TIMEOUT, || self.controller.live_port().is_some()).await,
            "deployed generation should be promoted"
        );
    }

    pub async fn stop(mut self) {
        self.shutdown.cancel();
        if let Some(server) = self.server.take() {
            let _ = tokio::time::timeout(TestFixtures::SETTLE_TIMEOUT, server).await;
        }
        self.controller.close().await;
    }
}
