//! Sandbox HTTP front end
//!
//! One listener serves the deployment endpoint and forwards every other
//! request to the live worker generation.

use std::future::Future;
use std::net::SocketAddr;

use axum::routing::post;
use axum::Router;
use controller::ProcessController;
use shared::{component_info, logging, Component};
use tokio::net::TcpListener;

use crate::config::{RouterConfig, VERSION_UPDATE_PATH};
use crate::error::{RouterError, RouterResult};
use crate::state::RouterState;
use crate::web::handlers::{forward, update_version};

pub struct RouterServer {
    state: RouterState,
}

impl RouterServer {
    pub fn new(controller: ProcessController, config: RouterConfig) -> RouterResult<Self> {
        Ok(Self {
            state: RouterState::new(controller, config)?,
        })
    }

    pub fn controller(&self) -> &ProcessController {
        &self.state.controller
    }

    pub fn config(&self) -> &RouterConfig {
        &self.state.config
    }

    /// Build the Axum router with all routes
    pub fn build_router(&self) -> Router {
        Router::new()
            .route(VERSION_UPDATE_PATH, post(update_version))
            .fallback(forward)
            .with_state(self.state.clone())
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> RouterResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.state.config.bind_address;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| RouterError::ServerStartup(format!("bind {addr}: {e}")))?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// In-flight requests are allowed to finish before this returns.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> RouterResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local = listener.local_addr()?;
        component_info!(Component::Router, "🌐 Sandbox listening on http://{}", local);

        let app = self.build_router().into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

        logging::log_shutdown(Component::Router, "listener closed");
        Ok(())
    }
}
