//! Shared handler state

use std::sync::Arc;

use controller::ProcessController;

use crate::config::RouterConfig;
use crate::error::{RouterError, RouterResult};

/// State handed to every handler; clones share the controller and client
#[derive(Clone)]
pub struct RouterState {
    pub controller: ProcessController,
    pub client: reqwest::Client,
    pub config: Arc<RouterConfig>,
}

impl RouterState {
    pub fn new(controller: ProcessController, config: RouterConfig) -> RouterResult<Self> {
        // Redirects go back to the caller untouched
        let client = reqwest::Client::builder()
            .timeout(config.proxy_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()
            .map_err(|e| RouterError::ServerStartup(format!("proxy client: {e}")))?;

        Ok(Self {
            controller,
            client,
            config: Arc::new(config),
        })
    }
}
