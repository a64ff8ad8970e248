//! Deployment endpoint

use axum::body::Bytes;
use axum::extract::State;
use shared::{component_info, Component, VersionRequest};

use crate::error::{RouterError, RouterResult};
use crate::state::RouterState;

/// Start a new generation - POST /__meta__/version
///
/// Body is `{"version": n}`; an empty object deploys the latest version.
/// Replies `Version: n` once the worker is spawned, before it is promoted.
pub async fn update_version(State(state): State<RouterState>, body: Bytes) -> RouterResult<String> {
    let request: VersionRequest = serde_json::from_slice(&body).map_err(RouterError::invalid_request)?;
    component_info!(
        Component::Router,
        "📥 Version update requested: {}",
        request.version.map_or_else(|| "latest".to_string(), |v| v.to_string())
    );

    let version = state.controller.start_process(request.version).await?;
    Ok(format!("Version: {version}"))
}
