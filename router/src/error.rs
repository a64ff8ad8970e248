//! Router-specific error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use controller::ControllerError;
use shared::{component_error, component_warn, Component};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Proxy dispatch failed: {0}")]
    ProxyDispatch(#[source] reqwest::Error),

    #[error("Timeout waiting for live port")]
    LivePortTimeout,

    #[error("Invalid request format: {details}")]
    InvalidRequest { details: String },

    #[error("Failed to start process: {0}")]
    Controller(#[from] ControllerError),

    #[error("Server startup error: {0}")]
    ServerStartup(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RouterError {
    pub fn invalid_request(details: impl ToString) -> Self {
        Self::InvalidRequest {
            details: details.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RouterError::LivePortTimeout => StatusCode::GATEWAY_TIMEOUT,
            RouterError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RouterError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            // Backend details stay in the log
            RouterError::ProxyDispatch(_) => "failed to proxy request".to_string(),
            RouterError::LivePortTimeout => "timeout waiting for live port".to_string(),
            other => other.to_string(),
        };

        if status.is_server_error() && status != StatusCode::GATEWAY_TIMEOUT {
            component_error!(Component::Router, error = %self, "❌ {}", body);
        } else {
            component_warn!(Component::Router, error = %self, "{}", body);
        }

        (status, body).into_response()
    }
}

pub type RouterResult<T> = Result<T, RouterError>;
