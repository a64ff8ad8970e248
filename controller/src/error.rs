//! Controller-specific error types

use shared::{Port, SharedError, Version};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Failed to start worker on port {port}: {source}")]
    Startup {
        port: Port,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to rebuild workdir to version {}: {message}", describe_version(.version))]
    Rebuild {
        version: Option<Version>,
        message: String,
    },

    #[error("Failed to kill worker on port {port}: {source}")]
    Kill {
        port: Port,
        #[source]
        source: std::io::Error,
    },

    #[error("Version {version} not found in store")]
    VersionNotFound { version: Version },

    #[error("Controller is closed")]
    Closed,

    #[error("Configuration error: {field}")]
    Config { field: String },

    #[error("Shared component error: {0}")]
    Shared(#[from] SharedError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ControllerError {
    pub fn rebuild(version: Option<Version>, message: impl Into<String>) -> Self {
        Self::Rebuild {
            version,
            message: message.into(),
        }
    }

    pub fn config(field: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
        }
    }
}

fn describe_version(version: &Option<Version>) -> String {
    match version {
        Some(version) => version.to_string(),
        None => "latest".to_string(),
    }
}

pub type ControllerResult<T> = Result<T, ControllerError>;
