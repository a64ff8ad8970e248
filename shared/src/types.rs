//! Core shared types and identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// TCP port a worker generation is bound to
pub type Port = u16;

/// Resolved code version served by a worker generation
pub type Version = i64;

/// Identifier of the supervised project in the version store
pub type ProjectId = i64;

/// Part of the supervisor a log line originates from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Controller,
    Router,
    Store,
    Worker,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Controller => "controller",
            Component::Router => "router",
            Component::Store => "store",
            Component::Worker => "worker",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST /__meta__/version`
///
/// A missing `version` asks the version store for its latest version.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRequest {
    #[serde(default)]
    pub version: Option<Version>,
}

impl VersionRequest {
    pub fn pinned(version: Version) -> Self {
        Self {
            version: Some(version),
        }
    }

    pub fn latest() -> Self {
        Self { version: None }
    }
}
