//! Sandbox router
//!
//! HTTP front end for a supervised worker: `POST /__meta__/version` deploys
//! a new generation through the [`controller`] crate and every other request
//! is proxied to whichever generation is live.

pub mod config;
pub mod error;
pub mod proxy;
pub mod server;
pub mod state;
pub mod web;

pub use config::{RouterConfig, VERSION_UPDATE_PATH};
pub use error::{RouterError, RouterResult};
pub use server::RouterServer;
pub use state::RouterState;
