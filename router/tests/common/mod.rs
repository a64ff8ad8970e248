//! Common test utilities and infrastructure
//!
//! Fixtures and helpers shared by the router test suites.

pub mod fixtures;
pub mod helpers;

#[allow(unused_imports)]
pub use fixtures::TestFixtures;
#[allow(unused_imports)]
pub use helpers::{wait_until, EchoBackend, Sandbox};
