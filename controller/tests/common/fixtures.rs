//! Test fixtures for controller tests

use std::time::Duration;

use controller::{ControllerConfig, MockVersionStore, Rebuilt};

pub struct TestFixtures;

#[allow(dead_code)]
impl TestFixtures {
    pub const PROJECT: i64 = 123;

    /// Version the mock store resolves `latest` to
    pub const LATEST_VERSION: i64 = 7;

    /// Generous bound for anything driven by the fast loop timings
    pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(3);

    /// Loop timings an order of magnitude faster than production
    pub fn fast_config(port_start: u16) -> ControllerConfig {
        ControllerConfig::default()
            .with_port_start(port_start)
            .with_health_interval(Duration::from_millis(25))
            .with_reap_interval(Duration::from_millis(100))
            .with_live_port_interval(Duration::from_millis(10))
            .with_probe_timeout(Duration::from_millis(500))
    }

    /// Store that echoes the requested version, resolving latest to
    /// [`LATEST_VERSION`](Self::LATEST_VERSION)
    pub fn echo_store() -> MockVersionStore {
        let mut store = MockVersionStore::new();
        store.expect_rebuild().returning(|_, target, _| {
            Ok(Rebuilt {
                version: target.unwrap_or(Self::LATEST_VERSION),
                files: 1,
            })
        });
        store
    }
}
