//! Test fixtures for router tests

use std::time::Duration;

use controller::{ControllerConfig, ControllerError, MockVersionStore, Rebuilt};
use router::RouterConfig;

pub struct TestFixtures;

#[allow(dead_code)]
impl TestFixtures {
    pub const PROJECT: i64 = 321;
    pub const LATEST_VERSION: i64 = 7;
    pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(3);
    pub const LIVE_PORT_TIMEOUT: Duration = Duration::from_millis(300);

    /// Delay of the echo backend's `/slow` route
    pub const SLOW_RESPONSE: Duration = Duration::from_millis(300);

    pub fn controller_config(port_start: u16) -> ControllerConfig {
        ControllerConfig::default()
            .with_port_start(port_start)
            .with_health_interval(Duration::from_millis(25))
            .with_reap_interval(Duration::from_millis(100))
            .with_live_port_interval(Duration::from_millis(10))
            .with_probe_timeout(Duration::from_millis(500))
    }

    pub fn router_config() -> RouterConfig {
        RouterConfig::default().with_live_port_timeout(Self::LIVE_PORT_TIMEOUT)
    }

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

    pub fn failing_store(message: &'static str) -> MockVersionStore {
        let mut store = MockVersionStore::new();
        store
            .expect_rebuild()
            .returning(move |_, target, _| Err(ControllerError::rebuild(target, message)));
        store
    }
}
