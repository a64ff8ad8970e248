//! Controller configuration
//!
//! Timings default to the values the promotion and reap loops were tuned
//! for; tests shrink them through the `with_*` builders.

use std::path::PathBuf;
use std::time::Duration;

use shared::{Port, SharedError};

use crate::error::ControllerResult;

pub const NEXT_PROCESS_HEALTHY_INTERVAL: Duration = Duration::from_millis(500);
pub const OLD_PROCESS_GRACEFUL_INTERVAL: Duration = Duration::from_secs(2);
pub const CHECK_LIVE_PORT_INTERVAL: Duration = Duration::from_millis(100);
pub const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

pub const MAX_PORT_OFFSET: u16 = 500;
pub const DEFAULT_PORT_START: Port = 8000;
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Command every worker generation runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub exec: String,
    pub args: Vec<String>,
    pub work_dir: PathBuf,
}

impl WorkerCommand {
    pub fn new(exec: impl Into<String>, args: Vec<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            exec: exec.into(),
            args,
            work_dir: work_dir.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Host the workers listen on, used for health probes and proxying
    pub host: String,
    /// First port of the generation port range
    pub port_start: Port,
    /// Ports are handed out in `[port_start, port_start + max_port_offset]`
    pub max_port_offset: u16,
    pub health_interval: Duration,
    pub reap_interval: Duration,
    pub live_port_interval: Duration,
    pub probe_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port_start: DEFAULT_PORT_START,
            max_port_offset: MAX_PORT_OFFSET,
            health_interval: NEXT_PROCESS_HEALTHY_INTERVAL,
            reap_interval: OLD_PROCESS_GRACEFUL_INTERVAL,
            live_port_interval: CHECK_LIVE_PORT_INTERVAL,
            probe_timeout: HEALTH_PROBE_TIMEOUT,
        }
    }
}

impl ControllerConfig {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port_start(mut self, port_start: Port) -> Self {
        self.port_start = port_start;
        self
    }

    pub fn with_max_port_offset(mut self, max_port_offset: u16) -> Self {
        self.max_port_offset = max_port_offset;
        self
    }

    pub fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    pub fn with_reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }

    pub fn with_live_port_interval(mut self, interval: Duration) -> Self {
        self.live_port_interval = interval;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn validate(&self) -> ControllerResult<()> {
        if self.host.is_empty() {
            return Err(SharedError::invalid_config("host", "<empty>").into());
        }
        if self.port_start.checked_add(self.max_port_offset).is_none() {
            return Err(SharedError::invalid_config(
                "port_start",
                format!("{} + {} exceeds 65535", self.port_start, self.max_port_offset),
            )
            .into());
        }

        let intervals = [
            ("health_interval", self.health_interval),
            ("reap_interval", self.reap_interval),
            ("live_port_interval", self.live_port_interval),
            ("probe_timeout", self.probe_timeout),
        ];
        for (field, value) in intervals {
            if value.is_zero() {
                return Err(SharedError::invalid_config(field, "0s").into());
            }
        }

        Ok(())
    }
}
