//! Generation state of a supervised project
//!
//! Pure bookkeeping for the current / next / graceful generations and the
//! per-port in-flight request counters. Nothing here awaits; the controller
//! holds this behind its lock and performs process kills outside of it.

use std::collections::HashMap;

use shared::Port;

use crate::services::worker::{GenerationInfo, WorkerProcess};

/// Result of trying to promote the generation that passed a health probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Promotion {
    /// `next` became `current`; `retired` is the port of the displaced
    /// generation, now draining
    Promoted { port: Port, retired: Option<Port> },
    /// The probed port no longer belongs to `next`
    Stale,
}

/// Read-only view of the generation state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationSnapshot {
    pub current: Option<GenerationInfo>,
    pub next: Option<GenerationInfo>,
    pub gracefuls: Vec<GenerationInfo>,
    pub counters: HashMap<Port, usize>,
    pub port_offset: u16,
}

impl GenerationSnapshot {
    pub fn live_port(&self) -> Option<Port> {
        match (&self.current, &self.next) {
            (Some(current), None) => Some(current.port),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct GenerationState {
    current: Option<WorkerProcess>,
    next: Option<WorkerProcess>,
    gracefuls: Vec<WorkerProcess>,
    counters: HashMap<Port, usize>,
    port_offset: u16,
}

impl GenerationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_port(&self) -> Option<Port> {
        self.next.as_ref().map(WorkerProcess::port)
    }

    pub fn current_port(&self) -> Option<Port> {
        self.current.as_ref().map(WorkerProcess::port)
    }

    /// Port eligible for traffic: `current`, once no promotion is pending
    pub fn live_port(&self) -> Option<Port> {
        match (&self.current, &self.next) {
            (Some(current), None) => Some(current.port()),
            _ => None,
        }
    }

    /// Live port with its request counter already incremented
    pub fn claim_live_port(&mut self) -> Option<Port> {
        let port = self.live_port()?;
        self.increment(port);
        Some(port)
    }

    pub fn port_offset(&self) -> u16 {
        self.port_offset
    }

    /// Advance the port cursor and return the port it now points at
    ///
    /// The offset wraps to 0 once it passes `max_offset`.
    pub fn advance_port(&mut self, port_start: Port, max_offset: u16) -> Port {
        self.port_offset = self.port_offset.saturating_add(1);
        if self.port_offset > max_offset {
            self.port_offset = 0;
        }
        port_start.saturating_add(self.port_offset)
    }

    /// Whether a live or draining generation still holds `port`
    pub fn is_port_held(&self, port: Port) -> bool {
        self.current_port() == Some(port) || self.gracefuls.iter().any(|proc| proc.port() == port)
    }

    pub fn take_next(&mut self) -> Option<WorkerProcess> {
        self.next.take()
    }

    /// Install a freshly started generation as `next`
    ///
    /// Returns whatever occupied the slot before, which the caller must kill.
    pub fn install_next(&mut self, worker: WorkerProcess) -> Option<WorkerProcess> {
        self.next.replace(worker)
    }

    /// Promote `next` to `current` if it is still bound to `port`
    pub fn promote(&mut self, port: Port) -> Promotion {
        if self.next_port() != Some(port) {
            return Promotion::Stale;
        }
        let Some(next) = self.next.take() else {
            return Promotion::Stale;
        };

        let retired = self.current.replace(next).map(|old| {
            let old_port = old.port();
            self.gracefuls.push(old);
            old_port
        });

        Promotion::Promoted { port, retired }
    }

    pub fn increment(&mut self, port: Port) -> usize {
        let count = self.counters.entry(port).or_insert(0);
        *count += 1;
        *count
    }

    /// Decrement the counter for `port`, dropping the entry at zero
    pub fn decrement(&mut self, port: Port) -> usize {
        let Some(count) = self.counters.get_mut(&port) else {
            return 0;
        };
        *count = count.saturating_sub(1);
        let remaining = *count;
        if remaining == 0 {
            self.counters.remove(&port);
        }
        remaining
    }

    pub fn remaining_requests(&self, port: Port) -> usize {
        self.counters.get(&port).copied().unwrap_or(0)
    }

    /// Remove every graceful generation that has no request in flight
    pub fn take_drained(&mut self) -> Vec<WorkerProcess> {
        let (drained, busy): (Vec<_>, Vec<_>) = std::mem::take(&mut self.gracefuls)
            .into_iter()
            .partition(|proc| !self.counters.contains_key(&proc.port()));
        self.gracefuls = busy;
        drained
    }

    /// Remove every generation, regardless of in-flight requests
    pub fn take_all(&mut self) -> Vec<WorkerProcess> {
        let mut all = Vec::with_capacity(self.gracefuls.len() + 2);
        all.extend(self.next.take());
        all.extend(self.current.take());
        all.append(&mut self.gracefuls);
        all
    }

    pub fn snapshot(&self) -> GenerationSnapshot {
        GenerationSnapshot {
            current: self.current.as_ref().map(WorkerProcess::info),
            next: self.next.as_ref().map(WorkerProcess::info),
            gracefuls: self.gracefuls.iter().map(WorkerProcess::info).collect(),
            counters: self.counters.clone(),
            port_offset: self.port_offset,
        }
    }
}
