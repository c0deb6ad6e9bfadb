// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Health bookkeeping shared by every kind of node.

use ledger_base::time::{Duration, Instant};
use parking_lot::Mutex;

use crate::address::ManagedNodeAddress;

#[cfg(test)]
#[path = "unit_tests/managed_node_tests.rs"]
mod managed_node_tests;

/// The backoff a fresh node starts with.
pub const DEFAULT_MIN_BACKOFF: Duration = Duration::from_millis(250);
/// The backoff at which a node is considered unhealthy.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(8);

/// A snapshot of the health of a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeHealth {
    pub current_backoff: Duration,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    pub last_used: Option<Instant>,
    pub use_count: u64,
    pub bad_grpc_status_count: u64,
    /// Set while the node is excluded from the healthy set.
    pub readmit_time: Option<Instant>,
}

impl NodeHealth {
    fn new(min_backoff: Duration, max_backoff: Duration) -> Self {
        let max_backoff = max_backoff.max(min_backoff);
        Self {
            current_backoff: min_backoff,
            min_backoff,
            max_backoff,
            last_used: None,
            use_count: 0,
            bad_grpc_status_count: 0,
            readmit_time: None,
        }
    }

    fn clamp_backoff(&mut self) {
        self.current_backoff = self
            .current_backoff
            .clamp(self.min_backoff, self.max_backoff);
    }
}

/// The address and health of one node.
///
/// The backoff doubles on every failure and halves on every success, always staying
/// within `[min_backoff, max_backoff]`. A node whose backoff reached the maximum is
/// unhealthy.
#[derive(Debug)]
pub struct ManagedNode {
    address: ManagedNodeAddress,
    health: Mutex<NodeHealth>,
}

impl ManagedNode {
    pub fn new(address: ManagedNodeAddress, min_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            address,
            health: Mutex::new(NodeHealth::new(min_backoff, max_backoff)),
        }
    }

    /// Returns a node at another address that starts from this node's health.
    pub fn with_address(&self, address: ManagedNodeAddress) -> Self {
        Self {
            address,
            health: Mutex::new(self.health()),
        }
    }

    pub fn address(&self) -> &ManagedNodeAddress {
        &self.address
    }

    pub fn health(&self) -> NodeHealth {
        self.health.lock().clone()
    }

    pub fn current_backoff(&self) -> Duration {
        self.health.lock().current_backoff
    }

    pub fn readmit_time(&self) -> Option<Instant> {
        self.health.lock().readmit_time
    }

    /// The number of failed attempts recorded for this node.
    pub fn attempts(&self) -> u64 {
        self.health.lock().bad_grpc_status_count
    }

    /// Records a failed attempt.
    pub fn increase_backoff(&self) {
        let mut health = self.health.lock();
        health.bad_grpc_status_count += 1;
        // A zero backoff cannot double; escalate straight to the maximum.
        let doubled = if health.current_backoff.is_zero() {
            health.max_backoff
        } else {
            health.current_backoff.saturating_mul(2)
        };
        health.current_backoff = doubled.min(health.max_backoff);
    }

    /// Records a successful attempt.
    pub fn decrease_backoff(&self) {
        let mut health = self.health.lock();
        health.current_backoff = (health.current_backoff / 2).max(health.min_backoff);
    }

    /// Returns how long to wait before this node may be tried again.
    pub fn wait(&self) -> Duration {
        self.health
            .lock()
            .readmit_time
            .map_or(Duration::ZERO, |readmit_time| {
                readmit_time.saturating_duration_since(Instant::now())
            })
    }

    /// Marks the node as used for a request.
    pub fn in_use(&self) {
        let mut health = self.health.lock();
        health.use_count += 1;
        health.last_used = Some(Instant::now());
    }

    pub fn is_healthy(&self) -> bool {
        let health = self.health.lock();
        health.current_backoff < health.max_backoff
    }

    /// Excludes the node until `readmit_time`.
    pub fn exclude_until(&self, readmit_time: Instant) {
        self.health.lock().readmit_time = Some(readmit_time);
    }

    /// Ends an exclusion. The backoff is halved once, so the node comes back on
    /// probation: one more failure excludes it again.
    pub fn readmit(&self) {
        let mut health = self.health.lock();
        health.readmit_time = None;
        health.current_backoff = (health.current_backoff / 2).max(health.min_backoff);
    }

    pub fn set_min_backoff(&self, min_backoff: Duration) {
        let mut health = self.health.lock();
        health.min_backoff = min_backoff;
        health.max_backoff = health.max_backoff.max(min_backoff);
        health.clamp_backoff();
    }

    pub fn set_max_backoff(&self, max_backoff: Duration) {
        let mut health = self.health.lock();
        health.max_backoff = max_backoff;
        health.min_backoff = health.min_backoff.min(max_backoff);
        health.clamp_backoff();
    }

    /// Sets both bounds at once.
    pub fn set_backoff_bounds(&self, min_backoff: Duration, max_backoff: Duration) {
        let mut health = self.health.lock();
        health.min_backoff = min_backoff;
        health.max_backoff = max_backoff.max(min_backoff);
        health.clamp_backoff();
    }
}
