// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The pool of nodes shared by consensus and mirror networks.
//!
//! The registered nodes are the single source of truth. The per-key index and the
//! healthy set are views rebuilt from them under the same write lock, so readers never
//! observe a node that is healthy but unknown. A node is in the healthy set exactly
//! when it has no pending readmit time.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    hash::Hash,
    sync::Arc,
};

use async_trait::async_trait;
use futures::future::join_all;
use ledger_base::{
    ensure,
    ledger_id::LedgerId,
    time::{Duration, Instant},
};
use rand::{seq::SliceRandom as _, Rng as _};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::{
    address::ManagedNodeAddress,
    managed_node::{ManagedNode, DEFAULT_MAX_BACKOFF, DEFAULT_MIN_BACKOFF},
    NetworkError,
};

#[cfg(test)]
#[path = "unit_tests/managed_network_tests.rs"]
mod managed_network_tests;

/// The shortest time an unhealthy node stays excluded.
pub const DEFAULT_MIN_NODE_READMIT_PERIOD: Duration = Duration::from_secs(8);
/// The longest time an unhealthy node stays excluded.
pub const DEFAULT_MAX_NODE_READMIT_PERIOD: Duration = Duration::from_secs(60);

/// Stands in for readmit times too far ahead to be represented.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Returns `now + period`, saturating at a far-future instant.
fn deadline_after(now: Instant, period: Duration) -> Instant {
    now.checked_add(period).unwrap_or_else(|| now + FAR_FUTURE)
}

/// A node that can be pooled by a [`ManagedNetwork`].
#[async_trait]
pub trait NodeHandle: Send + Sync + Sized + 'static {
    /// What identifies the node to callers. Several nodes may share a key.
    type Key: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync;

    fn key(&self) -> Self::Key;

    /// The health state embedded in the node.
    fn managed(&self) -> &ManagedNode;

    fn address(&self) -> &ManagedNodeAddress {
        self.managed().address()
    }

    /// Tears down the node's channel. The next request redials.
    async fn close(&self);

    /// Returns the node with its address switched to the TLS port.
    fn to_secure(&self) -> Self;

    /// Returns the node with its address switched to the plaintext port.
    fn to_insecure(&self) -> Self;

    fn set_verify_certificate(&self, _verify_certificate: bool) {}
}

#[derive(Clone, Debug)]
struct NetworkPolicy {
    min_backoff: Duration,
    max_backoff: Duration,
    min_node_readmit_period: Duration,
    max_node_readmit_period: Duration,
    max_nodes_per_transaction: Option<usize>,
    max_node_attempts: Option<u64>,
    ledger_id: Option<LedgerId>,
    transport_security: bool,
    verify_certificate: bool,
}

impl Default for NetworkPolicy {
    fn default() -> Self {
        Self {
            min_backoff: DEFAULT_MIN_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            min_node_readmit_period: DEFAULT_MIN_NODE_READMIT_PERIOD,
            max_node_readmit_period: DEFAULT_MAX_NODE_READMIT_PERIOD,
            max_nodes_per_transaction: None,
            max_node_attempts: None,
            ledger_id: None,
            transport_security: false,
            verify_certificate: true,
        }
    }
}

struct NetworkState<N: NodeHandle> {
    /// Every registered node, in registration order.
    nodes: Vec<Arc<N>>,
    by_key: HashMap<N::Key, Vec<Arc<N>>>,
    healthy: Vec<Arc<N>>,
    /// No node is due for readmission before this instant.
    earliest_readmit_time: Instant,
    policy: NetworkPolicy,
}

impl<N: NodeHandle> NetworkState<N> {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            by_key: HashMap::new(),
            healthy: Vec::new(),
            earliest_readmit_time: Instant::now(),
            policy: NetworkPolicy::default(),
        }
    }

    fn rebuild_views(&mut self) {
        self.by_key.clear();
        for node in &self.nodes {
            self.by_key.entry(node.key()).or_default().push(node.clone());
        }
        self.healthy = self
            .nodes
            .iter()
            .filter(|node| node.managed().readmit_time().is_none())
            .cloned()
            .collect();
    }

    /// Brings a node handed in by a caller in line with the network's policy.
    fn adopt(&self, node: N) -> N {
        let node = if self.policy.transport_security {
            node.to_secure()
        } else {
            node.to_insecure()
        };
        node.managed()
            .set_backoff_bounds(self.policy.min_backoff, self.policy.max_backoff);
        node.set_verify_certificate(self.policy.verify_certificate);
        node
    }

    fn readmit_jitter(&self) -> Duration {
        rand::thread_rng().gen_range(
            self.policy.min_node_readmit_period..=self.policy.max_node_readmit_period,
        )
    }

    fn readmit_nodes(&mut self, now: Instant) {
        if now < self.earliest_readmit_time {
            return;
        }
        let mut next_readmit_time = None;
        for node in &self.nodes {
            let managed = node.managed();
            match managed.readmit_time() {
                Some(readmit_time) if readmit_time <= now => {
                    managed.readmit();
                    self.healthy.push(node.clone());
                    info!(node = %node.key(), address = %node.address(), "readmitting node");
                    #[cfg(with_metrics)]
                    crate::metrics::READMISSIONS
                        .with_label_values(&[&node.key().to_string()])
                        .inc();
                }
                Some(readmit_time) => {
                    next_readmit_time = Some(next_readmit_time.map_or(readmit_time, |next| {
                        std::cmp::min(next, readmit_time)
                    }));
                }
                None => {}
            }
        }
        self.earliest_readmit_time = next_readmit_time
            .unwrap_or_else(|| deadline_after(now, self.policy.max_node_readmit_period));
    }

    fn has_dead_nodes(&self) -> bool {
        self.policy.max_node_attempts.is_some_and(|max_attempts| {
            self.nodes
                .iter()
                .any(|node| node.managed().attempts() >= max_attempts)
        })
    }

    fn take_dead_nodes(&mut self) -> Vec<Arc<N>> {
        let Some(max_attempts) = self.policy.max_node_attempts else {
            return Vec::new();
        };
        let (dead, alive): (Vec<_>, Vec<_>) = std::mem::take(&mut self.nodes)
            .into_iter()
            .partition(|node| node.managed().attempts() >= max_attempts);
        self.nodes = alive;
        self.rebuild_views();
        dead
    }
}

/// A set of interchangeable nodes, their health, and the policy to select among them.
pub struct ManagedNetwork<N: NodeHandle> {
    state: RwLock<NetworkState<N>>,
}

impl<N: NodeHandle> Default for ManagedNetwork<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: NodeHandle> fmt::Debug for ManagedNetwork<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedNetwork").finish_non_exhaustive()
    }
}

impl<N: NodeHandle> ManagedNetwork<N> {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(NetworkState::new()),
        }
    }

    /// Creates an empty network whose nodes are reached over TLS or not.
    pub fn with_transport_security(transport_security: bool) -> Self {
        let mut state = NetworkState::new();
        state.policy.transport_security = transport_security;
        Self {
            state: RwLock::new(state),
        }
    }

    /// Replaces the set of nodes.
    ///
    /// A node at an address already present with the same key is kept, with its health
    /// and channel. Every other incoming node is added as healthy. Nodes that are no
    /// longer listed are dropped from every view and closed once the update is visible.
    #[instrument(level = "debug", skip_all)]
    pub async fn set_network(&self, nodes: impl IntoIterator<Item = N>) {
        let removed = {
            let mut state = self.state.write().await;
            let mut previous = std::mem::take(&mut state.nodes)
                .into_iter()
                .map(|node| (node.address().clone(), node))
                .collect::<HashMap<_, _>>();
            let mut removed = Vec::new();
            let mut next: Vec<Arc<N>> = Vec::new();
            for node in nodes {
                let node = state.adopt(node);
                if let Some(index) = next.iter().position(|n| n.address() == node.address()) {
                    // The same address was listed twice: the last entry wins.
                    removed.push(next.remove(index));
                }
                match previous.remove(node.address()) {
                    Some(existing) if existing.key() == node.key() => next.push(existing),
                    Some(existing) => {
                        debug!(address = %node.address(), "node changed account");
                        removed.push(existing);
                        next.push(Arc::new(node));
                    }
                    None => next.push(Arc::new(node)),
                }
            }
            removed.extend(previous.into_values());
            state.nodes = next;
            state.rebuild_views();
            removed
        };
        join_all(removed.iter().map(|node| node.close())).await;
    }

    /// Every registered node, in registration order.
    pub async fn nodes(&self) -> Vec<Arc<N>> {
        self.state.read().await.nodes.clone()
    }

    /// The nodes currently eligible for selection.
    pub async fn healthy_nodes(&self) -> Vec<Arc<N>> {
        self.state.read().await.healthy.clone()
    }

    /// The first registered node with the given key.
    pub async fn node_for_key(&self, key: &N::Key) -> Option<Arc<N>> {
        let state = self.state.read().await;
        state.by_key.get(key)?.first().cloned()
    }

    /// Every registered node with the given key.
    pub async fn nodes_for_key(&self, key: &N::Key) -> Vec<Arc<N>> {
        let state = self.state.read().await;
        state.by_key.get(key).cloned().unwrap_or_default()
    }

    /// Returns a random healthy node, or a random known node when none is healthy.
    pub async fn node(&self) -> Option<Arc<N>> {
        self.prepare_selection().await;
        let state = self.state.read().await;
        let mut rng = rand::thread_rng();
        state
            .healthy
            .choose(&mut rng)
            .or_else(|| state.nodes.choose(&mut rng))
            .cloned()
    }

    /// Returns up to `count` healthy nodes with distinct keys, in random order.
    pub async fn number_of_most_healthy_nodes(&self, count: usize) -> Vec<Arc<N>> {
        self.prepare_selection().await;
        let mut healthy = self.healthy_nodes().await;
        healthy.shuffle(&mut rand::thread_rng());
        let mut keys = HashSet::new();
        healthy.retain(|node| keys.insert(node.key()));
        healthy.truncate(count);
        healthy
    }

    /// How many nodes a transaction is sent to.
    pub async fn number_of_nodes_for_transaction(&self) -> usize {
        let state = self.state.read().await;
        let keys = state.by_key.len();
        state
            .policy
            .max_nodes_per_transaction
            .map_or(keys.div_ceil(3), |max_nodes| max_nodes.min(keys))
    }

    /// Records a failure of `node`. A node whose backoff reaches the maximum is
    /// excluded from selection for a random period within the readmit bounds.
    pub async fn increase_backoff(&self, node: &N) {
        let mut state = self.state.write().await;
        let managed = node.managed();
        managed.increase_backoff();
        if managed.is_healthy() || managed.readmit_time().is_some() {
            return;
        }
        let readmit_time = deadline_after(Instant::now(), state.readmit_jitter());
        managed.exclude_until(readmit_time);
        state.healthy.retain(|healthy| !std::ptr::eq(Arc::as_ptr(healthy), node));
        state.earliest_readmit_time = state.earliest_readmit_time.min(readmit_time);
        info!(
            node = %node.key(),
            address = %node.address(),
            backoff = ?managed.current_backoff(),
            "excluding unhealthy node"
        );
        #[cfg(with_metrics)]
        crate::metrics::EVICTIONS
            .with_label_values(&[&node.key().to_string()])
            .inc();
    }

    /// Records a success of `node`.
    pub fn decrease_backoff(&self, node: &N) {
        node.managed().decrease_backoff();
    }

    /// Returns excluded nodes whose readmit time has passed to the healthy set.
    pub async fn readmit_nodes(&self) {
        let now = Instant::now();
        if now < self.state.read().await.earliest_readmit_time {
            return;
        }
        self.state.write().await.readmit_nodes(now);
    }

    /// Removes and closes the nodes that failed `max_node_attempts` times.
    pub async fn remove_dead_nodes(&self) {
        if !self.state.read().await.has_dead_nodes() {
            return;
        }
        let dead = self.state.write().await.take_dead_nodes();
        for node in &dead {
            info!(node = %node.key(), address = %node.address(), "removing dead node");
        }
        join_all(dead.iter().map(|node| node.close())).await;
    }

    async fn prepare_selection(&self) {
        self.readmit_nodes().await;
        self.remove_dead_nodes().await;
    }

    pub async fn earliest_readmit_time(&self) -> Instant {
        self.state.read().await.earliest_readmit_time
    }

    pub async fn min_backoff(&self) -> Duration {
        self.state.read().await.policy.min_backoff
    }

    pub async fn max_backoff(&self) -> Duration {
        self.state.read().await.policy.max_backoff
    }

    pub async fn set_min_backoff(&self, min_backoff: Duration) -> Result<(), NetworkError> {
        let mut state = self.state.write().await;
        let max = state.policy.max_backoff;
        ensure!(
            min_backoff <= max,
            NetworkError::InvalidBackoff {
                min: min_backoff,
                max
            }
        );
        state.policy.min_backoff = min_backoff;
        for node in &state.nodes {
            node.managed().set_min_backoff(min_backoff);
        }
        Ok(())
    }

    pub async fn set_max_backoff(&self, max_backoff: Duration) -> Result<(), NetworkError> {
        let mut state = self.state.write().await;
        let min = state.policy.min_backoff;
        ensure!(
            min <= max_backoff,
            NetworkError::InvalidBackoff {
                min,
                max: max_backoff
            }
        );
        state.policy.max_backoff = max_backoff;
        for node in &state.nodes {
            node.managed().set_max_backoff(max_backoff);
        }
        Ok(())
    }

    pub async fn min_node_readmit_period(&self) -> Duration {
        self.state.read().await.policy.min_node_readmit_period
    }

    pub async fn max_node_readmit_period(&self) -> Duration {
        self.state.read().await.policy.max_node_readmit_period
    }

    pub async fn set_min_node_readmit_period(&self, period: Duration) -> Result<(), NetworkError> {
        let mut state = self.state.write().await;
        let max = state.policy.max_node_readmit_period;
        ensure!(
            period <= max,
            NetworkError::InvalidReadmitPeriod { min: period, max }
        );
        state.policy.min_node_readmit_period = period;
        Ok(())
    }

    pub async fn set_max_node_readmit_period(&self, period: Duration) -> Result<(), NetworkError> {
        let mut state = self.state.write().await;
        let min = state.policy.min_node_readmit_period;
        ensure!(
            min <= period,
            NetworkError::InvalidReadmitPeriod { min, max: period }
        );
        state.policy.max_node_readmit_period = period;
        Ok(())
    }

    pub async fn max_nodes_per_transaction(&self) -> Option<usize> {
        self.state.read().await.policy.max_nodes_per_transaction
    }

    pub async fn set_max_nodes_per_transaction(&self, max_nodes: Option<usize>) {
        self.state.write().await.policy.max_nodes_per_transaction = max_nodes;
    }

    pub async fn max_node_attempts(&self) -> Option<u64> {
        self.state.read().await.policy.max_node_attempts
    }

    pub async fn set_max_node_attempts(&self, max_attempts: Option<u64>) {
        self.state.write().await.policy.max_node_attempts = max_attempts;
    }

    pub async fn ledger_id(&self) -> Option<LedgerId> {
        self.state.read().await.policy.ledger_id.clone()
    }

    pub async fn set_ledger_id(&self, ledger_id: Option<LedgerId>) {
        self.state.write().await.policy.ledger_id = ledger_id;
    }

    pub async fn verify_certificate(&self) -> bool {
        self.state.read().await.policy.verify_certificate
    }

    pub async fn set_verify_certificate(&self, verify_certificate: bool) {
        let mut state = self.state.write().await;
        state.policy.verify_certificate = verify_certificate;
        for node in &state.nodes {
            node.set_verify_certificate(verify_certificate);
        }
    }

    pub async fn transport_security(&self) -> bool {
        self.state.read().await.policy.transport_security
    }

    /// Switches every node to its secure or plaintext address. Health and exclusion
    /// carry over to the replacement nodes; the replaced ones are closed.
    pub async fn set_transport_security(&self, transport_security: bool) {
        let replaced = {
            let mut state = self.state.write().await;
            if state.policy.transport_security == transport_security {
                return;
            }
            state.policy.transport_security = transport_security;
            let replaced = std::mem::take(&mut state.nodes);
            state.nodes = replaced
                .iter()
                .map(|node| {
                    Arc::new(if transport_security {
                        node.to_secure()
                    } else {
                        node.to_insecure()
                    })
                })
                .collect();
            state.rebuild_views();
            replaced
        };
        info!(transport_security, "switched transport security");
        join_all(replaced.iter().map(|node| node.close())).await;
    }

    /// Closes the channel of every node.
    pub async fn close(&self) {
        let nodes = self.nodes().await;
        join_all(nodes.iter().map(|node| node.close())).await;
    }
}
