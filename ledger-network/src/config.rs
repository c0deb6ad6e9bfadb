// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Command-line and serialized options of the node pool.

use std::path::PathBuf;

use ledger_base::time::Duration;
use serde::{Deserialize, Serialize};

use crate::{
    managed_network::{ManagedNetwork, NodeHandle},
    transport::TransportOptions,
    NetworkError,
};

#[cfg(test)]
#[path = "unit_tests/config_tests.rs"]
mod config_tests;

#[derive(Debug, Clone, PartialEq, Eq, clap::Args, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkOptions {
    /// The backoff a node starts with, and returns to after successes.
    #[serde(default = "default_min_backoff_ms")]
    #[arg(long, default_value = "250", env = "LEDGER_MIN_BACKOFF")]
    pub min_backoff_ms: u64,

    /// The backoff at which a node is considered unhealthy and excluded.
    #[serde(default = "default_max_backoff_ms")]
    #[arg(long, default_value = "8000", env = "LEDGER_MAX_BACKOFF")]
    pub max_backoff_ms: u64,

    /// The shortest time an unhealthy node stays excluded.
    #[serde(default = "default_min_node_readmit_period_ms")]
    #[arg(long, default_value = "8000", env = "LEDGER_MIN_NODE_READMIT_PERIOD")]
    pub min_node_readmit_period_ms: u64,

    /// The longest time an unhealthy node stays excluded.
    #[serde(default = "default_max_node_readmit_period_ms")]
    #[arg(long, default_value = "60000", env = "LEDGER_MAX_NODE_READMIT_PERIOD")]
    pub max_node_readmit_period_ms: u64,

    /// How many nodes a transaction is sent to. Defaults to a third of the network.
    #[serde(default)]
    #[arg(long, env = "LEDGER_MAX_NODES_PER_TRANSACTION")]
    pub max_nodes_per_transaction: Option<usize>,

    /// Remove a node from the network after this many failed attempts.
    #[serde(default)]
    #[arg(long, env = "LEDGER_MAX_NODE_ATTEMPTS")]
    pub max_node_attempts: Option<u64>,

    /// Connect to nodes over TLS.
    #[serde(default)]
    #[arg(long, env = "LEDGER_TRANSPORT_SECURITY")]
    pub transport_security: bool,

    /// Check node certificates against the address book.
    #[serde(default = "default_verify_certificate")]
    #[arg(
        long,
        default_value = "true",
        action = clap::ArgAction::Set,
        env = "LEDGER_VERIFY_CERTIFICATE"
    )]
    pub verify_certificate: bool,

    /// The time allowed to establish a channel.
    #[serde(default = "default_dial_timeout_ms")]
    #[arg(long, default_value = "10000", env = "LEDGER_DIAL_TIMEOUT")]
    pub dial_timeout_ms: u64,

    /// The interval between HTTP/2 keep-alive pings.
    #[serde(default = "default_keep_alive_interval_ms")]
    #[arg(long, default_value = "60000", env = "LEDGER_KEEP_ALIVE_INTERVAL")]
    pub keep_alive_interval_ms: u64,

    /// The time to wait for a keep-alive ping to be acknowledged.
    #[serde(default = "default_keep_alive_timeout_ms")]
    #[arg(long, default_value = "20000", env = "LEDGER_KEEP_ALIVE_TIMEOUT")]
    pub keep_alive_timeout_ms: u64,

    /// A JSON address book to pin node certificates against, in place of the built-in
    /// one.
    #[serde(default)]
    #[arg(long, env = "LEDGER_ADDRESS_BOOK")]
    pub address_book: Option<PathBuf>,
}

fn default_min_backoff_ms() -> u64 {
    250
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

fn default_min_node_readmit_period_ms() -> u64 {
    8_000
}

fn default_max_node_readmit_period_ms() -> u64 {
    60_000
}

fn default_verify_certificate() -> bool {
    true
}

fn default_dial_timeout_ms() -> u64 {
    10_000
}

fn default_keep_alive_interval_ms() -> u64 {
    60_000
}

fn default_keep_alive_timeout_ms() -> u64 {
    20_000
}

impl Default for NetworkOptions {
    fn default() -> Self {
        Self {
            min_backoff_ms: default_min_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            min_node_readmit_period_ms: default_min_node_readmit_period_ms(),
            max_node_readmit_period_ms: default_max_node_readmit_period_ms(),
            max_nodes_per_transaction: None,
            max_node_attempts: None,
            transport_security: false,
            verify_certificate: default_verify_certificate(),
            dial_timeout_ms: default_dial_timeout_ms(),
            keep_alive_interval_ms: default_keep_alive_interval_ms(),
            keep_alive_timeout_ms: default_keep_alive_timeout_ms(),
            address_book: None,
        }
    }
}

impl NetworkOptions {
    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            dial_timeout: Duration::from_millis(self.dial_timeout_ms),
            keep_alive_interval: Duration::from_millis(self.keep_alive_interval_ms),
            keep_alive_timeout: Duration::from_millis(self.keep_alive_timeout_ms),
        }
    }

    /// Applies the pool settings to `network`. Bounds are updated in an order that keeps
    /// them valid at every step.
    pub async fn apply<N: NodeHandle>(
        &self,
        network: &ManagedNetwork<N>,
    ) -> Result<(), NetworkError> {
        let min_backoff = Duration::from_millis(self.min_backoff_ms);
        let max_backoff = Duration::from_millis(self.max_backoff_ms);
        ledger_base::ensure!(
            min_backoff <= max_backoff,
            NetworkError::InvalidBackoff {
                min: min_backoff,
                max: max_backoff
            }
        );
        let min_readmit = Duration::from_millis(self.min_node_readmit_period_ms);
        let max_readmit = Duration::from_millis(self.max_node_readmit_period_ms);
        ledger_base::ensure!(
            min_readmit <= max_readmit,
            NetworkError::InvalidReadmitPeriod {
                min: min_readmit,
                max: max_readmit
            }
        );
        if min_backoff > network.max_backoff().await {
            network.set_max_backoff(max_backoff).await?;
            network.set_min_backoff(min_backoff).await?;
        } else {
            network.set_min_backoff(min_backoff).await?;
            network.set_max_backoff(max_backoff).await?;
        }
        if min_readmit > network.max_node_readmit_period().await {
            network.set_max_node_readmit_period(max_readmit).await?;
            network.set_min_node_readmit_period(min_readmit).await?;
        } else {
            network.set_min_node_readmit_period(min_readmit).await?;
            network.set_max_node_readmit_period(max_readmit).await?;
        }
        network
            .set_max_nodes_per_transaction(self.max_nodes_per_transaction)
            .await;
        network.set_max_node_attempts(self.max_node_attempts).await;
        network.set_verify_certificate(self.verify_certificate).await;
        network.set_transport_security(self.transport_security).await;
        Ok(())
    }
}
