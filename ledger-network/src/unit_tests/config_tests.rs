// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use assert_matches::assert_matches;
use clap::Parser as _;
use ledger_base::time::Duration;

use super::NetworkOptions;
use crate::{managed_network::ManagedNetwork, node::Node, NetworkError};

#[derive(clap::Parser)]
struct TestCli {
    #[command(flatten)]
    options: NetworkOptions,
}

#[test]
fn test_command_line_defaults() {
    let cli = TestCli::parse_from(["test"]);
    assert_eq!(cli.options, NetworkOptions::default());
}

#[test]
fn test_command_line_overrides() {
    let cli = TestCli::parse_from([
        "test",
        "--max-backoff-ms",
        "16000",
        "--max-node-attempts",
        "3",
        "--transport-security",
        "--verify-certificate",
        "false",
        "--address-book",
        "books/testnet.json",
    ]);
    assert_eq!(cli.options.max_backoff_ms, 16_000);
    assert_eq!(cli.options.max_node_attempts, Some(3));
    assert!(cli.options.transport_security);
    assert!(!cli.options.verify_certificate);
    assert_eq!(
        cli.options.address_book.as_deref(),
        Some(std::path::Path::new("books/testnet.json"))
    );
}

#[test]
fn test_missing_fields_take_defaults() {
    let options = serde_json::from_str::<NetworkOptions>("{}").unwrap();
    assert_eq!(options, NetworkOptions::default());

    let options =
        serde_json::from_str::<NetworkOptions>(r#"{ "minBackoffMs": 100, "maxNodesPerTransaction": 2 }"#)
            .unwrap();
    assert_eq!(options.min_backoff_ms, 100);
    assert_eq!(options.max_nodes_per_transaction, Some(2));
    assert!(options.verify_certificate);
}

#[test]
fn test_transport_options() {
    let options = NetworkOptions {
        dial_timeout_ms: 1_500,
        ..NetworkOptions::default()
    };
    let transport = options.transport_options();
    assert_eq!(transport.dial_timeout, Duration::from_millis(1_500));
    assert_eq!(transport.keep_alive_interval, Duration::from_secs(60));
    assert_eq!(transport.keep_alive_timeout, Duration::from_secs(20));
}

#[tokio::test]
async fn test_apply_raises_both_bounds() {
    let network = ManagedNetwork::<Node>::new();
    let options = NetworkOptions {
        min_backoff_ms: 10_000,
        max_backoff_ms: 20_000,
        min_node_readmit_period_ms: 90_000,
        max_node_readmit_period_ms: 120_000,
        max_nodes_per_transaction: Some(2),
        ..NetworkOptions::default()
    };
    options.apply(&network).await.unwrap();
    assert_eq!(network.min_backoff().await, Duration::from_secs(10));
    assert_eq!(network.max_backoff().await, Duration::from_secs(20));
    assert_eq!(network.min_node_readmit_period().await, Duration::from_secs(90));
    assert_eq!(network.max_node_readmit_period().await, Duration::from_secs(120));
    assert_eq!(network.max_nodes_per_transaction().await, Some(2));
}

#[tokio::test]
async fn test_apply_rejects_inverted_bounds() {
    let network = ManagedNetwork::<Node>::new();
    let options = NetworkOptions {
        min_backoff_ms: 5_000,
        max_backoff_ms: 1_000,
        ..NetworkOptions::default()
    };
    assert_matches!(
        options.apply(&network).await,
        Err(NetworkError::InvalidBackoff { .. })
    );
    let options = NetworkOptions {
        min_node_readmit_period_ms: 5_000,
        max_node_readmit_period_ms: 1_000,
        ..NetworkOptions::default()
    };
    assert_matches!(
        options.apply(&network).await,
        Err(NetworkError::InvalidReadmitPeriod { .. })
    );
}
