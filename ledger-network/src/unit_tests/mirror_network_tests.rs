// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use assert_matches::assert_matches;

use super::MirrorNetwork;
use crate::{presets::NetworkName, test_utils::CountingConnector, NetworkError};

#[tokio::test]
async fn test_mirror_network_round_trips_addresses() {
    let network = MirrorNetwork::new(Arc::new(CountingConnector::new()));
    network
        .set_network(NetworkName::Testnet.mirror_nodes())
        .await
        .unwrap();
    assert_eq!(
        network.network().await,
        vec!["testnet.mirrornode.hedera.com:443".to_string()]
    );
}

#[tokio::test]
async fn test_mirror_nodes_default_to_tls() {
    let connector = Arc::new(CountingConnector::new());
    let network = MirrorNetwork::new(connector.clone());
    network
        .set_network(vec!["mirror.local:5600".to_string()])
        .await
        .unwrap();
    assert_eq!(network.network().await, vec!["mirror.local:443".to_string()]);

    let node = network.next_mirror_node().await.unwrap();
    node.channel().await.unwrap();
    assert_eq!(connector.secure_dials(), 1);
}

#[tokio::test]
async fn test_insecure_mirror_network() {
    let connector = Arc::new(CountingConnector::new());
    let network = MirrorNetwork::new(connector.clone());
    network.set_transport_security(false).await;
    network
        .set_network(vec!["127.0.0.1:5600".to_string()])
        .await
        .unwrap();

    let node = network.next_mirror_node().await.unwrap();
    node.channel().await.unwrap();
    node.channel().await.unwrap();
    assert_eq!(connector.dials(), 1);
    assert_eq!(connector.secure_dials(), 0);

    network.close().await;
    node.channel().await.unwrap();
    assert_eq!(connector.dials(), 2);
}

#[tokio::test]
async fn test_invalid_mirror_address() {
    let network = MirrorNetwork::new(Arc::new(CountingConnector::new()));
    assert_matches!(
        network.set_network(vec!["mirror.local".to_string()]).await,
        Err(NetworkError::InvalidNodeAddress { .. })
    );
    assert!(network.network().await.is_empty());
    assert!(network.next_mirror_node().await.is_none());
}
