// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

#![cfg(feature = "test")]

use std::{collections::HashMap, sync::Arc};

use ledger_base::{
    identifiers::AccountId,
    time::{timer, Duration},
};
use ledger_network::{
    address_book::AddressBooks, managed_network::NodeHandle as _, test_utils::CountingConnector,
    Network,
};

#[test_log::test(tokio::test(start_paused = true))]
async fn test_failing_node_is_evicted_then_readmitted() -> anyhow::Result<()> {
    let connector = Arc::new(CountingConnector::new());
    let network = Network::new(connector.clone(), AddressBooks::default());
    network.managed().set_min_backoff(Duration::from_millis(250)).await?;
    network.managed().set_max_backoff(Duration::from_secs(8)).await?;
    network
        .set_network(HashMap::from([(
            "a:50211".to_string(),
            AccountId::from_num(3),
        )]))
        .await?;
    let node = network
        .node_for_account_id(&AccountId::from_num(3))
        .await
        .expect("node is registered");
    node.channel().await?;

    for _ in 0..6 {
        network.increase_backoff(&node).await;
    }
    assert!(network.node_account_ids_for_execute().await.is_empty());
    let wait = node.managed().wait();
    assert!(wait >= network.managed().min_node_readmit_period().await);
    assert!(wait <= network.managed().max_node_readmit_period().await);

    timer::advance(wait).await;

    assert_eq!(
        network.node_account_ids_for_execute().await,
        vec![AccountId::from_num(3)]
    );
    // Eviction does not tear the channel down.
    assert!(node.has_channel().await);
    assert_eq!(connector.dials(), 1);

    network.close().await;
    assert!(!node.has_channel().await);
    Ok(())
}
