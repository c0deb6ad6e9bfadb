// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use crate::{
    address::ManagedNodeAddress,
    managed_network::{ManagedNetwork, NodeHandle as _},
    managed_node::{ManagedNode, DEFAULT_MAX_BACKOFF, DEFAULT_MIN_BACKOFF},
    mirror_node::MirrorNode,
    presets::NetworkName,
    transport::{Connector, GrpcConnector, TransportOptions},
    NetworkError,
};

#[cfg(test)]
#[path = "unit_tests/mirror_network_tests.rs"]
mod mirror_network_tests;

/// The mirror nodes a client streams records from. Mirror nodes are reached over TLS
/// unless configured otherwise.
#[derive(Debug)]
pub struct MirrorNetwork {
    managed: ManagedNetwork<MirrorNode>,
    connector: Arc<dyn Connector>,
}

impl MirrorNetwork {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            managed: ManagedNetwork::with_transport_security(true),
            connector,
        }
    }

    /// Creates a network of the well-known mirror nodes of `name`.
    pub async fn for_name(
        name: NetworkName,
        options: TransportOptions,
    ) -> Result<Self, NetworkError> {
        let network = Self::new(Arc::new(GrpcConnector::new(options)));
        network.set_network(name.mirror_nodes()).await?;
        Ok(network)
    }

    pub fn managed(&self) -> &ManagedNetwork<MirrorNode> {
        &self.managed
    }

    /// Replaces the mirror nodes with the `host:port` addresses of `network`.
    pub async fn set_network(&self, network: Vec<String>) -> Result<(), NetworkError> {
        let nodes = network
            .iter()
            .map(|url| {
                let address = url.parse::<ManagedNodeAddress>()?;
                let managed = ManagedNode::new(address, DEFAULT_MIN_BACKOFF, DEFAULT_MAX_BACKOFF);
                Ok(MirrorNode::new(managed, self.connector.clone()))
            })
            .collect::<Result<Vec<_>, NetworkError>>()?;
        self.managed.set_network(nodes).await;
        Ok(())
    }

    /// Returns the `host:port` addresses of the mirror nodes, in registration order.
    pub async fn network(&self) -> Vec<String> {
        self.managed
            .nodes()
            .await
            .iter()
            .map(|node| node.key())
            .collect()
    }

    /// Returns the mirror node to use for the next request.
    pub async fn next_mirror_node(&self) -> Option<Arc<MirrorNode>> {
        self.managed.node().await
    }

    pub async fn set_transport_security(&self, transport_security: bool) {
        self.managed.set_transport_security(transport_security).await;
    }

    pub async fn close(&self) {
        self.managed.close().await;
    }
}
