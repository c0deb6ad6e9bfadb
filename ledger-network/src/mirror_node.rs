// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tonic::transport::Channel;
use tracing::instrument;

use crate::{
    address::ManagedNodeAddress,
    managed_network::NodeHandle,
    managed_node::ManagedNode,
    transport::{dial_with_timeout, Connector, TlsPolicy},
    NetworkError,
};

/// A mirror node. Mirror nodes have no account and are identified by their address.
/// Their certificates are publicly trusted, so no pinning applies.
pub struct MirrorNode {
    managed: ManagedNode,
    channel: Mutex<Option<Channel>>,
    connector: Arc<dyn Connector>,
}

impl fmt::Debug for MirrorNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorNode")
            .field("address", self.managed.address())
            .finish_non_exhaustive()
    }
}

impl MirrorNode {
    pub fn new(managed: ManagedNode, connector: Arc<dyn Connector>) -> Self {
        Self {
            managed,
            channel: Mutex::new(None),
            connector,
        }
    }

    #[instrument(level = "debug", skip(self), fields(address = %self.managed.address()))]
    pub async fn channel(&self) -> Result<Channel, NetworkError> {
        let mut channel = self.channel.lock().await;
        if let Some(channel) = channel.as_ref() {
            return Ok(channel.clone());
        }
        let address = self.managed.address();
        let tls = address.is_transport_security().then_some(TlsPolicy::WebPki);
        let dialed = dial_with_timeout(self.connector.as_ref(), address, tls).await?;
        *channel = Some(dialed.clone());
        Ok(dialed)
    }

    fn with_address(&self, address: ManagedNodeAddress) -> Self {
        Self {
            managed: self.managed.with_address(address),
            channel: Mutex::new(None),
            connector: self.connector.clone(),
        }
    }
}

#[async_trait]
impl NodeHandle for MirrorNode {
    type Key = String;

    fn key(&self) -> String {
        self.managed.address().to_string()
    }

    fn managed(&self) -> &ManagedNode {
        &self.managed
    }

    async fn close(&self) {
        self.channel.lock().await.take();
    }

    fn to_secure(&self) -> Self {
        self.with_address(self.managed.address().to_secure())
    }

    fn to_insecure(&self) -> Self {
        self.with_address(self.managed.address().to_insecure())
    }
}
