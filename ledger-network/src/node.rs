// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use http::uri::PathAndQuery;
use ledger_base::{ensure, identifiers::AccountId};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tonic::transport::Channel;
use tracing::instrument;

use crate::{
    address::ManagedNodeAddress,
    address_book::NodeAddress,
    certificate::{crypto_provider, PinnedCertificateVerifier},
    managed_network::NodeHandle,
    managed_node::ManagedNode,
    transport::{dial_with_timeout, Connector, RawCodec, TlsPolicy},
    NetworkError,
};

#[cfg(test)]
#[path = "unit_tests/node_tests.rs"]
mod node_tests;

/// A consensus node of the ledger.
///
/// The channel is dialed on first use and cached until [`NodeHandle::close`]. Its mutex
/// is held across the dial, so concurrent callers share a single connection attempt.
pub struct Node {
    managed: ManagedNode,
    account_id: AccountId,
    address_book: RwLock<Option<NodeAddress>>,
    verify_certificate: AtomicBool,
    channel: Mutex<Option<Channel>>,
    connector: Arc<dyn Connector>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("account_id", &self.account_id)
            .field("address", self.managed.address())
            .finish_non_exhaustive()
    }
}

impl Node {
    pub fn new(
        account_id: AccountId,
        managed: ManagedNode,
        address_book: Option<NodeAddress>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            managed,
            account_id,
            address_book: RwLock::new(address_book),
            verify_certificate: AtomicBool::new(true),
            channel: Mutex::new(None),
            connector,
        }
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn address_book(&self) -> Option<NodeAddress> {
        self.address_book.read().clone()
    }

    /// Replaces the address book entry used to pin this node's certificate. It applies
    /// from the next dial on.
    pub fn set_address_book(&self, address_book: Option<NodeAddress>) {
        *self.address_book.write() = address_book;
    }

    pub fn verify_certificate(&self) -> bool {
        self.verify_certificate.load(Ordering::Acquire)
    }

    /// Returns whether a channel is currently cached.
    pub async fn has_channel(&self) -> bool {
        self.channel.lock().await.is_some()
    }

    /// Returns the channel to this node, dialing it if needed.
    #[instrument(level = "debug", skip(self), fields(node = %self.account_id))]
    pub async fn channel(&self) -> Result<Channel, NetworkError> {
        let mut channel = self.channel.lock().await;
        if let Some(channel) = channel.as_ref() {
            return Ok(channel.clone());
        }
        let address = self.managed.address();
        let tls = address
            .is_transport_security()
            .then(|| TlsPolicy::Pinned(Arc::new(self.certificate_verifier())));
        let dialed = dial_with_timeout(self.connector.as_ref(), address, tls).await?;
        *channel = Some(dialed.clone());
        Ok(dialed)
    }

    fn certificate_verifier(&self) -> PinnedCertificateVerifier {
        let cert_hash = self
            .address_book
            .read()
            .as_ref()
            .and_then(|entry| entry.pinned_cert_hash().map(<[u8]>::to_vec));
        PinnedCertificateVerifier::new(
            self.account_id,
            cert_hash,
            self.verify_certificate(),
            &crypto_provider(),
        )
    }

    /// Sends an already-serialized request to `method`, e.g.
    /// `/proto.CryptoService/cryptoTransfer`, and returns the serialized response.
    #[instrument(level = "debug", skip(self, request), fields(node = %self.account_id))]
    pub async fn invoke(&self, method: &str, request: Bytes) -> Result<Bytes, NetworkError> {
        let invalid_method = || NetworkError::InvalidMethod {
            method: method.to_owned(),
        };
        ensure!(method.starts_with('/'), invalid_method());
        let path = PathAndQuery::try_from(method).map_err(|_| invalid_method())?;
        let channel = self.channel().await?;
        self.managed.in_use();
        let mut grpc = tonic::client::Grpc::new(channel);
        grpc.ready()
            .await
            .map_err(|error| NetworkError::Connection {
                address: self.managed.address().to_string(),
                error,
            })?;
        let response = grpc
            .unary(tonic::Request::new(request), path, RawCodec)
            .await?;
        Ok(response.into_inner())
    }

    fn with_address(&self, address: ManagedNodeAddress) -> Self {
        // The channel only carries over when the transport does not change.
        let channel = if address == *self.managed.address() {
            self.channel.try_lock().ok().and_then(|channel| channel.clone())
        } else {
            None
        };
        Self {
            managed: self.managed.with_address(address),
            account_id: self.account_id,
            address_book: RwLock::new(self.address_book()),
            verify_certificate: AtomicBool::new(self.verify_certificate()),
            channel: Mutex::new(channel),
            connector: self.connector.clone(),
        }
    }
}

#[async_trait]
impl NodeHandle for Node {
    type Key = AccountId;

    fn key(&self) -> AccountId {
        self.account_id
    }

    fn managed(&self) -> &ManagedNode {
        &self.managed
    }

    async fn close(&self) {
        self.channel.lock().await.take();
    }

    /// Returns the node on its TLS port, with the same health, address book entry and
    /// verification setting. A cached channel is not carried over when the port
    /// changes, since it was dialed in plaintext; the secure node dials on first use.
    fn to_secure(&self) -> Self {
        self.with_address(self.managed.address().to_secure())
    }

    /// Returns the node on its plaintext port. As with [`NodeHandle::to_secure`], a
    /// cached channel only carries over when the port is unchanged.
    fn to_insecure(&self) -> Self {
        self.with_address(self.managed.address().to_insecure())
    }

    fn set_verify_certificate(&self, verify_certificate: bool) {
        self.verify_certificate
            .store(verify_certificate, Ordering::Release);
    }
}
