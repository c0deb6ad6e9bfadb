// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The consensus nodes a client submits transactions and queries to.

use std::{collections::HashMap, sync::Arc};

use ledger_base::{identifiers::AccountId, ledger_id::LedgerId};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::{
    address::ManagedNodeAddress,
    address_book::{AddressBook, AddressBooks},
    config::NetworkOptions,
    managed_network::{ManagedNetwork, NodeHandle as _},
    managed_node::{ManagedNode, DEFAULT_MAX_BACKOFF, DEFAULT_MIN_BACKOFF},
    node::Node,
    presets::NetworkName,
    transport::{Connector, GrpcConnector},
    NetworkError,
};

#[cfg(test)]
#[path = "unit_tests/network_tests.rs"]
mod network_tests;

/// The consensus network: nodes keyed by account, with the address book used to pin
/// their certificates.
#[derive(Debug)]
pub struct Network {
    managed: ManagedNetwork<Node>,
    address_books: AddressBooks,
    /// The book certificates are currently pinned against.
    address_book: RwLock<Option<Arc<AddressBook>>>,
    /// The book installed with [`Network::set_address_book`]. While transport security is
    /// on it takes precedence over the built-in book of the ledger. The lock is held
    /// while nodes are bound to a book, so registrations and book changes never
    /// interleave.
    explicit_address_book: Mutex<Option<Arc<AddressBook>>>,
    connector: Arc<dyn Connector>,
}

impl Network {
    /// Creates an empty network dialing through `connector` and pinning certificates
    /// against `address_books`.
    pub fn new(connector: Arc<dyn Connector>, address_books: AddressBooks) -> Self {
        Self {
            managed: ManagedNetwork::new(),
            address_books,
            address_book: RwLock::new(None),
            explicit_address_book: Mutex::new(None),
            connector,
        }
    }

    /// Creates an empty network with the built-in address books, and the address book
    /// file of `options` installed if one is given.
    pub async fn from_options(options: &NetworkOptions) -> Result<Self, NetworkError> {
        let connector = Arc::new(GrpcConnector::new(options.transport_options()));
        let network = Self::new(connector, AddressBooks::builtin().clone());
        options.apply(&network.managed).await?;
        if let Some(path) = &options.address_book {
            network
                .set_address_book(AddressBook::from_file(path)?)
                .await;
        }
        Ok(network)
    }

    /// Creates a network of the well-known nodes of `name`.
    pub async fn for_name(
        name: NetworkName,
        options: &NetworkOptions,
    ) -> Result<Self, NetworkError> {
        let network = Self::from_options(options).await?;
        network.set_ledger_id(Some(name.ledger_id())).await;
        network.set_network(name.nodes()).await?;
        Ok(network)
    }

    /// The underlying pool, for the settings that do not involve address books.
    pub fn managed(&self) -> &ManagedNetwork<Node> {
        &self.managed
    }

    /// Replaces the nodes of the network with `network`, a map from `host:port` to node
    /// account. Nodes already present at the same address for the same account keep
    /// their health and channel.
    #[instrument(level = "debug", skip_all, fields(nodes = network.len()))]
    pub async fn set_network(
        &self,
        network: HashMap<String, AccountId>,
    ) -> Result<(), NetworkError> {
        let _binding = self.explicit_address_book.lock().await;
        let book = self.address_book();
        let nodes = network
            .into_iter()
            .map(|(url, account_id)| {
                let address = url.parse::<ManagedNodeAddress>()?;
                let entry = book
                    .as_ref()
                    .and_then(|book| book.get(&account_id))
                    .cloned();
                let managed = ManagedNode::new(address, DEFAULT_MIN_BACKOFF, DEFAULT_MAX_BACKOFF);
                Ok(Node::new(account_id, managed, entry, self.connector.clone()))
            })
            .collect::<Result<Vec<_>, NetworkError>>()?;
        self.managed.set_network(nodes).await;
        Ok(())
    }

    /// Returns the current nodes as a map from `host:port` to node account.
    pub async fn network(&self) -> HashMap<String, AccountId> {
        self.managed
            .nodes()
            .await
            .iter()
            .map(|node| (node.address().to_string(), node.account_id()))
            .collect()
    }

    /// Returns the first registered node of `account_id`.
    pub async fn node_for_account_id(&self, account_id: &AccountId) -> Option<Arc<Node>> {
        self.managed.node_for_key(account_id).await
    }

    /// Returns a random healthy node, or a random node when none is healthy.
    pub async fn node(&self) -> Option<Arc<Node>> {
        self.managed.node().await
    }

    /// Picks the accounts a transaction is sent to: distinct healthy nodes, at most
    /// [`ManagedNetwork::number_of_nodes_for_transaction`] of them. Fewer are returned
    /// when fewer are healthy.
    pub async fn node_account_ids_for_execute(&self) -> Vec<AccountId> {
        let count = self.managed.number_of_nodes_for_transaction().await;
        self.managed
            .number_of_most_healthy_nodes(count)
            .await
            .iter()
            .map(|node| node.account_id())
            .collect()
    }

    pub async fn increase_backoff(&self, node: &Node) {
        self.managed.increase_backoff(node).await;
    }

    pub fn decrease_backoff(&self, node: &Node) {
        self.managed.decrease_backoff(node);
    }

    pub async fn ledger_id(&self) -> Option<LedgerId> {
        self.managed.ledger_id().await
    }

    /// Sets the ledger the nodes belong to. With transport security on and no explicit
    /// book installed, the address book of a built-in ledger is installed and every
    /// node's entry refreshed.
    pub async fn set_ledger_id(&self, ledger_id: Option<LedgerId>) {
        let explicit = self.explicit_address_book.lock().await;
        self.managed.set_ledger_id(ledger_id).await;
        self.refresh_address_book(explicit.clone()).await;
    }

    pub async fn transport_security(&self) -> bool {
        self.managed.transport_security().await
    }

    /// Switches every node between its TLS and plaintext port. Address books only
    /// apply to TLS connections, so they are unbound when turning security off and bound
    /// again when turning it back on.
    pub async fn set_transport_security(&self, transport_security: bool) {
        let explicit = self.explicit_address_book.lock().await;
        self.managed.set_transport_security(transport_security).await;
        self.refresh_address_book(explicit.clone()).await;
    }

    pub async fn verify_certificate(&self) -> bool {
        self.managed.verify_certificate().await
    }

    pub async fn set_verify_certificate(&self, verify_certificate: bool) {
        self.managed.set_verify_certificate(verify_certificate).await;
    }

    /// The address book certificates are currently pinned against.
    pub fn address_book(&self) -> Option<Arc<AddressBook>> {
        self.address_book.read().clone()
    }

    /// Installs an address book explicitly, e.g. one fetched from the ledger, and
    /// refreshes every node's entry. It stays in force across later changes of the
    /// ledger id and of transport security.
    pub async fn set_address_book(&self, address_book: AddressBook) {
        let book = Arc::new(address_book);
        let mut explicit = self.explicit_address_book.lock().await;
        *explicit = Some(book.clone());
        self.install_address_book(Some(book)).await;
    }

    async fn refresh_address_book(&self, explicit: Option<Arc<AddressBook>>) {
        let book = if self.managed.transport_security().await {
            match explicit {
                Some(book) => Some(book),
                None => self
                    .managed
                    .ledger_id()
                    .await
                    .and_then(|ledger_id| self.address_books.for_ledger(&ledger_id)),
            }
        } else {
            None
        };
        self.install_address_book(book).await;
    }

    async fn install_address_book(&self, book: Option<Arc<AddressBook>>) {
        debug!(
            entries = book.as_ref().map_or(0, |book| book.len()),
            "installing address book"
        );
        *self.address_book.write() = book.clone();
        for node in self.managed.nodes().await {
            let entry = book
                .as_ref()
                .and_then(|book| book.get(&node.account_id()))
                .cloned();
            node.set_address_book(entry);
        }
    }

    /// Closes the channel of every node.
    pub async fn close(&self) {
        self.managed.close().await;
    }
}
