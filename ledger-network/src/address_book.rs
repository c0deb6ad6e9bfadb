// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Address books: the ledger-published directory of nodes, their endpoints and the
//! hashes of their TLS certificates.

use std::{
    collections::BTreeMap,
    fmt,
    net::Ipv4Addr,
    path::Path,
    str::FromStr,
    sync::{Arc, LazyLock},
};

use ledger_base::{identifiers::AccountId, ledger_id::LedgerId};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::{address::NODE_PORT_PLAINTEXT, presets::NetworkName, NetworkError};

#[cfg(test)]
#[path = "unit_tests/address_book_tests.rs"]
mod address_book_tests;

/// The port older address books advertise for the plaintext service.
const LEGACY_NODE_PORT: i32 = 50111;

/// One service endpoint of a node: either a raw IPv4 address or a domain name, and a
/// port.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawEndpoint")]
pub struct Endpoint {
    address: Option<Vec<u8>>,
    port: i32,
    domain_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEndpoint {
    address: Option<Vec<u8>>,
    #[serde(default)]
    port: i32,
    #[serde(default)]
    domain_name: String,
}

impl From<RawEndpoint> for Endpoint {
    fn from(raw: RawEndpoint) -> Self {
        Endpoint::new(raw.address, raw.port, raw.domain_name)
    }
}

impl Endpoint {
    /// Creates an endpoint. A zero or legacy port is normalized to the plaintext node
    /// port.
    pub fn new(address: Option<Vec<u8>>, port: i32, domain_name: impl Into<String>) -> Self {
        let port = match port {
            0 | LEGACY_NODE_PORT => i32::from(NODE_PORT_PLAINTEXT),
            port => port,
        };
        Self {
            address,
            port,
            domain_name: domain_name.into(),
        }
    }

    pub fn address(&self) -> Option<&[u8]> {
        self.address.as_deref()
    }

    pub fn port(&self) -> i32 {
        self.port
    }

    pub fn domain_name(&self) -> &str {
        &self.domain_name
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.domain_name.is_empty() {
            return write!(f, "{}:{}", self.domain_name, self.port);
        }
        match self.address.as_deref() {
            Some([a, b, c, d]) => write!(f, "{a}.{b}.{c}.{d}:{}", self.port),
            _ => write!(f, ":{}", self.port),
        }
    }
}

impl FromStr for Endpoint {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NetworkError::InvalidNodeAddress {
            address: s.to_owned(),
        };
        let (host, port) = s.rsplit_once(':').ok_or_else(invalid)?;
        let port = port.parse::<i32>().map_err(|_| invalid())?;
        Ok(match host.parse::<Ipv4Addr>() {
            Ok(ip) => Endpoint::new(Some(ip.octets().to_vec()), port, ""),
            Err(_) if !host.is_empty() => Endpoint::new(None, port, host),
            Err(_) => return Err(invalid()),
        })
    }
}

/// One entry of an address book.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAddress {
    /// The node's public key, hex encoded.
    #[serde(default)]
    pub public_key: String,
    /// The account of the node, when known.
    pub account_id: Option<AccountId>,
    #[serde(default)]
    pub node_id: i64,
    /// SHA-384 digest of the PEM encoding of the node's TLS certificate. Empty when the
    /// certificate is not pinned.
    #[serde(default, with = "hex_bytes")]
    pub cert_hash: Vec<u8>,
    #[serde(default)]
    pub addresses: Vec<Endpoint>,
    #[serde(default)]
    pub description: String,
}

impl NodeAddress {
    /// Returns the pinned certificate hash, if this entry has one.
    pub fn pinned_cert_hash(&self) -> Option<&[u8]> {
        (!self.cert_hash.is_empty()).then_some(self.cert_hash.as_slice())
    }
}

/// A read-only map from node account to address book entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddressBook {
    entries: BTreeMap<AccountId, NodeAddress>,
}

impl AddressBook {
    /// Parses an address book from a JSON array of entries. Entries without an account
    /// are skipped, since nodes are looked up by account.
    pub fn from_json(json: &str) -> Result<Self, NetworkError> {
        let entries = serde_json::from_str::<Vec<NodeAddress>>(json)?;
        Ok(entries.into_iter().collect())
    }

    /// Reads an address book from a JSON file, such as a saved copy of the published one.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, NetworkError> {
        let json = fs_err::read_to_string(path.as_ref()).map_err(NetworkError::AddressBookFile)?;
        Self::from_json(&json)
    }

    pub fn get(&self, account_id: &AccountId) -> Option<&NodeAddress> {
        self.entries.get(account_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AccountId, &NodeAddress)> {
        self.entries.iter()
    }
}

impl FromIterator<NodeAddress> for AddressBook {
    fn from_iter<T: IntoIterator<Item = NodeAddress>>(iter: T) -> Self {
        let mut entries = BTreeMap::new();
        for entry in iter {
            match entry.account_id {
                Some(account_id) => {
                    entries.insert(account_id, entry);
                }
                None => warn!(node_id = entry.node_id, "skipping address book entry without account"),
            }
        }
        Self { entries }
    }
}

/// The address books of the public networks.
///
/// A [`Network`][`crate::Network`] receives its books at construction, so tests can
/// substitute synthetic ones.
#[derive(Clone, Debug, Default)]
pub struct AddressBooks {
    mainnet: Option<Arc<AddressBook>>,
    testnet: Option<Arc<AddressBook>>,
    previewnet: Option<Arc<AddressBook>>,
}

static BUILTIN_ADDRESS_BOOKS: LazyLock<AddressBooks> = LazyLock::new(|| AddressBooks {
    mainnet: builtin_book(NetworkName::Mainnet),
    testnet: builtin_book(NetworkName::Testnet),
    previewnet: builtin_book(NetworkName::Previewnet),
});

fn builtin_book(network: NetworkName) -> Option<Arc<AddressBook>> {
    match network.address_book() {
        Ok(book) => Some(Arc::new(book)),
        Err(error) => {
            error!(%network, %error, "built-in address book is invalid");
            None
        }
    }
}

impl AddressBooks {
    /// The process-wide books shipped with the crate.
    pub fn builtin() -> &'static AddressBooks {
        &BUILTIN_ADDRESS_BOOKS
    }

    /// Returns these books with the one for `network` replaced.
    pub fn with(mut self, network: NetworkName, book: AddressBook) -> Self {
        let slot = match network {
            NetworkName::Mainnet => &mut self.mainnet,
            NetworkName::Testnet => &mut self.testnet,
            NetworkName::Previewnet => &mut self.previewnet,
        };
        *slot = Some(Arc::new(book));
        self
    }

    /// Returns the book matching a ledger, or `None` for custom ledgers.
    pub fn for_ledger(&self, ledger_id: &LedgerId) -> Option<Arc<AddressBook>> {
        match ledger_id {
            LedgerId::Mainnet => self.mainnet.clone(),
            LedgerId::Testnet => self.testnet.clone(),
            LedgerId::Previewnet => self.previewnet.clone(),
            LedgerId::Other(_) => None,
        }
    }
}

mod hex_bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.trim_start_matches("0x")).map_err(de::Error::custom)
    }
}
