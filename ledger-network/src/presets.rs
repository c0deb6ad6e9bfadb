// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Well-known public networks.

use std::{collections::HashMap, fmt, str::FromStr};

use ledger_base::{identifiers::AccountId, ledger_id::LedgerId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{address_book::AddressBook, NetworkError};

#[cfg(test)]
#[path = "unit_tests/presets_tests.rs"]
mod presets_tests;

const MAINNET_NODES: &[(&str, u64)] = &[
    ("35.237.200.180:50211", 3),
    ("35.186.191.247:50211", 4),
    ("35.192.2.25:50211", 5),
    ("35.199.161.108:50211", 6),
    ("35.203.82.240:50211", 7),
    ("35.236.5.219:50211", 8),
    ("35.197.192.225:50211", 9),
    ("35.242.233.154:50211", 10),
    ("35.240.118.96:50211", 11),
    ("35.204.86.32:50211", 12),
];

const TESTNET_NODES: &[(&str, u64)] = &[
    ("0.testnet.hedera.com:50211", 3),
    ("1.testnet.hedera.com:50211", 4),
    ("2.testnet.hedera.com:50211", 5),
    ("3.testnet.hedera.com:50211", 6),
];

const PREVIEWNET_NODES: &[(&str, u64)] = &[
    ("0.previewnet.hedera.com:50211", 3),
    ("1.previewnet.hedera.com:50211", 4),
    ("2.previewnet.hedera.com:50211", 5),
    ("3.previewnet.hedera.com:50211", 6),
];

/// The public networks a client can be configured for by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkName {
    Mainnet,
    Testnet,
    Previewnet,
}

impl NetworkName {
    fn node_table(self) -> &'static [(&'static str, u64)] {
        match self {
            NetworkName::Mainnet => MAINNET_NODES,
            NetworkName::Testnet => TESTNET_NODES,
            NetworkName::Previewnet => PREVIEWNET_NODES,
        }
    }

    /// The consensus nodes of this network, keyed by URL.
    pub fn nodes(self) -> HashMap<String, AccountId> {
        self.node_table()
            .iter()
            .map(|(url, num)| (url.to_string(), AccountId::from_num(*num)))
            .collect()
    }

    /// The mirror nodes of this network.
    pub fn mirror_nodes(self) -> Vec<String> {
        let host = match self {
            NetworkName::Mainnet => "mainnet-public.mirrornode.hedera.com:443",
            NetworkName::Testnet => "testnet.mirrornode.hedera.com:443",
            NetworkName::Previewnet => "previewnet.mirrornode.hedera.com:443",
        };
        vec![host.to_string()]
    }

    pub fn ledger_id(self) -> LedgerId {
        match self {
            NetworkName::Mainnet => LedgerId::Mainnet,
            NetworkName::Testnet => LedgerId::Testnet,
            NetworkName::Previewnet => LedgerId::Previewnet,
        }
    }

    /// The address book shipped with the crate for this network.
    ///
    /// Entries carry a certificate hash only where the published book provided one, and
    /// nodes without a hash are dialed without pinning.
    pub fn address_book(self) -> Result<AddressBook, NetworkError> {
        let json = match self {
            NetworkName::Mainnet => include_str!("../address_books/mainnet.json"),
            NetworkName::Testnet => include_str!("../address_books/testnet.json"),
            NetworkName::Previewnet => include_str!("../address_books/previewnet.json"),
        };
        AddressBook::from_json(json)
    }
}

impl fmt::Display for NetworkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NetworkName::Mainnet => "mainnet",
            NetworkName::Testnet => "testnet",
            NetworkName::Previewnet => "previewnet",
        };
        f.write_str(name)
    }
}

/// The name given is not one of the public networks.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown network name `{name}`: expected mainnet, testnet or previewnet")]
pub struct ParseNetworkNameError {
    name: String,
}

impl FromStr for NetworkName {
    type Err = ParseNetworkNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(NetworkName::Mainnet),
            "testnet" => Ok(NetworkName::Testnet),
            "previewnet" => Ok(NetworkName::Previewnet),
            other => Err(ParseNetworkNameError {
                name: other.to_owned(),
            }),
        }
    }
}
