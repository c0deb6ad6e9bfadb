// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The identity of a ledger network.

use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[cfg(test)]
#[path = "unit_tests/ledger_id_tests.rs"]
mod ledger_id_tests;

/// Identifies which ledger a client talks to.
///
/// The three public networks have reserved one-byte identifiers; any other byte string
/// names a custom ledger.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LedgerId {
    /// The production network, `[0x00]`.
    Mainnet,
    /// The public test network, `[0x01]`.
    Testnet,
    /// The preview network, `[0x02]`.
    Previewnet,
    /// Any other ledger.
    Other(Vec<u8>),
}

/// An error that can occur when parsing a [`LedgerId`].
#[derive(Debug, Error)]
#[error("invalid ledger id `{input}`: expected a network name or hex bytes")]
pub struct ParseLedgerIdError {
    input: String,
    #[source]
    error: hex::FromHexError,
}

impl LedgerId {
    /// Builds a ledger id from its byte representation.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match bytes {
            [0] => LedgerId::Mainnet,
            [1] => LedgerId::Testnet,
            [2] => LedgerId::Previewnet,
            other => LedgerId::Other(other.to_vec()),
        }
    }

    /// Returns the byte representation of this ledger id.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            LedgerId::Mainnet => vec![0],
            LedgerId::Testnet => vec![1],
            LedgerId::Previewnet => vec![2],
            LedgerId::Other(bytes) => bytes.clone(),
        }
    }

    /// Returns whether this is one of the public networks with a built-in address book.
    pub fn is_builtin(&self) -> bool {
        !matches!(self, LedgerId::Other(_))
    }
}

impl fmt::Display for LedgerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerId::Mainnet => write!(f, "mainnet"),
            LedgerId::Testnet => write!(f, "testnet"),
            LedgerId::Previewnet => write!(f, "previewnet"),
            LedgerId::Other(bytes) => write!(f, "{}", hex::encode(bytes)),
        }
    }
}

impl FromStr for LedgerId {
    type Err = ParseLedgerIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(LedgerId::Mainnet),
            "testnet" => Ok(LedgerId::Testnet),
            "previewnet" => Ok(LedgerId::Previewnet),
            _ => hex::decode(s)
                .map(|bytes| LedgerId::from_bytes(&bytes))
                .map_err(|error| ParseLedgerIdError {
                    input: s.to_owned(),
                    error,
                }),
        }
    }
}

impl Serialize for LedgerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LedgerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
