// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Core identifiers used by the ledger client.

use std::{fmt, num::ParseIntError, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[cfg(test)]
#[path = "unit_tests/identifiers_tests.rs"]
mod identifiers_tests;

/// The identifier of an account, written `shard.realm.num`.
///
/// Consensus nodes are addressed by the account that collects their fees, so the same
/// type identifies nodes in a network map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountId {
    /// The shard number.
    pub shard: u64,
    /// The realm number.
    pub realm: u64,
    /// The account number.
    pub num: u64,
}

/// An error that can occur when parsing an identifier.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseIdError {
    /// The identifier does not have exactly three dot-separated parts.
    #[error("expected an identifier of the form `shard.realm.num`, got `{0}`")]
    InvalidFormat(String),
    /// One of the parts is not an unsigned integer.
    #[error("invalid number in identifier `{id}`: {error}")]
    InvalidNumber {
        /// The identifier that failed to parse.
        id: String,
        /// The underlying integer parsing error.
        #[source]
        error: ParseIntError,
    },
}

impl AccountId {
    /// Creates an account identifier from its three components.
    pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
        AccountId { shard, realm, num }
    }

    /// Creates an account identifier in shard `0` and realm `0`.
    pub const fn from_num(num: u64) -> Self {
        AccountId::new(0, 0, num)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

impl FromStr for AccountId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s.split('.').collect::<Vec<_>>();
        let [shard, realm, num] = parts[..] else {
            return Err(ParseIdError::InvalidFormat(s.to_owned()));
        };
        let parse = |part: &str| {
            part.parse::<u64>()
                .map_err(|error| ParseIdError::InvalidNumber {
                    id: s.to_owned(),
                    error,
                })
        };
        Ok(AccountId {
            shard: parse(shard)?,
            realm: parse(realm)?,
            num: parse(num)?,
        })
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
