// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::NetworkError;

#[cfg(test)]
#[path = "unit_tests/address_tests.rs"]
mod address_tests;

/// The plaintext gRPC port of consensus nodes.
pub const NODE_PORT_PLAINTEXT: u16 = 50211;
/// The TLS gRPC port of consensus nodes.
pub const NODE_PORT_TLS: u16 = 50212;
/// The plaintext gRPC port of mirror nodes.
pub const MIRROR_PORT_PLAINTEXT: u16 = 5600;
/// The TLS gRPC port of mirror nodes.
pub const MIRROR_PORT_TLS: u16 = 443;

/// The `host:port` address a managed node is reached at.
///
/// The port decides whether the channel uses transport security.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagedNodeAddress {
    host: String,
    port: u16,
}

impl ManagedNodeAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns whether connections to this address must be secured with TLS.
    pub fn is_transport_security(&self) -> bool {
        self.port == NODE_PORT_TLS || self.port == MIRROR_PORT_TLS
    }

    /// Returns the TLS counterpart of this address. Unknown ports are kept.
    pub fn to_secure(&self) -> Self {
        let port = match self.port {
            NODE_PORT_PLAINTEXT => NODE_PORT_TLS,
            MIRROR_PORT_PLAINTEXT => MIRROR_PORT_TLS,
            port => port,
        };
        Self::new(self.host.clone(), port)
    }

    /// Returns the plaintext counterpart of this address. Unknown ports are kept.
    pub fn to_insecure(&self) -> Self {
        let port = match self.port {
            NODE_PORT_TLS => NODE_PORT_PLAINTEXT,
            MIRROR_PORT_TLS => MIRROR_PORT_PLAINTEXT,
            port => port,
        };
        Self::new(self.host.clone(), port)
    }

    /// The URI handed to the gRPC transport. The scheme is always `http`: TLS, when
    /// needed, is layered by the connector itself.
    pub fn http_address(&self) -> String {
        format!("http://{}", self)
    }
}

impl fmt::Display for ManagedNodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for ManagedNodeAddress {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NetworkError::InvalidNodeAddress {
            address: s.to_owned(),
        };
        let (host, port) = s.rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse().map_err(|_| invalid())?;
        Ok(Self::new(host, port))
    }
}
