// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! This module manages the nodes a ledger client talks to: their addresses, their
//! health, the selection of nodes for each request, and the secure channels to them.

pub mod address;
pub mod address_book;
pub mod certificate;
pub mod config;
mod error;
pub mod managed_network;
pub mod managed_node;
#[cfg(with_metrics)]
mod metrics;
pub mod mirror_network;
pub mod mirror_node;
pub mod network;
pub mod node;
pub mod presets;
#[cfg(with_testing)]
#[path = "unit_tests/test_utils.rs"]
pub mod test_utils;
pub mod transport;

pub use error::NetworkError;
pub use mirror_network::MirrorNetwork;
pub use network::Network;
