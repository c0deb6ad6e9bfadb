// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use assert_matches::assert_matches;
use ledger_base::identifiers::AccountId;
use test_case::test_case;

use super::{NetworkName, ParseNetworkNameError};

#[test_case("mainnet", NetworkName::Mainnet)]
#[test_case("testnet", NetworkName::Testnet)]
#[test_case("previewnet", NetworkName::Previewnet)]
fn test_parse_network_name(name: &str, expected: NetworkName) {
    assert_eq!(name.parse::<NetworkName>().unwrap(), expected);
    assert_eq!(expected.to_string(), name);
}

#[test]
fn test_unknown_network_name() {
    let error = "localnet".parse::<NetworkName>().unwrap_err();
    assert_matches!(&error, ParseNetworkNameError { .. });
    assert!(error.to_string().contains("`localnet`"));
}

#[test_case(NetworkName::Mainnet)]
#[test_case(NetworkName::Testnet)]
#[test_case(NetworkName::Previewnet)]
fn test_shipped_book_covers_every_node(network: NetworkName) {
    let book = network.address_book().unwrap();
    let nodes = network.nodes();
    assert_eq!(book.len(), nodes.len());
    for (url, account_id) in &nodes {
        let entry = book.get(account_id).unwrap();
        assert_eq!(entry.addresses[0].to_string(), *url);
        assert_eq!(entry.node_id, account_id.num as i64 - 3);
    }
    assert!(book.get(&AccountId::from_num(3)).is_some());
}
