// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::io::Write as _;

use assert_matches::assert_matches;
use ledger_base::{identifiers::AccountId, ledger_id::LedgerId};
use test_case::test_case;

use super::{AddressBook, AddressBooks, Endpoint, NodeAddress};
use crate::{presets::NetworkName, NetworkError};

const BOOK: &str = r#"[
    {
        "publicKey": "308201a2",
        "accountId": "0.0.3",
        "nodeId": 0,
        "certHash": "aa00bb",
        "addresses": [{ "address": [35, 237, 200, 180], "port": 50211 }],
        "description": "first"
    },
    {
        "accountId": "0.0.4",
        "nodeId": 1,
        "addresses": [{ "port": 0, "domainName": "node1.example.com" }]
    },
    {
        "nodeId": 2,
        "certHash": "0x01"
    }
]"#;

#[test_case(0, 50211; "zero port")]
#[test_case(50111, 50211; "legacy port")]
#[test_case(50212, 50212; "tls port")]
fn test_endpoint_port_normalization(port: i32, expected: i32) {
    assert_eq!(Endpoint::new(None, port, "node").port(), expected);
}

#[test]
fn test_endpoint_prefers_domain_name() {
    let endpoint = Endpoint::new(Some(vec![10, 0, 0, 1]), 50211, "node.example.com");
    assert_eq!(endpoint.to_string(), "node.example.com:50211");
    let endpoint = Endpoint::new(Some(vec![10, 0, 0, 1]), 50211, "");
    assert_eq!(endpoint.to_string(), "10.0.0.1:50211");
}

#[test]
fn test_parse_endpoint() {
    let endpoint = "35.237.200.180:50211".parse::<Endpoint>().unwrap();
    assert_eq!(endpoint.address(), Some(&[35, 237, 200, 180][..]));
    assert_eq!(endpoint.domain_name(), "");

    let endpoint = "0.testnet.hedera.com:50111".parse::<Endpoint>().unwrap();
    assert_eq!(endpoint.address(), None);
    assert_eq!(endpoint.domain_name(), "0.testnet.hedera.com");
    assert_eq!(endpoint.port(), 50211);

    assert_matches!(
        ":50211".parse::<Endpoint>(),
        Err(NetworkError::InvalidNodeAddress { .. })
    );
}

#[test]
fn test_address_book_from_json() {
    let book = AddressBook::from_json(BOOK).unwrap();
    // The entry without an account cannot be looked up and is dropped.
    assert_eq!(book.len(), 2);

    let first = book.get(&AccountId::from_num(3)).unwrap();
    assert_eq!(first.pinned_cert_hash(), Some(&[0xaa, 0x00, 0xbb][..]));
    assert_eq!(first.addresses[0].to_string(), "35.237.200.180:50211");
    assert_eq!(first.description, "first");

    let second = book.get(&AccountId::from_num(4)).unwrap();
    assert_eq!(second.pinned_cert_hash(), None);
    assert_eq!(second.addresses[0].to_string(), "node1.example.com:50211");
}

#[test]
fn test_address_book_with_bad_json() {
    assert_matches!(
        AddressBook::from_json(r#"[{ "accountId": "zero" }]"#),
        Err(NetworkError::AddressBook(_))
    );
}

#[test]
fn test_cert_hash_serializes_as_hex() {
    let entry = NodeAddress {
        account_id: Some(AccountId::from_num(3)),
        cert_hash: vec![0xde, 0xad],
        ..NodeAddress::default()
    };
    let json = serde_json::to_value(&entry).unwrap();
    assert_eq!(json["certHash"], "dead");
    assert_eq!(json["accountId"], "0.0.3");
}

#[test]
fn test_builtin_books_match_ledgers() {
    let books = AddressBooks::builtin();
    let mainnet = books.for_ledger(&LedgerId::Mainnet).unwrap();
    assert_eq!(mainnet.len(), NetworkName::Mainnet.nodes().len());
    assert_eq!(
        mainnet.get(&AccountId::from_num(3)).unwrap().addresses[0].to_string(),
        "35.237.200.180:50211"
    );
    assert_eq!(
        books.for_ledger(&LedgerId::Testnet).unwrap().len(),
        NetworkName::Testnet.nodes().len()
    );
    assert!(books.for_ledger(&LedgerId::Other(vec![9])).is_none());
}

#[test]
fn test_replace_builtin_book() {
    let book = AddressBook::from_json(BOOK).unwrap();
    let books = AddressBooks::default().with(NetworkName::Previewnet, book.clone());
    assert_eq!(*books.for_ledger(&LedgerId::Previewnet).unwrap(), book);
    assert!(books.for_ledger(&LedgerId::Mainnet).is_none());
}

#[test]
fn test_address_book_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(BOOK.as_bytes()).unwrap();
    let book = AddressBook::from_file(file.path()).unwrap();
    assert_eq!(book, AddressBook::from_json(BOOK).unwrap());

    assert_matches!(
        AddressBook::from_file(file.path().with_extension("missing")),
        Err(NetworkError::AddressBookFile(_))
    );
}
