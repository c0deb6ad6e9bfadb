// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use test_case::test_case;

use super::LedgerId;

#[test_case("mainnet", LedgerId::Mainnet, &[0]; "mainnet")]
#[test_case("testnet", LedgerId::Testnet, &[1]; "testnet")]
#[test_case("previewnet", LedgerId::Previewnet, &[2]; "previewnet")]
#[test_case("0a0b", LedgerId::Other(vec![10, 11]), &[10, 11]; "custom")]
fn test_ledger_id_forms(text: &str, id: LedgerId, bytes: &[u8]) {
    assert_eq!(text.parse::<LedgerId>().unwrap(), id);
    assert_eq!(id.to_string(), text);
    assert_eq!(id.to_bytes(), bytes);
    assert_eq!(LedgerId::from_bytes(bytes), id);
}

#[test]
fn test_reserved_bytes_map_to_builtin_networks() {
    assert_eq!("01".parse::<LedgerId>().unwrap(), LedgerId::Testnet);
    assert!(LedgerId::from_bytes(&[2]).is_builtin());
    assert!(!LedgerId::from_bytes(&[3]).is_builtin());
}

#[test]
fn test_invalid_ledger_id() {
    let error = "devnet".parse::<LedgerId>().unwrap_err();
    assert!(error.to_string().contains("devnet"));
}

#[test]
fn test_ledger_id_serde() {
    let json = serde_json::to_string(&LedgerId::Previewnet).unwrap();
    assert_eq!(json, "\"previewnet\"");
    assert_eq!(
        serde_json::from_str::<LedgerId>(&json).unwrap(),
        LedgerId::Previewnet
    );
}
