// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use ledger_base::time::Duration;
use test_case::test_case;
use tonic::{Code, Status};

use super::{is_retryable, TransportOptions};
use crate::NetworkError;

#[test_case(Code::Unavailable, true; "unavailable")]
#[test_case(Code::ResourceExhausted, true; "resource exhausted")]
#[test_case(Code::DeadlineExceeded, true; "deadline exceeded")]
#[test_case(Code::InvalidArgument, false; "invalid argument")]
#[test_case(Code::Unauthenticated, false; "unauthenticated")]
#[test_case(Code::Internal, false; "internal")]
fn test_is_retryable(code: Code, expected: bool) {
    assert_eq!(is_retryable(&Status::new(code, "test")), expected);
}

#[test]
fn test_dial_errors_map_to_status_codes() {
    let status = Status::from(NetworkError::ResourceExhausted {
        address: "a:50211".to_string(),
        timeout: Duration::from_secs(10),
    });
    assert_eq!(status.code(), Code::ResourceExhausted);
    assert!(is_retryable(&status));

    let status = Status::from(NetworkError::CertificateInvalid {
        address: "a:50212".to_string(),
    });
    assert_eq!(status.code(), Code::Unauthenticated);
    assert!(!is_retryable(&status));

    let status = Status::from(NetworkError::from(Status::not_found("missing")));
    assert_eq!(status.code(), Code::NotFound);
    assert_eq!(status.message(), "missing");
}

#[test]
fn test_default_transport_options() {
    let options = TransportOptions::default();
    assert_eq!(options.dial_timeout, Duration::from_secs(10));
    assert_eq!(options.keep_alive_interval, Duration::from_secs(60));
    assert_eq!(options.keep_alive_timeout, Duration::from_secs(20));
}
