// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use ledger_base::time::Duration;
use thiserror::Error;
use tonic::{Code, Status};

/// Errors raised while managing nodes and their channels.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("invalid node address `{address}`: expected `host:port`")]
    InvalidNodeAddress { address: String },

    #[error("failed to dial node {address} within {timeout:?}")]
    ResourceExhausted { address: String, timeout: Duration },

    #[error("failed to confirm the certificate of node {address} from a known address book")]
    CertificateInvalid { address: String },

    #[error("failed to connect to node {address}: {error}")]
    Connection {
        address: String,
        #[source]
        error: tonic::transport::Error,
    },

    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("invalid RPC method path `{method}`")]
    InvalidMethod { method: String },

    #[error("remote call failed with status: {0}")]
    Status(Box<Status>),

    #[error("minimum backoff {min:?} exceeds maximum backoff {max:?}")]
    InvalidBackoff { min: Duration, max: Duration },

    #[error("minimum readmit period {min:?} exceeds maximum readmit period {max:?}")]
    InvalidReadmitPeriod { min: Duration, max: Duration },

    #[error("failed to parse address book: {0}")]
    AddressBook(#[from] serde_json::Error),

    #[error("failed to read address book: {0}")]
    AddressBookFile(#[source] std::io::Error),
}

impl From<Status> for NetworkError {
    fn from(status: Status) -> Self {
        NetworkError::Status(Box::new(status))
    }
}

impl From<NetworkError> for Status {
    fn from(error: NetworkError) -> Self {
        let code = match &error {
            NetworkError::Status(status) => return (**status).clone(),
            NetworkError::ResourceExhausted { .. } => Code::ResourceExhausted,
            NetworkError::CertificateInvalid { .. } => Code::Unauthenticated,
            NetworkError::Connection { .. } => Code::Unavailable,
            NetworkError::InvalidNodeAddress { .. }
            | NetworkError::InvalidMethod { .. }
            | NetworkError::InvalidBackoff { .. }
            | NetworkError::InvalidReadmitPeriod { .. }
            | NetworkError::AddressBook(_)
            | NetworkError::AddressBookFile(_) => Code::InvalidArgument,
            NetworkError::Tls(_) => Code::Internal,
        };
        Status::new(code, error.to_string())
    }
}
