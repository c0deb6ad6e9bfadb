// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use assert_matches::assert_matches;
use ledger_base::identifiers::AccountId;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use sha2::{Digest as _, Sha384};
use test_case::test_case;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::{TlsAcceptor, TlsConnector};

use super::{
    certificate_hash, certificate_pem, crypto_provider, pinned_client_config,
    PinnedCertificateVerifier,
};
use crate::{
    address::ManagedNodeAddress,
    transport::{Connector as _, GrpcConnector, TlsPolicy},
    NetworkError,
};

#[derive(Clone, Copy, Debug)]
enum Pin {
    Matching,
    Mismatching,
    Missing,
}

struct TestServer {
    certificate: CertificateDer<'static>,
    address: std::net::SocketAddr,
}

/// Serves TLS handshakes with a fresh self-signed certificate until the test ends.
async fn start_server() -> anyhow::Result<TestServer> {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()])?;
    let certificate = cert.der().clone();
    let config = rustls::ServerConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(
            vec![certificate.clone()],
            PrivateKeyDer::Pkcs8(key_pair.serialize_der().into()),
        )?;
    let acceptor = TlsAcceptor::from(Arc::new(config));
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                // Clients may abort the handshake.
                let _ = acceptor.accept(stream).await;
            });
        }
    });
    Ok(TestServer {
        certificate,
        address,
    })
}

fn verifier(
    server: &TestServer,
    pin: Pin,
    verify_certificate: bool,
) -> Arc<PinnedCertificateVerifier> {
    let cert_hash = match pin {
        Pin::Matching => Some(certificate_hash(&server.certificate)),
        Pin::Mismatching => Some(vec![0; 48]),
        Pin::Missing => None,
    };
    Arc::new(PinnedCertificateVerifier::new(
        AccountId::from_num(3),
        cert_hash,
        verify_certificate,
        &crypto_provider(),
    ))
}

#[test]
fn test_pem_has_64_character_lines() {
    let pem = certificate_pem(&[7; 100]);
    let lines = pem.lines().collect::<Vec<_>>();
    assert_eq!(lines.first(), Some(&"-----BEGIN CERTIFICATE-----"));
    assert_eq!(lines.last(), Some(&"-----END CERTIFICATE-----"));
    let body = &lines[1..lines.len() - 1];
    assert_eq!(
        body.iter().map(|line| line.len()).collect::<Vec<_>>(),
        vec![64, 64, 8]
    );
    assert!(pem.ends_with("-----END CERTIFICATE-----\n"));
}

#[test]
fn test_hash_covers_pem_encoding() {
    let der = b"not really a certificate";
    let hash = certificate_hash(der);
    assert_eq!(hash.len(), 48);
    assert_eq!(hash, Sha384::digest(certificate_pem(der).as_bytes()).to_vec());
    assert_ne!(hash, Sha384::digest(der).to_vec());
}

#[test_case(Pin::Matching, true, true; "matching hash is accepted")]
#[test_case(Pin::Mismatching, true, false; "mismatching hash is rejected")]
#[test_case(Pin::Mismatching, false, true; "mismatch accepted without verification")]
#[test_case(Pin::Matching, false, true; "match accepted without verification")]
#[test_case(Pin::Missing, true, true; "missing hash skips verification")]
#[test_log::test(tokio::test)]
async fn test_pinned_handshake(pin: Pin, verify_certificate: bool, accepted: bool) -> anyhow::Result<()> {
    let server = start_server().await?;
    let verifier = verifier(&server, pin, verify_certificate);
    let connector = TlsConnector::from(Arc::new(pinned_client_config(verifier.clone())?));
    let tcp = TcpStream::connect(server.address).await?;
    let result = connector
        .connect(ServerName::try_from("localhost")?, tcp)
        .await;
    assert_eq!(result.is_ok(), accepted);
    assert_eq!(verifier.has_rejected(), !accepted);
    Ok(())
}

#[tokio::test]
async fn test_grpc_connector_reports_invalid_certificate() -> anyhow::Result<()> {
    let server = start_server().await?;
    let address = ManagedNodeAddress::new("127.0.0.1", server.address.port());
    let policy = TlsPolicy::Pinned(verifier(&server, Pin::Mismatching, true));
    let result = GrpcConnector::default().connect(&address, Some(policy)).await;
    assert_matches!(
        result,
        Err(NetworkError::CertificateInvalid { address: failed }) if failed == address.to_string()
    );
    Ok(())
}
