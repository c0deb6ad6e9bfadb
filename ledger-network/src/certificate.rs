// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Certificate pinning against the address book.
//!
//! Nodes present self-signed certificates, so the usual chain validation does not
//! apply. Instead the SHA-384 digest of the PEM encoding of the offered certificate is
//! compared with the hash the address book publishes for the node.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ledger_base::identifiers::AccountId;
use rustls::{
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider, WebPkiSupportedAlgorithms},
    pki_types::{CertificateDer, ServerName, UnixTime},
    CertificateError, DigitallySignedStruct, SignatureScheme,
};
use sha2::{Digest as _, Sha384};
use tracing::warn;

#[cfg(test)]
#[path = "unit_tests/certificate_tests.rs"]
mod certificate_tests;

/// Returns the PEM encoding of a DER certificate, with 64-character lines.
pub fn certificate_pem(der: &[u8]) -> String {
    let encoded = BASE64.encode(der);
    let mut pem = String::with_capacity(encoded.len() + encoded.len() / 64 + 60);
    pem.push_str("-----BEGIN CERTIFICATE-----\n");
    for line in encoded.as_bytes().chunks(64) {
        pem.extend(line.iter().map(|byte| char::from(*byte)));
        pem.push('\n');
    }
    pem.push_str("-----END CERTIFICATE-----\n");
    pem
}

/// Returns the hash an address book pins for a DER certificate.
pub fn certificate_hash(der: &[u8]) -> Vec<u8> {
    Sha384::digest(certificate_pem(der).as_bytes()).to_vec()
}

/// The crypto provider used for every TLS connection made by this crate.
pub fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Accepts a node's certificate if its hash matches the pinned one.
///
/// Verification is skipped, with a warning, when no hash is pinned for the node, and
/// silently when certificate verification is disabled.
#[derive(Debug)]
pub struct PinnedCertificateVerifier {
    account_id: AccountId,
    cert_hash: Option<Vec<u8>>,
    verify_certificate: bool,
    algorithms: WebPkiSupportedAlgorithms,
    rejected: AtomicBool,
}

impl PinnedCertificateVerifier {
    pub fn new(
        account_id: AccountId,
        cert_hash: Option<Vec<u8>>,
        verify_certificate: bool,
        provider: &CryptoProvider,
    ) -> Self {
        Self {
            account_id,
            cert_hash,
            verify_certificate,
            algorithms: provider.signature_verification_algorithms,
            rejected: AtomicBool::new(false),
        }
    }

    /// Returns whether a handshake was refused because of a certificate mismatch.
    pub fn has_rejected(&self) -> bool {
        self.rejected.load(Ordering::Acquire)
    }

    fn check(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
    ) -> Result<(), rustls::Error> {
        let Some(expected) = self.cert_hash.as_deref() else {
            warn!(
                node = %self.account_id,
                "skipping certificate check since no cert hash was found"
            );
            return Ok(());
        };
        if !self.verify_certificate {
            return Ok(());
        }
        if std::iter::once(end_entity)
            .chain(intermediates)
            .any(|certificate| certificate_hash(certificate) == expected)
        {
            return Ok(());
        }
        self.rejected.store(true, Ordering::Release);
        Err(rustls::Error::InvalidCertificate(
            CertificateError::ApplicationVerificationFailure,
        ))
    }
}

impl ServerCertVerifier for PinnedCertificateVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        self.check(end_entity, intermediates)?;
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

/// Builds the client configuration used to reach a node whose certificate is pinned.
pub fn pinned_client_config(
    verifier: Arc<PinnedCertificateVerifier>,
) -> Result<rustls::ClientConfig, rustls::Error> {
    let mut config = rustls::ClientConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_no_client_auth();
    config.alpn_protocols = vec![b"h2".to_vec()];
    Ok(config)
}

/// Builds the client configuration used to reach servers with publicly trusted
/// certificates, such as mirror nodes.
pub fn webpki_client_config() -> Result<rustls::ClientConfig, rustls::Error> {
    let roots = rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let mut config = rustls::ClientConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = vec![b"h2".to_vec()];
    Ok(config)
}
