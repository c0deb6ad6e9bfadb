// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Dialing gRPC channels to nodes.

use std::{fmt, io, sync::Arc};

use async_trait::async_trait;
use bytes::{Buf as _, BufMut as _, Bytes};
use hyper_util::rt::TokioIo;
use ledger_base::time::{timer, Duration};
use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tonic::{
    codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder},
    transport::{Channel, Endpoint, Uri},
    Code, Status,
};
use tracing::{debug, info, warn};

use crate::{
    address::ManagedNodeAddress,
    certificate::{pinned_client_config, webpki_client_config, PinnedCertificateVerifier},
    NetworkError,
};

#[cfg(test)]
#[path = "unit_tests/transport_tests.rs"]
mod transport_tests;

/// The time allowed to establish a channel.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);
/// The interval between HTTP/2 keep-alive pings.
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(60);
/// The time to wait for a keep-alive ping to be acknowledged.
pub const DEFAULT_KEEP_ALIVE_TIMEOUT: Duration = Duration::from_secs(20);

/// Options applied to every channel a [`GrpcConnector`] dials.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransportOptions {
    pub dial_timeout: Duration,
    pub keep_alive_interval: Duration,
    pub keep_alive_timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
            keep_alive_timeout: DEFAULT_KEEP_ALIVE_TIMEOUT,
        }
    }
}

/// How the TLS peer is authenticated.
#[derive(Clone, Debug)]
pub enum TlsPolicy {
    /// Consensus nodes: the certificate hash is pinned by the address book.
    Pinned(Arc<PinnedCertificateVerifier>),
    /// Mirror nodes: regular validation against the WebPKI roots.
    WebPki,
}

/// Something that can open a channel to a node.
#[async_trait]
pub trait Connector: fmt::Debug + Send + Sync {
    /// Dials `address`, securing the connection with `tls` when given.
    async fn connect(
        &self,
        address: &ManagedNodeAddress,
        tls: Option<TlsPolicy>,
    ) -> Result<Channel, NetworkError>;

    /// The time after which a dial is abandoned.
    fn dial_timeout(&self) -> Duration {
        DEFAULT_DIAL_TIMEOUT
    }
}

/// The production connector, over TCP and optionally `rustls`.
#[derive(Clone, Debug, Default)]
pub struct GrpcConnector {
    options: TransportOptions,
}

impl GrpcConnector {
    pub fn new(options: TransportOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TransportOptions {
        &self.options
    }

    fn endpoint(&self, address: &ManagedNodeAddress) -> Result<Endpoint, NetworkError> {
        let endpoint = Endpoint::from_shared(address.http_address()).map_err(|error| {
            NetworkError::Connection {
                address: address.to_string(),
                error,
            }
        })?;
        Ok(endpoint
            .http2_keep_alive_interval(self.options.keep_alive_interval)
            .keep_alive_timeout(self.options.keep_alive_timeout)
            .tcp_keepalive(Some(self.options.keep_alive_interval))
            .keep_alive_while_idle(true))
    }
}

#[async_trait]
impl Connector for GrpcConnector {
    async fn connect(
        &self,
        address: &ManagedNodeAddress,
        tls: Option<TlsPolicy>,
    ) -> Result<Channel, NetworkError> {
        #[cfg(with_metrics)]
        crate::metrics::DIALS.with_label_values(&[address.host()]).inc();

        let endpoint = self.endpoint(address)?;
        let (connection, verifier) = match tls {
            None => {
                debug!(%address, "dialing node");
                (endpoint.connect().await, None)
            }
            Some(policy) => {
                debug!(%address, "dialing node over TLS");
                let (config, verifier) = match policy {
                    TlsPolicy::Pinned(verifier) => {
                        (pinned_client_config(verifier.clone())?, Some(verifier))
                    }
                    TlsPolicy::WebPki => (webpki_client_config()?, None),
                };
                let connector = TlsConnector::from(Arc::new(config));
                let host = address.host().to_owned();
                let dial = tower::service_fn(move |uri: Uri| {
                    let connector = connector.clone();
                    let host = host.clone();
                    async move { tls_stream(connector, host, uri).await }
                });
                (endpoint.connect_with_connector(dial).await, verifier)
            }
        };
        connection.map_err(|error| {
            if verifier.is_some_and(|verifier| verifier.has_rejected()) {
                warn!(%address, "node certificate does not match the address book");
                return NetworkError::CertificateInvalid {
                    address: address.to_string(),
                };
            }
            NetworkError::Connection {
                address: address.to_string(),
                error,
            }
        })
    }

    fn dial_timeout(&self) -> Duration {
        self.options.dial_timeout
    }
}

async fn tls_stream(
    connector: TlsConnector,
    host: String,
    uri: Uri,
) -> io::Result<TokioIo<tokio_rustls::client::TlsStream<TcpStream>>> {
    let authority = uri
        .authority()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "missing authority"))?;
    let tcp = TcpStream::connect(authority.as_str()).await?;
    let server_name = ServerName::try_from(host)
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error))?;
    let stream = connector.connect(server_name, tcp).await?;
    Ok(TokioIo::new(stream))
}

/// Dials through `connector`, giving up after its dial timeout.
pub(crate) async fn dial_with_timeout(
    connector: &dyn Connector,
    address: &ManagedNodeAddress,
    tls: Option<TlsPolicy>,
) -> Result<Channel, NetworkError> {
    let timeout = connector.dial_timeout();
    match timer::timeout(timeout, connector.connect(address, tls)).await {
        Ok(result) => result,
        Err(_) => {
            info!(%address, ?timeout, "timed out dialing node");
            Err(NetworkError::ResourceExhausted {
                address: address.to_string(),
                timeout,
            })
        }
    }
}

/// Returns whether a request that failed with `status` may be retried on another node.
pub fn is_retryable(status: &Status) -> bool {
    match status.code() {
        Code::DeadlineExceeded
        | Code::Aborted
        | Code::Unavailable
        | Code::Unknown
        | Code::ResourceExhausted => true,
        Code::Ok
        | Code::Cancelled
        | Code::NotFound
        | Code::AlreadyExists
        | Code::InvalidArgument
        | Code::PermissionDenied
        | Code::FailedPrecondition
        | Code::OutOfRange
        | Code::Unimplemented
        | Code::Internal
        | Code::DataLoss
        | Code::Unauthenticated => false,
    }
}

/// A codec passing already-serialized messages through unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawCodec;

impl Codec for RawCodec {
    type Encode = Bytes;
    type Decode = Bytes;
    type Encoder = RawCodec;
    type Decoder = RawCodec;

    fn encoder(&mut self) -> Self::Encoder {
        RawCodec
    }

    fn decoder(&mut self) -> Self::Decoder {
        RawCodec
    }
}

impl Encoder for RawCodec {
    type Item = Bytes;
    type Error = Status;

    fn encode(&mut self, item: Bytes, dst: &mut EncodeBuf<'_>) -> Result<(), Status> {
        dst.put(item);
        Ok(())
    }
}

impl Decoder for RawCodec {
    type Item = Bytes;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Bytes>, Status> {
        Ok(Some(src.copy_to_bytes(src.remaining())))
    }
}
