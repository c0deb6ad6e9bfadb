// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Test doubles for the transport layer.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use ledger_base::time::{timer, Duration};
use tonic::transport::{Channel, Endpoint};

use crate::{
    address::ManagedNodeAddress,
    transport::{Connector, TlsPolicy, DEFAULT_DIAL_TIMEOUT},
    NetworkError,
};

/// A connector that never touches the network. It counts dials and returns lazy
/// channels, optionally after a delay.
#[derive(Debug)]
pub struct CountingConnector {
    dials: AtomicUsize,
    secure_dials: AtomicUsize,
    delay: Duration,
    dial_timeout: Duration,
}

impl Default for CountingConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl CountingConnector {
    pub fn new() -> Self {
        Self {
            dials: AtomicUsize::new(0),
            secure_dials: AtomicUsize::new(0),
            delay: Duration::ZERO,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
        }
    }

    /// Makes every dial take `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_dial_timeout(mut self, dial_timeout: Duration) -> Self {
        self.dial_timeout = dial_timeout;
        self
    }

    /// The number of dials so far.
    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    /// The number of dials that asked for TLS.
    pub fn secure_dials(&self) -> usize {
        self.secure_dials.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for CountingConnector {
    async fn connect(
        &self,
        address: &ManagedNodeAddress,
        tls: Option<TlsPolicy>,
    ) -> Result<Channel, NetworkError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        if tls.is_some() {
            self.secure_dials.fetch_add(1, Ordering::SeqCst);
        }
        if !self.delay.is_zero() {
            timer::sleep(self.delay).await;
        }
        let endpoint = Endpoint::from_shared(address.http_address()).map_err(|error| {
            NetworkError::Connection {
                address: address.to_string(),
                error,
            }
        })?;
        Ok(endpoint.connect_lazy())
    }

    fn dial_timeout(&self) -> Duration {
        self.dial_timeout
    }
}
