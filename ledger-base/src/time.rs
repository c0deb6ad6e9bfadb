// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Abstractions over time.

Instants come from the Tokio clock so that tests can pause and advance time.
 */

pub use std::time::Duration;

pub use tokio::time::{self as timer, Instant};
