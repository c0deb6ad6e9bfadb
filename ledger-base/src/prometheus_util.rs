// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! This module defines util functions for interacting with Prometheus (logging metrics, etc)

use prometheus::{register_int_counter_vec, IntCounterVec, Opts};

const LEDGER_NAMESPACE: &str = "ledger";

/// Wrapper around Prometheus `register_int_counter_vec!` macro which also sets the `ledger`
/// namespace.
pub fn register_int_counter_vec(
    name: &str,
    description: &str,
    label_names: &[&str],
) -> IntCounterVec {
    let counter_opts = Opts::new(name, description).namespace(LEDGER_NAMESPACE);
    register_int_counter_vec!(counter_opts, label_names).expect("IntCounter can be created")
}
