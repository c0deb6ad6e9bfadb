// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Prometheus counters of the node pool.

use std::sync::LazyLock;

use ledger_base::prometheus_util::register_int_counter_vec;
use prometheus::IntCounterVec;

pub static DIALS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec("node_dials_total", "Number of channels dialed", &["host"])
});

pub static EVICTIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec(
        "node_evictions_total",
        "Number of times a node was excluded from the healthy set",
        &["node"],
    )
});

pub static READMISSIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec(
        "node_readmissions_total",
        "Number of times an excluded node was readmitted",
        &["node"],
    )
});
