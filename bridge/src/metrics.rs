// Copyright (c) The Rollup Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry, IntCounter,
    IntCounterVec, Registry,
};

#[derive(Clone, Debug)]
pub struct BridgeMetrics {
    /// Plan steps submitted, labelled by chain side.
    pub(crate) tx_submitted: IntCounterVec,
    pub(crate) tx_confirmed: IntCounterVec,
    pub(crate) tx_failed: IntCounterVec,
    /// RPC failures, labelled by chain side and error kind.
    pub(crate) rpc_errors: IntCounterVec,
    /// Gas estimations that degraded to a default value.
    pub(crate) gas_estimate_fallbacks: IntCounter,
    pub(crate) finalize_attempts: IntCounter,
    /// Finalize calls that were no-ops because the withdrawal was already
    /// finalized, possibly by another actor.
    pub(crate) finalize_already_finalized: IntCounter,
}

impl BridgeMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            tx_submitted: register_int_counter_vec_with_registry!(
                "bridge_tx_submitted",
                "Total number of plan steps submitted",
                &["side"],
                registry,
            )
            .unwrap(),
            tx_confirmed: register_int_counter_vec_with_registry!(
                "bridge_tx_confirmed",
                "Total number of plan steps confirmed with a success receipt",
                &["side"],
                registry,
            )
            .unwrap(),
            tx_failed: register_int_counter_vec_with_registry!(
                "bridge_tx_failed",
                "Total number of plan steps that reverted or failed to confirm",
                &["side"],
                registry,
            )
            .unwrap(),
            rpc_errors: register_int_counter_vec_with_registry!(
                "bridge_rpc_errors",
                "Total number of RPC failures",
                &["side", "kind"],
                registry,
            )
            .unwrap(),
            gas_estimate_fallbacks: register_int_counter_with_registry!(
                "bridge_gas_estimate_fallbacks",
                "Total number of gas estimations that degraded to a default",
                registry,
            )
            .unwrap(),
            finalize_attempts: register_int_counter_with_registry!(
                "bridge_finalize_attempts",
                "Total number of withdrawal finalize attempts",
                registry,
            )
            .unwrap(),
            finalize_already_finalized: register_int_counter_with_registry!(
                "bridge_finalize_already_finalized",
                "Total number of finalize calls skipped because the withdrawal was already finalized",
                registry,
            )
            .unwrap(),
        }
    }

    pub fn new_for_testing() -> Self {
        Self::new(&Registry::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_once() {
        let registry = Registry::new();
        let metrics = BridgeMetrics::new(&registry);
        metrics.tx_submitted.with_label_values(&["l1"]).inc();
        metrics.rpc_errors.with_label_values(&["l2", "rpc"]).inc();
        assert_eq!(metrics.tx_submitted.with_label_values(&["l1"]).get(), 1);
        assert_eq!(metrics.rpc_errors.with_label_values(&["l2", "rpc"]).get(), 1);
    }
}
