// Copyright (c) The Rollup Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Gas and fee resolution.
//!
//! Every field resolves independently with the precedence
//! explicit override > value already on the candidate transaction > live
//! market estimate. Estimation failures degrade to context defaults; a
//! quote as a whole is `None` only when market data is needed and
//! unavailable. Estimation never mutates chain state.

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::U256;
use tracing::debug;

use rollup_bridge_types::{DepositRoute, FeeOverrides, FeeSummary};

use crate::cache::TtlCell;
use crate::chain::{ChainClient, FeeData};
use crate::metrics::BridgeMetrics;

/// Fixed buffer applied to raw gas estimates, in percent.
pub const ESTIMATE_GAS_BUFFER_PCT: u64 = 20;

/// How long market fee data stays fresh between RPC fetches.
pub const FEE_CACHE_SECS: u64 = 5;

// Overhead model for L1 -> L2 execution gas: the settlement transaction
// commits to an execution-gas budget before the execution chain runs it,
// so the estimate must be conservative.
const L2_TX_SLOT_OVERHEAD_GAS: u64 = 10_000;
const L2_MEMORY_OVERHEAD_GAS_PER_BYTE: u64 = 10;
const L2_GAS_PER_PUBDATA_BYTE: u64 = 800;

/// Apply the fixed estimate buffer, rounding down via integer division.
pub fn buffered_gas_limit(raw: U256) -> U256 {
    raw * U256::from(100 + ESTIMATE_GAS_BUFFER_PCT) / U256::from(100)
}

fn route_base_execution_gas(route: DepositRoute) -> u64 {
    match route {
        DepositRoute::NativeBase => 100_000,
        DepositRoute::TokenBase => 300_000,
        DepositRoute::TokenNonBase => 400_000,
    }
}

fn route_pubdata_bytes(route: DepositRoute) -> u64 {
    match route {
        DepositRoute::NativeBase => 64,
        DepositRoute::TokenBase => 128,
        DepositRoute::TokenNonBase => 192,
    }
}

/// Per-route clamp band for the modeled execution-gas budget.
pub fn route_gas_band(route: DepositRoute) -> (u64, u64) {
    match route {
        DepositRoute::NativeBase => (200_000, 1_000_000),
        DepositRoute::TokenBase => (300_000, 1_500_000),
        DepositRoute::TokenNonBase => (500_000, 2_500_000),
    }
}

/// Model the execution-gas budget an L1 -> L2 request must commit to:
/// per-route base cost, plus transaction-slot overhead, plus memory
/// overhead scaled by the approximate ABI-encoded size, plus pubdata
/// overhead scaled by the per-route byte estimate. Buffered, then clamped
/// into the route band.
pub fn estimate_l2_execution_gas(route: DepositRoute, encoded_len: usize) -> U256 {
    let raw = route_base_execution_gas(route)
        + L2_TX_SLOT_OVERHEAD_GAS
        + L2_MEMORY_OVERHEAD_GAS_PER_BYTE * encoded_len as u64
        + L2_GAS_PER_PUBDATA_BYTE * route_pubdata_bytes(route);
    let buffered = buffered_gas_limit(U256::from(raw));
    let (min, max) = route_gas_band(route);
    buffered
        .max(U256::from(min))
        .min(U256::from(max))
}

// Fee fields already present on a candidate transaction.
fn tx_fee_fields(tx: &TypedTransaction) -> (Option<U256>, Option<U256>) {
    match tx {
        TypedTransaction::Eip1559(inner) => (inner.max_fee_per_gas, inner.max_priority_fee_per_gas),
        _ => (tx.gas_price(), None),
    }
}

async fn market_fee_data<C: ChainClient + ?Sized>(
    client: &C,
    fee_cache: &TtlCell<FeeData>,
) -> Option<FeeData> {
    if let Some(cached) = fee_cache.get_if_valid().await {
        return Some(cached);
    }
    match client.fee_data().await {
        Ok(data) => {
            fee_cache.update(data).await;
            Some(data)
        }
        Err(e) => {
            debug!("fee data lookup failed, quote degrades to unavailable: {e}");
            None
        }
    }
}

/// Resolve the full fee summary for a candidate transaction.
///
/// Returns `None` ("unavailable") only when market data was required for
/// some field and could not be fetched; gas-limit estimation failures
/// degrade to `default_gas_limit` instead.
pub async fn resolve_fee_summary<C: ChainClient + ?Sized>(
    client: &C,
    fee_cache: &TtlCell<FeeData>,
    metrics: &BridgeMetrics,
    tx: &TypedTransaction,
    overrides: Option<&FeeOverrides>,
    default_gas_limit: U256,
) -> Option<FeeSummary> {
    let overrides = overrides.cloned().unwrap_or_default();

    let gas_limit = match overrides.gas_limit.or_else(|| tx.gas().copied()) {
        Some(explicit) => explicit,
        None => match client.estimate_gas(tx).await {
            Ok(raw) => buffered_gas_limit(raw),
            Err(e) => {
                debug!("gas estimation failed, using default {default_gas_limit}: {e}");
                metrics.gas_estimate_fallbacks.inc();
                default_gas_limit
            }
        },
    };

    let (tx_max_fee, tx_priority_fee) = tx_fee_fields(tx);
    let mut max_fee_per_gas = overrides.max_fee_per_gas.or(tx_max_fee);
    let mut max_priority_fee_per_gas = overrides.max_priority_fee_per_gas.or(tx_priority_fee);

    if max_fee_per_gas.is_none() || max_priority_fee_per_gas.is_none() {
        let market = market_fee_data(client, fee_cache).await?;
        max_fee_per_gas = max_fee_per_gas.or(Some(market.max_fee_per_gas));
        max_priority_fee_per_gas =
            max_priority_fee_per_gas.or(Some(market.max_priority_fee_per_gas));
    }

    let max_fee_per_gas = max_fee_per_gas?;
    let max_priority_fee_per_gas = max_priority_fee_per_gas?;

    Some(FeeSummary {
        gas_limit,
        max_fee_per_gas,
        max_priority_fee_per_gas,
        max_cost: gas_limit * max_fee_per_gas,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::{Address, Eip1559TransactionRequest};

    use crate::mock_client::MockChainClient;

    fn candidate() -> TypedTransaction {
        TypedTransaction::Eip1559(Eip1559TransactionRequest::new().to(Address::repeat_byte(1)))
    }

    fn fee_cache() -> TtlCell<FeeData> {
        TtlCell::with_secs(FEE_CACHE_SECS)
    }

    #[tokio::test]
    async fn test_override_wins_over_tx_and_market() {
        let client = MockChainClient::new();
        client.set_fee_data(FeeData {
            max_fee_per_gas: U256::from(30),
            max_priority_fee_per_gas: U256::from(3),
        });
        client.set_estimated_gas(U256::from(100_000));

        let mut tx = candidate();
        tx.set_gas(U256::from(70_000));
        if let TypedTransaction::Eip1559(inner) = &mut tx {
            inner.max_fee_per_gas = Some(U256::from(20));
            inner.max_priority_fee_per_gas = Some(U256::from(2));
        }

        let overrides = FeeOverrides {
            gas_limit: Some(U256::from(50_000)),
            max_fee_per_gas: Some(U256::from(10)),
            max_priority_fee_per_gas: Some(U256::from(1)),
        };
        let summary = resolve_fee_summary(
            &client,
            &fee_cache(),
            &BridgeMetrics::new_for_testing(),
            &tx,
            Some(&overrides),
            U256::from(1_000_000),
        )
        .await
        .unwrap();

        assert_eq!(summary.gas_limit, U256::from(50_000));
        assert_eq!(summary.max_fee_per_gas, U256::from(10));
        assert_eq!(summary.max_priority_fee_per_gas, U256::from(1));
        assert_eq!(summary.max_cost, U256::from(500_000));
    }

    #[tokio::test]
    async fn test_tx_field_wins_over_market() {
        let client = MockChainClient::new();
        client.set_fee_data(FeeData {
            max_fee_per_gas: U256::from(30),
            max_priority_fee_per_gas: U256::from(3),
        });

        let mut tx = candidate();
        tx.set_gas(U256::from(70_000));
        if let TypedTransaction::Eip1559(inner) = &mut tx {
            inner.max_fee_per_gas = Some(U256::from(20));
            inner.max_priority_fee_per_gas = Some(U256::from(2));
        }

        let summary = resolve_fee_summary(
            &client,
            &fee_cache(),
            &BridgeMetrics::new_for_testing(),
            &tx,
            None,
            U256::from(1_000_000),
        )
        .await
        .unwrap();

        assert_eq!(summary.gas_limit, U256::from(70_000));
        assert_eq!(summary.max_fee_per_gas, U256::from(20));
        assert_eq!(summary.max_priority_fee_per_gas, U256::from(2));
    }

    #[tokio::test]
    async fn test_market_estimate_is_buffered() {
        let client = MockChainClient::new();
        client.set_fee_data(FeeData {
            max_fee_per_gas: U256::from(30),
            max_priority_fee_per_gas: U256::from(3),
        });
        client.set_estimated_gas(U256::from(100_000));

        let summary = resolve_fee_summary(
            &client,
            &fee_cache(),
            &BridgeMetrics::new_for_testing(),
            &candidate(),
            None,
            U256::from(1_000_000),
        )
        .await
        .unwrap();

        // 100_000 * 120 / 100
        assert_eq!(summary.gas_limit, U256::from(120_000));
        assert_eq!(summary.max_fee_per_gas, U256::from(30));
    }

    #[tokio::test]
    async fn test_estimation_failure_degrades_to_default() {
        let client = MockChainClient::new();
        client.set_fee_data(FeeData {
            max_fee_per_gas: U256::from(30),
            max_priority_fee_per_gas: U256::from(3),
        });
        client.fail_estimate_gas("node refused");

        let metrics = BridgeMetrics::new_for_testing();
        let summary = resolve_fee_summary(
            &client,
            &fee_cache(),
            &metrics,
            &candidate(),
            None,
            U256::from(800_000),
        )
        .await
        .unwrap();

        assert_eq!(summary.gas_limit, U256::from(800_000));
        assert_eq!(metrics.gas_estimate_fallbacks.get(), 1);
    }

    #[tokio::test]
    async fn test_market_failure_makes_quote_unavailable() {
        let client = MockChainClient::new();
        client.set_estimated_gas(U256::from(100_000));
        client.fail_fee_data("no fee history");

        let summary = resolve_fee_summary(
            &client,
            &fee_cache(),
            &BridgeMetrics::new_for_testing(),
            &candidate(),
            None,
            U256::from(800_000),
        )
        .await;
        assert!(summary.is_none());
    }

    #[tokio::test]
    async fn test_fee_cache_avoids_second_fetch() {
        let client = MockChainClient::new();
        client.set_fee_data(FeeData {
            max_fee_per_gas: U256::from(30),
            max_priority_fee_per_gas: U256::from(3),
        });
        client.set_estimated_gas(U256::from(100_000));

        let cache = fee_cache();
        let metrics = BridgeMetrics::new_for_testing();
        let _ = resolve_fee_summary(&client, &cache, &metrics, &candidate(), None, U256::one())
            .await
            .unwrap();
        let _ = resolve_fee_summary(&client, &cache, &metrics, &candidate(), None, U256::one())
            .await
            .unwrap();
        assert_eq!(client.fee_data_calls(), 1);
    }

    #[test]
    fn test_buffer_rounds_down() {
        assert_eq!(buffered_gas_limit(U256::from(100)), U256::from(120));
        // 99 * 120 / 100 = 118.8, integer division rounds down
        assert_eq!(buffered_gas_limit(U256::from(99)), U256::from(118));
        assert_eq!(buffered_gas_limit(U256::zero()), U256::zero());
    }

    #[test]
    fn test_l2_execution_gas_clamps_into_band() {
        for route in [
            DepositRoute::NativeBase,
            DepositRoute::TokenBase,
            DepositRoute::TokenNonBase,
        ] {
            let (min, max) = route_gas_band(route);
            let small = estimate_l2_execution_gas(route, 0);
            let huge = estimate_l2_execution_gas(route, 10_000_000);
            assert!(small >= U256::from(min), "{route}: {small} < {min}");
            assert!(huge <= U256::from(max), "{route}: {huge} > {max}");
        }
    }

    #[test]
    fn test_l2_execution_gas_grows_with_encoded_size() {
        let a = estimate_l2_execution_gas(DepositRoute::TokenNonBase, 100);
        let b = estimate_l2_execution_gas(DepositRoute::TokenNonBase, 10_000);
        assert!(b > a);
    }
}
