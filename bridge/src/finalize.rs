// Copyright (c) The Rollup Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Withdrawal finalization: derive the cross-chain inclusion proof from
//! the source receipt, race "already finalized" against "simulate then
//! send", and dedupe submitted finalize transactions.

use std::time::Duration;

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{H256, U256};
use ethers::utils::id;
use once_cell::sync::Lazy;
use tap::TapFallible;
use tracing::{info, warn};

use rollup_bridge_types::base_types::cross_layer_messenger_address;
use rollup_bridge_types::{
    BridgeResult, ErrorCtx, ErrorKind, FinalizeOutcome, FinalizeProof, FinalizeReadiness,
    RevertInfo, WithdrawalKey, WithdrawalPhase, WithdrawalStatus,
};

use crate::cache::FinalizeHashCache;
use crate::chain::{ChainClient, ExecutionChainClient};
use crate::config::BridgeContracts;
use crate::encoding;
use crate::metrics::BridgeMetrics;
use crate::quote::buffered_gas_limit;
use crate::retry_with_max_elapsed_time;
use crate::wait::{wait_for_receipt, WaitOptions};

// Gas limit used when the finalize estimate is unavailable.
const DEFAULT_FINALIZE_GAS: u64 = 800_000;

const FINALIZE_RECEIPT_TIMEOUT_MS: u64 = 600_000;

// Bound on the post-failure registry re-check.
const RECHECK_MAX_ELAPSED: Duration = Duration::from_secs(15);

/// Derive the finalize proof from the source receipt. Idempotent: the
/// same receipt always yields byte-identical output.
///
/// Both historical message-log signatures are recognized. When several
/// candidate logs exist, the ones emitted by the canonical messenger win;
/// otherwise the first match by position is used.
pub async fn derive_finalize_proof(
    l2: &dyn ExecutionChainClient,
    chain_id: u64,
    l2_tx_hash: H256,
) -> BridgeResult<FinalizeProof> {
    let ctx = ErrorCtx::new("withdrawals", "finalize_proof");
    let cross = l2
        .cross_layer_receipt(l2_tx_hash)
        .await?
        .ok_or_else(|| {
            ctx.state("source receipt not yet available")
                .with_context("tx_hash", format!("{l2_tx_hash:?}"))
        })?;
    if cross.receipt.status == Some(0u64.into()) {
        return Err(ctx
            .execution("origin transaction reverted")
            .with_context("tx_hash", format!("{l2_tx_hash:?}")));
    }

    let messenger = cross_layer_messenger_address();
    let message_logs: Vec<_> = cross
        .receipt
        .logs
        .iter()
        .enumerate()
        .filter(|(_, log)| encoding::is_message_sent_log(log))
        .collect();
    let chosen = message_logs
        .iter()
        .find(|(_, log)| log.address == messenger)
        .or_else(|| message_logs.first())
        .copied()
        .ok_or_else(|| {
            ctx.verification("no cross-layer message log in receipt")
                .with_context("tx_hash", format!("{l2_tx_hash:?}"))
        })?;
    // Proof lookup is indexed by the message's position among the
    // receipt's message logs, not its raw log index.
    let message_index_in_tx = message_logs
        .iter()
        .position(|(raw, _)| *raw == chosen.0)
        .unwrap_or_default() as u64;

    let (sender, message) = encoding::decode_message_sent(chosen.1)
        .ok_or_else(|| ctx.internal("message log did not decode"))?;

    let batch_number = cross
        .batch_number
        .ok_or_else(|| ctx.state("transaction not yet assigned to a batch"))?;
    let tx_index_in_batch = cross
        .batch_tx_index
        .ok_or_else(|| ctx.state("transaction batch index not yet available"))?;

    let proof = l2
        .cross_layer_log_proof(l2_tx_hash, message_index_in_tx)
        .await?
        .ok_or_else(|| {
            ctx.state("inclusion proof not yet available")
                .with_context("tx_hash", format!("{l2_tx_hash:?}"))
                .with_context("batch_number", batch_number)
        })?;

    Ok(FinalizeProof {
        chain_id,
        batch_number: batch_number.as_u64(),
        message_index: proof.id,
        sender,
        tx_index_in_batch: tx_index_in_batch.as_u64() as u16,
        message,
        merkle_proof: proof.proof,
    })
}

static NOT_READY_SELECTORS: Lazy<Vec<[u8; 4]>> = Lazy::new(|| {
    ["BatchNotExecuted()", "MerkleRootMissing()", "BridgePaused()"]
        .iter()
        .map(|sig| id(sig))
        .collect()
});

static UNFINALIZABLE_SELECTORS: Lazy<Vec<[u8; 4]>> = Lazy::new(|| {
    [
        "InvalidMessage()",
        "InvalidProof()",
        "WrongChain()",
        "UnsupportedSettlementLayer()",
    ]
    .iter()
    .map(|sig| id(sig))
    .collect()
});

const NOT_READY_REASONS: &[&str] = &[
    "paused",
    "batch not executed",
    "not yet executed",
    "root not posted",
    "root not set",
];

const UNFINALIZABLE_REASONS: &[&str] = &[
    "invalid message",
    "invalid proof",
    "invalid merkle",
    "wrong chain",
    "unsupported",
];

/// Classify a finalize readiness-simulation revert, table-driven over the
/// known selectors and reasons, with an explicit `Unknown` fallback.
pub fn classify_finalize_revert(revert: &RevertInfo) -> FinalizeReadiness {
    if let Some(reason) = &revert.reason {
        let lowered = reason.to_lowercase();
        if NOT_READY_REASONS.iter().any(|p| lowered.contains(p)) {
            return FinalizeReadiness::NotReady(reason.clone());
        }
        if UNFINALIZABLE_REASONS.iter().any(|p| lowered.contains(p)) {
            return FinalizeReadiness::Unfinalizable(reason.clone());
        }
    }
    if let Some(selector) = revert.selector {
        if NOT_READY_SELECTORS.contains(&selector) {
            return FinalizeReadiness::NotReady(format!("selector 0x{}", hex4(selector)));
        }
        if UNFINALIZABLE_SELECTORS.contains(&selector) {
            return FinalizeReadiness::Unfinalizable(format!("selector 0x{}", hex4(selector)));
        }
    }
    FinalizeReadiness::Unknown(
        revert
            .reason
            .clone()
            .or_else(|| revert.selector.map(|s| format!("selector 0x{}", hex4(s))))
            .unwrap_or_else(|| "revert with no data".to_string()),
    )
}

fn hex4(selector: [u8; 4]) -> String {
    selector.iter().map(|b| format!("{b:02x}")).collect()
}

/// The unsent finalize transaction for a proof.
pub(crate) fn finalize_tx(contracts: &BridgeContracts, proof: &FinalizeProof) -> TypedTransaction {
    encoding::contract_call(
        contracts.l1_asset_router,
        encoding::finalize_withdrawal_calldata(
            proof.chain_id,
            proof.batch_number,
            proof.message_index,
            proof.tx_index_in_batch,
            &proof.message,
            &proof.merkle_proof,
        ),
    )
}

/// Read the finalization registry directly.
pub(crate) async fn read_registry(
    l1: &dyn ChainClient,
    contracts: &BridgeContracts,
    key: &WithdrawalKey,
) -> BridgeResult<bool> {
    let data = l1
        .call(&encoding::is_withdrawal_finalized(
            contracts.l1_asset_router,
            key.chain_id,
            key.batch_number,
            key.message_index,
        ))
        .await?;
    encoding::decode_bool(&data, "isWithdrawalFinalized")
}

async fn finalized_status(
    cache: &FinalizeHashCache,
    l1: &dyn ChainClient,
    l2_tx_hash: H256,
) -> FinalizeOutcome {
    let finalize_tx_hash = cache.get(l2_tx_hash).await;
    let receipt = match finalize_tx_hash {
        Some(hash) => l1.transaction_receipt(hash).await.ok().flatten(),
        None => None,
    };
    FinalizeOutcome {
        status: WithdrawalStatus {
            phase: WithdrawalPhase::Finalized,
            l2_tx_hash: Some(l2_tx_hash),
            finalize_tx_hash,
            reason: None,
        },
        receipt,
    }
}

/// Submit the proof-carrying finalize transaction on the settlement
/// chain, unless the withdrawal is already finalized (idempotent no-op).
///
/// A readiness-simulation revert surfaces as a `State` error when the
/// condition is transient and a `Contract` error when it is permanent, so
/// callers can decide whether to retry. After a failed send or
/// confirmation the registry is re-checked once: a concurrent finalizer
/// winning the race counts as success.
pub async fn finalize(
    l1: &dyn ChainClient,
    l2: &dyn ExecutionChainClient,
    contracts: &BridgeContracts,
    metrics: &BridgeMetrics,
    cache: &FinalizeHashCache,
    l2_tx_hash: H256,
) -> BridgeResult<FinalizeOutcome> {
    let ctx = ErrorCtx::new("withdrawals", "finalize");
    let proof = derive_finalize_proof(l2, contracts.l2_chain_id, l2_tx_hash).await?;
    let key = proof.key();
    metrics.finalize_attempts.inc();

    match read_registry(l1, contracts, &key).await {
        Ok(true) => {
            info!(tx_hash = ?l2_tx_hash, "withdrawal already finalized, nothing to send");
            metrics.finalize_already_finalized.inc();
            return Ok(finalized_status(cache, l1, l2_tx_hash).await);
        }
        Ok(false) => {}
        // A registry read failure is not fatal; the readiness simulation
        // below gives the authoritative answer.
        Err(e) => {
            metrics
                .rpc_errors
                .with_label_values(&["l1", e.kind().label()])
                .inc();
            warn!("finalization registry read failed, falling through to simulation: {e}");
        }
    }

    let mut tx = finalize_tx(contracts, &proof);
    tx.set_from(l1.sender());
    match l1.call(&tx).await {
        Ok(_) => {}
        Err(e) if e.is_kind(ErrorKind::Contract) => {
            let readiness = e
                .revert()
                .map(classify_finalize_revert)
                .unwrap_or_else(|| FinalizeReadiness::Unknown(e.message().to_string()));
            return Err(match readiness {
                FinalizeReadiness::NotReady(reason) => ctx
                    .state(format!("withdrawal is not ready to finalize: {reason}"))
                    .with_context("readiness", "not-ready")
                    .with_context("tx_hash", format!("{l2_tx_hash:?}"))
                    .with_cause(e),
                FinalizeReadiness::Unfinalizable(reason) => ctx
                    .contract(format!("withdrawal cannot be finalized: {reason}"))
                    .with_context("readiness", "unfinalizable")
                    .with_context("tx_hash", format!("{l2_tx_hash:?}"))
                    .with_cause(e),
                // Unclassified reverts stay retryable; a permanent
                // condition will keep reproducing and the caller can give
                // up on its own schedule.
                FinalizeReadiness::Unknown(reason) => ctx
                    .state(format!("finalize simulation reverted: {reason}"))
                    .with_context("readiness", "unknown")
                    .with_context("tx_hash", format!("{l2_tx_hash:?}"))
                    .with_cause(e),
            });
        }
        Err(e) => return Err(e),
    }

    match l1.estimate_gas(&tx).await {
        Ok(raw) => {
            tx.set_gas(buffered_gas_limit(raw));
        }
        Err(e) => {
            metrics.gas_estimate_fallbacks.inc();
            tracing::debug!("finalize gas estimation failed, using default: {e}");
            tx.set_gas(U256::from(DEFAULT_FINALIZE_GAS));
        }
    }
    let nonce = l1.next_nonce().await?;
    tx.set_nonce(nonce);

    metrics.tx_submitted.with_label_values(&["l1"]).inc();
    let finalize_hash = match l1.send_transaction(tx).await {
        Ok(hash) => hash,
        Err(e) => {
            return match recheck_finalized(l1, contracts, &key).await {
                true => {
                    metrics.finalize_already_finalized.inc();
                    Ok(finalized_status(cache, l1, l2_tx_hash).await)
                }
                false => Err(ctx
                    .execution("finalize transaction failed to send")
                    .with_context("tx_hash", format!("{l2_tx_hash:?}"))
                    .with_cause(e)),
            };
        }
    };
    info!(tx_hash = ?l2_tx_hash, finalize_tx_hash = ?finalize_hash, "finalize submitted");
    cache.insert(l2_tx_hash, finalize_hash).await;

    let options = WaitOptions {
        poll_ms: Some(crate::wait::MIN_POLL_INTERVAL_MS),
        timeout_ms: Some(FINALIZE_RECEIPT_TIMEOUT_MS),
    };
    let receipt = wait_for_receipt(l1, finalize_hash, &options)
        .await
        .tap_err(|e| warn!("finalize confirmation failed: {e}"))
        .ok()
        .flatten();

    match receipt {
        Some(receipt) if receipt.status == Some(1u64.into()) => {
            metrics.tx_confirmed.with_label_values(&["l1"]).inc();
            Ok(FinalizeOutcome {
                status: WithdrawalStatus {
                    phase: WithdrawalPhase::Finalized,
                    l2_tx_hash: Some(l2_tx_hash),
                    finalize_tx_hash: Some(finalize_hash),
                    reason: None,
                },
                receipt: Some(receipt),
            })
        }
        // Reverted, timed out, or the lookup failed: another actor may
        // have finalized concurrently and made our transaction revert.
        _ => {
            metrics.tx_failed.with_label_values(&["l1"]).inc();
            if recheck_finalized(l1, contracts, &key).await {
                metrics.finalize_already_finalized.inc();
                return Ok(finalized_status(cache, l1, l2_tx_hash).await);
            }
            Err(ctx
                .execution("finalize transaction was not confirmed")
                .with_context("tx_hash", format!("{l2_tx_hash:?}"))
                .with_context("finalize_tx_hash", format!("{finalize_hash:?}")))
        }
    }
}

// One bounded re-check of the registry after a failed send or wait.
async fn recheck_finalized(
    l1: &dyn ChainClient,
    contracts: &BridgeContracts,
    key: &WithdrawalKey,
) -> bool {
    matches!(
        retry_with_max_elapsed_time!(read_registry(l1, contracts, key), RECHECK_MAX_ELAPSED),
        Ok(Ok(true))
    )
}
