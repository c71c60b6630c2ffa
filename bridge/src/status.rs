// Copyright (c) The Rollup Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Status derivation: a read-only, idempotent, poll-safe mapping from
//! chain state to a discrete lifecycle phase. The chains are the source
//! of truth; nothing here is stored authoritatively.

use ethers::types::{TransactionReceipt, H256};
use tracing::{debug, warn};

use rollup_bridge_types::{
    BridgeResult, DepositPhase, DepositStatus, ErrorCtx, ErrorKind, WithdrawalPhase,
    WithdrawalStatus,
};

use crate::cache::FinalizeHashCache;
use crate::chain::{is_receipt_not_found, ChainClient, ExecutionChainClient};
use crate::config::BridgeContracts;
use crate::encoding::{
    decode_requested_l2_hash, REQUEST_ASSIGNED_TOPIC, REQUEST_SUCCEEDED_TOPIC,
};
use crate::finalize::{classify_finalize_revert, derive_finalize_proof, finalize_tx, read_registry};

/// Extract the execution-chain transaction hash from a deposit receipt's
/// logs.
///
/// The primary bridge-entry event carries the hash in its data; older
/// contract versions emit one of two assignment/success events with the
/// hash at a fixed topic slot instead. A receipt with no recognizable
/// logs yields `None`, never an error.
pub fn extract_l2_tx_hash(receipt: &TransactionReceipt) -> Option<H256> {
    for log in &receipt.logs {
        if let Some(hash) = decode_requested_l2_hash(log) {
            return Some(hash);
        }
    }
    for log in &receipt.logs {
        let Some(topic0) = log.topics.first() else {
            continue;
        };
        if *topic0 == *REQUEST_ASSIGNED_TOPIC {
            if let Some(hash) = log.topics.get(2) {
                return Some(*hash);
            }
        } else if *topic0 == *REQUEST_SUCCEEDED_TOPIC {
            if let Some(hash) = log.topics.get(3) {
                return Some(*hash);
            }
        }
    }
    None
}

/// Derive the deposit phase for a settlement-chain entry transaction.
pub async fn deposit_status(
    l1: &dyn ChainClient,
    l2: &dyn ExecutionChainClient,
    l1_tx_hash: H256,
) -> BridgeResult<DepositStatus> {
    let ctx = ErrorCtx::new("deposits", "status");

    let receipt = match l1.transaction_receipt(l1_tx_hash).await {
        Ok(receipt) => receipt,
        Err(e) if is_receipt_not_found(&e) => None,
        Err(e) => return Err(e),
    };
    let Some(receipt) = receipt else {
        return Ok(DepositStatus {
            phase: DepositPhase::L1Pending,
            l1_tx_hash: Some(l1_tx_hash),
            l2_tx_hash: None,
        });
    };
    if receipt.status == Some(0u64.into()) {
        return Err(ctx
            .execution("deposit transaction reverted on the settlement chain")
            .with_context("tx_hash", format!("{l1_tx_hash:?}")));
    }

    let Some(l2_tx_hash) = extract_l2_tx_hash(&receipt) else {
        debug!(tx_hash = ?l1_tx_hash, "no bridge-entry event recognized yet");
        return Ok(DepositStatus {
            phase: DepositPhase::L1Included,
            l1_tx_hash: Some(l1_tx_hash),
            l2_tx_hash: None,
        });
    };

    let l2_receipt = match l2.transaction_receipt(l2_tx_hash).await {
        Ok(receipt) => receipt,
        Err(e) if is_receipt_not_found(&e) => None,
        Err(e) => return Err(e),
    };
    let phase = match l2_receipt {
        None => DepositPhase::L2Pending,
        Some(receipt) if receipt.status == Some(0u64.into()) => DepositPhase::L2Failed,
        Some(_) => DepositPhase::L2Executed,
    };
    Ok(DepositStatus {
        phase,
        l1_tx_hash: Some(l1_tx_hash),
        l2_tx_hash: Some(l2_tx_hash),
    })
}

fn pending(l2_tx_hash: H256, reason: Option<String>) -> WithdrawalStatus {
    WithdrawalStatus {
        phase: WithdrawalPhase::Pending,
        l2_tx_hash: Some(l2_tx_hash),
        finalize_tx_hash: None,
        reason,
    }
}

/// Derive the withdrawal phase for an execution-chain burn transaction.
///
/// Simulation reverts never produce a terminal phase here; the
/// classification is attached as a reason on a `Pending` status instead.
/// `FinalizeFailed` is only reported from an actually failed finalize
/// transaction found through the finalize-hash cache.
pub async fn withdrawal_status(
    l1: &dyn ChainClient,
    l2: &dyn ExecutionChainClient,
    contracts: &BridgeContracts,
    cache: &FinalizeHashCache,
    l2_tx_hash: H256,
) -> BridgeResult<WithdrawalStatus> {
    let ctx = ErrorCtx::new("withdrawals", "status");

    let cross = match l2.cross_layer_receipt(l2_tx_hash).await {
        Ok(cross) => cross,
        Err(e) if is_receipt_not_found(&e) => None,
        Err(e) => return Err(e),
    };
    let Some(cross) = cross else {
        return Ok(WithdrawalStatus {
            phase: WithdrawalPhase::L2Pending,
            l2_tx_hash: Some(l2_tx_hash),
            finalize_tx_hash: None,
            reason: None,
        });
    };
    if cross.receipt.status == Some(0u64.into()) {
        return Err(ctx
            .execution("withdrawal transaction reverted on the execution chain")
            .with_context("tx_hash", format!("{l2_tx_hash:?}")));
    }
    if cross.batch_number.is_none() {
        return Ok(WithdrawalStatus {
            phase: WithdrawalPhase::L2Included,
            l2_tx_hash: Some(l2_tx_hash),
            finalize_tx_hash: None,
            reason: None,
        });
    }

    let proof = match derive_finalize_proof(l2, contracts.l2_chain_id, l2_tx_hash).await {
        Ok(proof) => proof,
        // Proof data not yet available on the source chain.
        Err(e) if e.is_kind(ErrorKind::State) => return Ok(pending(l2_tx_hash, None)),
        Err(e) if e.is_kind(ErrorKind::Verification) => {
            return Ok(pending(l2_tx_hash, Some(e.message().to_string())))
        }
        Err(e) => return Err(e),
    };

    match read_registry(l1, contracts, &proof.key()).await {
        Ok(true) => {
            return Ok(WithdrawalStatus {
                phase: WithdrawalPhase::Finalized,
                l2_tx_hash: Some(l2_tx_hash),
                finalize_tx_hash: cache.get(l2_tx_hash).await,
                reason: None,
            })
        }
        Ok(false) => {}
        Err(e) => warn!("finalization registry read failed, falling through to simulation: {e}"),
    }

    // A finalize attempt we submitted earlier takes precedence over a
    // fresh readiness simulation.
    if let Some(finalize_hash) = cache.get(l2_tx_hash).await {
        let phase = match l1.transaction_receipt(finalize_hash).await {
            Ok(Some(receipt)) if receipt.status == Some(0u64.into()) => {
                WithdrawalPhase::FinalizeFailed
            }
            Ok(Some(_)) => WithdrawalPhase::Finalized,
            Ok(None) => WithdrawalPhase::Finalizing,
            // Stale cache tolerated; keep reporting the in-flight attempt.
            Err(_) => WithdrawalPhase::Finalizing,
        };
        return Ok(WithdrawalStatus {
            phase,
            l2_tx_hash: Some(l2_tx_hash),
            finalize_tx_hash: Some(finalize_hash),
            reason: None,
        });
    }

    let mut tx = finalize_tx(contracts, &proof);
    tx.set_from(l1.sender());
    match l1.call(&tx).await {
        Ok(_) => Ok(WithdrawalStatus {
            phase: WithdrawalPhase::ReadyToFinalize,
            l2_tx_hash: Some(l2_tx_hash),
            finalize_tx_hash: None,
            reason: None,
        }),
        Err(e) if e.is_kind(ErrorKind::Contract) => {
            let readiness = match e.revert().map(classify_finalize_revert) {
                Some(rollup_bridge_types::FinalizeReadiness::NotReady(r)) => {
                    format!("not ready: {r}")
                }
                Some(rollup_bridge_types::FinalizeReadiness::Unfinalizable(r)) => {
                    format!("unfinalizable: {r}")
                }
                Some(rollup_bridge_types::FinalizeReadiness::Unknown(r)) => {
                    format!("unclassified revert: {r}")
                }
                None => "revert with no data".to_string(),
            };
            debug!(tx_hash = ?l2_tx_hash, "readiness simulation reverted: {readiness}");
            Ok(pending(l2_tx_hash, Some(readiness)))
        }
        Err(e) => Err(e),
    }
}
