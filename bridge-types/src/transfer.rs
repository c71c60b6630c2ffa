// Copyright (c) The Rollup Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Transfer data model: parameters, routes, plans, handles, lifecycle
//! phases and the withdrawal finalization proof.

use std::collections::BTreeMap;

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::base_types::Amount;

/// Caller-supplied parameters for a transfer in either direction.
///
/// `to` defaults to the sender when unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferParams {
    pub token: Address,
    pub amount: Amount,
    pub to: Option<Address>,
    pub fee_overrides: Option<FeeOverrides>,
}

impl TransferParams {
    pub fn new(token: Address, amount: Amount) -> Self {
        TransferParams {
            token,
            amount,
            to: None,
            fee_overrides: None,
        }
    }

    pub fn with_recipient(mut self, to: Address) -> Self {
        self.to = Some(to);
        self
    }

    pub fn with_fee_overrides(mut self, overrides: FeeOverrides) -> Self {
        self.fee_overrides = Some(overrides);
        self
    }
}

/// Explicit fee overrides. Each field wins over both the candidate
/// transaction's own value and the live market estimate, independently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeeOverrides {
    pub gas_limit: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
}

/// Resolved cost summary for a plan. Quoting never mutates chain state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSummary {
    pub gas_limit: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub max_cost: U256,
}

/// Quote returned before any plan is executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferQuote<R> {
    pub route: R,
    /// `None` when the market estimate was unavailable; callers fall back
    /// to contract defaults.
    pub fee: Option<FeeSummary>,
    pub approval_required: bool,
}

/// Transfer route for deposits (L1 -> L2). Decided once, immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum DepositRoute {
    /// The canonical native asset, which is also the chain's base asset.
    NativeBase,
    /// An ERC-20 that serves as the chain's base asset.
    TokenBase,
    /// Any other token, moved through the asset vault.
    TokenNonBase,
}

/// Transfer route for withdrawals (L2 -> L1). Decided once, immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum WithdrawalRoute {
    /// The chain's base asset, which is the canonical native asset.
    NativeBase,
    /// The chain's base asset, which is not the canonical native asset.
    NativeNonBase,
    /// Any other token, moved through the asset vault.
    TokenNonBase,
}

/// Emitted when the sender's allowance to the vault is insufficient.
/// Zero or one per plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalNeed {
    pub token: Address,
    pub spender: Address,
    pub amount: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum StepKind {
    Approve,
    Transfer,
}

impl StepKind {
    pub fn label(&self) -> &'static str {
        match self {
            StepKind::Approve => "approve",
            StepKind::Transfer => "transfer",
        }
    }
}

/// One ordered, unsent transaction within a plan. Later steps assume
/// earlier steps already landed.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanStep {
    /// Unique within the plan.
    pub key: String,
    pub kind: StepKind,
    pub description: String,
    pub tx: TypedTransaction,
}

/// An ordered list of unsent transaction steps plus a cost summary.
/// Immutable once built; building never submits a state-changing call.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan<R> {
    pub route: R,
    pub summary: Option<FeeSummary>,
    pub steps: Vec<PlanStep>,
    pub approvals: Vec<ApprovalNeed>,
}

impl<R> Plan<R> {
    pub fn step(&self, key: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.key == key)
    }

    /// The step that actually moves value (the last one by construction).
    pub fn transfer_step(&self) -> Option<&PlanStep> {
        self.steps.iter().rev().find(|s| s.kind == StepKind::Transfer)
    }
}

/// Result of executing a deposit plan. Never mutated after creation except
/// to attach the discovered execution-chain hash.
#[derive(Debug, Clone)]
pub struct DepositHandle {
    pub route: DepositRoute,
    pub step_hashes: BTreeMap<String, H256>,
    /// Hash of the settlement-chain transaction that entered the bridge.
    pub l1_tx_hash: H256,
    /// Counterpart hash on the execution chain, once discovered.
    pub l2_tx_hash: Option<H256>,
    pub plan: Plan<DepositRoute>,
}

/// Result of executing a withdrawal plan.
#[derive(Debug, Clone)]
pub struct WithdrawalHandle {
    pub route: WithdrawalRoute,
    pub step_hashes: BTreeMap<String, H256>,
    /// Hash of the execution-chain transaction that burned/escrowed value.
    pub l2_tx_hash: H256,
    pub plan: Plan<WithdrawalRoute>,
}

/// Lifecycle phase of a deposit. Derived from chain state on every query,
/// never stored authoritatively.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize,
)]
pub enum DepositPhase {
    Unknown,
    L1Pending,
    L1Included,
    L2Pending,
    L2Executed,
    L2Failed,
}

/// Lifecycle phase of a withdrawal. The variant order is the lifecycle
/// order; `FinalizeFailed` is terminal and reachable only from
/// `Finalizing`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize,
)]
pub enum WithdrawalPhase {
    Unknown,
    L2Pending,
    L2Included,
    Pending,
    ReadyToFinalize,
    Finalizing,
    Finalized,
    FinalizeFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositStatus {
    pub phase: DepositPhase,
    pub l1_tx_hash: Option<H256>,
    pub l2_tx_hash: Option<H256>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalStatus {
    pub phase: WithdrawalPhase,
    pub l2_tx_hash: Option<H256>,
    pub finalize_tx_hash: Option<H256>,
    /// Attached when a readiness simulation reverted; the phase stays
    /// `Pending` but callers get the classified reason.
    pub reason: Option<String>,
}

impl WithdrawalStatus {
    pub fn of(phase: WithdrawalPhase) -> Self {
        WithdrawalStatus {
            phase,
            l2_tx_hash: None,
            finalize_tx_hash: None,
            reason: None,
        }
    }
}

/// Unique coordinate of a withdrawal message for finalization checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WithdrawalKey {
    pub chain_id: u64,
    pub batch_number: u64,
    pub message_index: u64,
}

/// Cross-chain inclusion proof for one withdrawal message. Derived once
/// from the source receipt; re-deriving from the same receipt yields
/// byte-identical output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeProof {
    pub chain_id: u64,
    pub batch_number: u64,
    pub message_index: u64,
    /// Account that sent the cross-layer message on the execution chain.
    pub sender: Address,
    pub tx_index_in_batch: u16,
    pub message: Bytes,
    pub merkle_proof: Vec<H256>,
}

impl FinalizeProof {
    pub fn key(&self) -> WithdrawalKey {
        WithdrawalKey {
            chain_id: self.chain_id,
            batch_number: self.batch_number,
            message_index: self.message_index,
        }
    }
}

/// Classification of a finalize readiness-simulation revert.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum FinalizeReadiness {
    /// Transient: paused, batch not yet executed, merkle root not posted.
    /// Callers should retry later.
    NotReady(String),
    /// Permanent: invalid message, wrong chain, unsupported settlement
    /// path. Retrying cannot succeed.
    Unfinalizable(String),
    /// Revert data matched no known selector or reason.
    Unknown(String),
}

/// Outcome of a finalize call.
#[derive(Debug, Clone)]
pub struct FinalizeOutcome {
    pub status: WithdrawalStatus,
    pub receipt: Option<ethers::types::TransactionReceipt>,
}
