// Copyright (c) The Rollup Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! The withdrawal resource: L2 -> L1 transfers and their finalization.

use std::sync::Arc;

use ethers::types::{TransactionReceipt, H256};

use rollup_bridge_types::{
    BridgeResult, ChainSide, ErrorCtx, FinalizeOutcome, Plan, TransferParams, TransferQuote,
    WithdrawalHandle, WithdrawalPhase, WithdrawalRoute, WithdrawalStatus,
};

use crate::execute::Executor;
use crate::finalize;
use crate::node::BridgeCtx;
use crate::plan::WithdrawalPlanner;
use crate::status::withdrawal_status;
use crate::wait::{poll_until, WaitOptions};

pub struct Withdrawals {
    ctx: Arc<BridgeCtx>,
}

impl Withdrawals {
    pub fn new(ctx: Arc<BridgeCtx>) -> Self {
        Withdrawals { ctx }
    }

    /// Resolve route and costs without executing anything.
    pub async fn quote(
        &self,
        params: &TransferParams,
    ) -> BridgeResult<TransferQuote<WithdrawalRoute>> {
        let plan = self.prepare(params).await?;
        Ok(TransferQuote {
            route: plan.route,
            fee: plan.summary,
            approval_required: !plan.approvals.is_empty(),
        })
    }

    /// Build the ordered step plan. Read-only.
    pub async fn prepare(&self, params: &TransferParams) -> BridgeResult<Plan<WithdrawalRoute>> {
        let planner = WithdrawalPlanner {
            client: &*self.ctx.l2,
            contracts: &self.ctx.contracts,
            metrics: &self.ctx.metrics,
            fee_cache: &self.ctx.l2_fee_cache,
        };
        planner.build(params).await
    }

    /// Build and execute the plan, returning the handle of the submitted
    /// withdrawal.
    pub async fn create(&self, params: &TransferParams) -> BridgeResult<WithdrawalHandle> {
        let plan = self.prepare(params).await?;
        let executor = Executor {
            client: &*self.ctx.l2,
            metrics: &self.ctx.metrics,
            side: ChainSide::L2,
            resource: "withdrawals",
        };
        let step_hashes = executor.execute(&plan).await?;
        let l2_tx_hash = step_hashes.get("transfer").copied().ok_or_else(|| {
            ErrorCtx::new("withdrawals", "create").internal("executed plan has no transfer step")
        })?;
        Ok(WithdrawalHandle {
            route: plan.route,
            step_hashes,
            l2_tx_hash,
            plan,
        })
    }

    pub async fn status(&self, handle: &WithdrawalHandle) -> BridgeResult<WithdrawalStatus> {
        self.status_of(handle.l2_tx_hash).await
    }

    /// Status from a bare execution-chain transaction hash.
    pub async fn status_of(&self, l2_tx_hash: H256) -> BridgeResult<WithdrawalStatus> {
        withdrawal_status(
            &*self.ctx.l1,
            &*self.ctx.l2,
            &self.ctx.contracts,
            &self.ctx.finalize_cache,
            l2_tx_hash,
        )
        .await
    }

    /// Derive the inclusion proof, race "already finalized" against
    /// "simulate then send", and submit the finalize transaction.
    pub async fn finalize(&self, l2_tx_hash: H256) -> BridgeResult<FinalizeOutcome> {
        finalize::finalize(
            &*self.ctx.l1,
            &*self.ctx.l2,
            &self.ctx.contracts,
            &self.ctx.metrics,
            &self.ctx.finalize_cache,
            l2_tx_hash,
        )
        .await
    }

    /// Poll status until `phase` (or later) is reached, returning the
    /// receipt of the relevant chain side. `Ok(None)` on timeout.
    pub async fn wait(
        &self,
        l2_tx_hash: H256,
        phase: WithdrawalPhase,
        options: &WaitOptions,
    ) -> BridgeResult<Option<TransactionReceipt>> {
        poll_until(options, || async move {
            let status = self.status_of(l2_tx_hash).await?;
            if status.phase < phase {
                return Ok(None);
            }
            // From Finalizing onward the interesting receipt is the
            // finalize transaction's, on the settlement chain.
            let receipt = if phase >= WithdrawalPhase::Finalizing {
                match status.finalize_tx_hash {
                    Some(hash) => self.ctx.l1.transaction_receipt(hash).await?,
                    None => None,
                }
            } else {
                self.ctx.l2.transaction_receipt(l2_tx_hash).await?
            };
            Ok(Some(receipt))
        })
        .await
        .map(Option::flatten)
    }
}
