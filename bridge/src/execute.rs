// Copyright (c) The Rollup Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Plan execution: strictly sequential step submission with local nonce
//! assignment, best-effort gas fallback, and per-step failure
//! classification.

use std::collections::BTreeMap;

use ethers::types::{H256, U256};
use tracing::{debug, info};

use rollup_bridge_types::{BridgeError, BridgeResult, ChainSide, ErrorCtx, Plan, PlanStep};

use crate::chain::ChainClient;
use crate::metrics::BridgeMetrics;
use crate::quote::buffered_gas_limit;
use crate::wait::{wait_for_receipt, WaitOptions};

/// How long a submitted step may stay unconfirmed before execution fails
/// with a timeout.
pub const STEP_RECEIPT_TIMEOUT_MS: u64 = 600_000;

pub struct Executor<'a, C: ChainClient + ?Sized> {
    pub client: &'a C,
    pub metrics: &'a BridgeMetrics,
    pub side: ChainSide,
    pub resource: &'static str,
}

impl<'a, C: ChainClient + ?Sized> Executor<'a, C> {
    fn step_error(
        &self,
        ctx: &ErrorCtx,
        step: &PlanStep,
        nonce: U256,
        hash: Option<H256>,
        message: &str,
        cause: Option<BridgeError>,
    ) -> BridgeError {
        let mut err = ctx
            .execution(message)
            .with_context("step", &step.key)
            .with_context("nonce", nonce)
            .with_context("chain", self.side.label());
        if let Some(hash) = hash {
            err = err.with_context("tx_hash", format!("{hash:?}"));
        }
        if let Some(cause) = cause {
            err = err.with_cause(cause);
        }
        err
    }

    /// Send every plan step in order, waiting for each receipt before the
    /// next submission. The pending nonce is fetched once up front and
    /// incremented locally, never re-queried mid-plan.
    pub async fn execute<R>(&self, plan: &Plan<R>) -> BridgeResult<BTreeMap<String, H256>> {
        let ctx = ErrorCtx::new(self.resource, "create");
        let mut nonce = self.client.next_nonce().await?;
        let mut step_hashes = BTreeMap::new();

        for step in &plan.steps {
            let mut tx = step.tx.clone();

            if tx.gas().is_none() {
                // Best-effort: if estimation fails the step goes out
                // without a gas limit and the chain decides at submission.
                match self.client.estimate_gas(&tx).await {
                    Ok(raw) => {
                        tx.set_gas(buffered_gas_limit(raw));
                    }
                    Err(e) => {
                        debug!(step = %step.key, "gas estimation failed, submitting without explicit limit: {e}");
                    }
                }
            }
            tx.set_nonce(nonce);

            self.metrics
                .tx_submitted
                .with_label_values(&[self.side.label()])
                .inc();
            let hash = match self.client.send_transaction(tx).await {
                Ok(hash) => hash,
                Err(e) => {
                    self.metrics
                        .tx_failed
                        .with_label_values(&[self.side.label()])
                        .inc();
                    return Err(self.step_error(&ctx, step, nonce, None, "step failed to send", Some(e)));
                }
            };
            info!(step = %step.key, tx_hash = ?hash, %nonce, "step submitted");
            step_hashes.insert(step.key.clone(), hash);

            let options = WaitOptions {
                poll_ms: Some(crate::wait::MIN_POLL_INTERVAL_MS),
                timeout_ms: Some(STEP_RECEIPT_TIMEOUT_MS),
            };
            let receipt = match wait_for_receipt(self.client, hash, &options).await {
                Ok(receipt) => receipt,
                Err(e) => {
                    self.metrics
                        .rpc_errors
                        .with_label_values(&[self.side.label(), e.kind().label()])
                        .inc();
                    self.metrics
                        .tx_failed
                        .with_label_values(&[self.side.label()])
                        .inc();
                    return Err(self.step_error(
                        &ctx,
                        step,
                        nonce,
                        Some(hash),
                        "step confirmation failed",
                        Some(e),
                    ));
                }
            };
            match receipt {
                None => {
                    self.metrics
                        .tx_failed
                        .with_label_values(&[self.side.label()])
                        .inc();
                    return Err(ctx
                        .timeout("step was not confirmed in time")
                        .with_context("step", &step.key)
                        .with_context("tx_hash", format!("{hash:?}"))
                        .with_context("nonce", nonce));
                }
                Some(receipt) if receipt.status == Some(0u64.into()) => {
                    self.metrics
                        .tx_failed
                        .with_label_values(&[self.side.label()])
                        .inc();
                    return Err(self.step_error(&ctx, step, nonce, Some(hash), "step reverted", None));
                }
                Some(_) => {
                    self.metrics
                        .tx_confirmed
                        .with_label_values(&[self.side.label()])
                        .inc();
                }
            }
            nonce = nonce + U256::one();
        }

        Ok(step_hashes)
    }
}
