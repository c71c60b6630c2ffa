// Copyright (c) The Rollup Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! The deposit resource: L1 -> L2 transfers.

use std::sync::Arc;

use ethers::types::{TransactionReceipt, H256};

use rollup_bridge_types::{
    BridgeResult, ChainSide, DepositHandle, DepositPhase, DepositRoute, DepositStatus, ErrorCtx,
    Plan, TransferParams, TransferQuote,
};

use crate::execute::Executor;
use crate::node::BridgeCtx;
use crate::plan::DepositPlanner;
use crate::status::deposit_status;
use crate::wait::{poll_until, WaitOptions};

pub struct Deposits {
    ctx: Arc<BridgeCtx>,
}

impl Deposits {
    pub fn new(ctx: Arc<BridgeCtx>) -> Self {
        Deposits { ctx }
    }

    /// Resolve route and costs without executing anything.
    pub async fn quote(&self, params: &TransferParams) -> BridgeResult<TransferQuote<DepositRoute>> {
        let plan = self.prepare(params).await?;
        Ok(TransferQuote {
            route: plan.route,
            fee: plan.summary,
            approval_required: !plan.approvals.is_empty(),
        })
    }

    /// Build the ordered step plan. Read-only.
    pub async fn prepare(&self, params: &TransferParams) -> BridgeResult<Plan<DepositRoute>> {
        let bridgehub = self.ctx.bridgehub().await?;
        let l1_chain_id = self.ctx.l1_chain_id().await?;
        let planner = DepositPlanner {
            client: &*self.ctx.l1,
            contracts: &self.ctx.contracts,
            metrics: &self.ctx.metrics,
            fee_cache: &self.ctx.l1_fee_cache,
            bridgehub,
            l1_chain_id,
        };
        planner.build(params).await
    }

    /// Build and execute the plan, returning the handle of the submitted
    /// deposit.
    pub async fn create(&self, params: &TransferParams) -> BridgeResult<DepositHandle> {
        let plan = self.prepare(params).await?;
        let executor = Executor {
            client: &*self.ctx.l1,
            metrics: &self.ctx.metrics,
            side: ChainSide::L1,
            resource: "deposits",
        };
        let step_hashes = executor.execute(&plan).await?;
        let l1_tx_hash = step_hashes.get("transfer").copied().ok_or_else(|| {
            ErrorCtx::new("deposits", "create").internal("executed plan has no transfer step")
        })?;
        Ok(DepositHandle {
            route: plan.route,
            step_hashes,
            l1_tx_hash,
            l2_tx_hash: None,
            plan,
        })
    }

    pub async fn status(&self, handle: &DepositHandle) -> BridgeResult<DepositStatus> {
        self.status_of(handle.l1_tx_hash).await
    }

    /// Status from a bare settlement-chain transaction hash.
    pub async fn status_of(&self, l1_tx_hash: H256) -> BridgeResult<DepositStatus> {
        deposit_status(&*self.ctx.l1, &*self.ctx.l2, l1_tx_hash).await
    }

    /// Attach the discovered execution-chain hash to the handle, if the
    /// correlation is available yet.
    pub async fn resolve_counterpart(
        &self,
        handle: &mut DepositHandle,
    ) -> BridgeResult<Option<H256>> {
        let status = self.status_of(handle.l1_tx_hash).await?;
        if handle.l2_tx_hash.is_none() {
            handle.l2_tx_hash = status.l2_tx_hash;
        }
        Ok(handle.l2_tx_hash)
    }

    /// Poll status until `phase` (or later) is reached, returning the
    /// receipt of the relevant chain side. `Ok(None)` on timeout.
    pub async fn wait(
        &self,
        l1_tx_hash: H256,
        phase: DepositPhase,
        options: &WaitOptions,
    ) -> BridgeResult<Option<TransactionReceipt>> {
        poll_until(options, || async move {
            let status = self.status_of(l1_tx_hash).await?;
            if status.phase < phase {
                return Ok(None);
            }
            // Past the bridge entry the interesting receipt lives on the
            // execution chain.
            let receipt = if phase >= DepositPhase::L2Pending {
                match status.l2_tx_hash {
                    Some(l2_hash) => self.ctx.l2.transaction_receipt(l2_hash).await?,
                    None => None,
                }
            } else {
                self.ctx.l1.transaction_receipt(l1_tx_hash).await?
            };
            Ok(Some(receipt))
        })
        .await
        .map(Option::flatten)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::{Address, U256};

    use rollup_bridge_types::base_types::native_asset_sentinel;

    use crate::chain::FeeData;
    use crate::config::BridgeContracts;
    use crate::metrics::BridgeMetrics;
    use crate::mock_client::MockChainClient;
    use crate::test_utils;

    fn deposits() -> (Deposits, Arc<MockChainClient>, Arc<MockChainClient>) {
        let l1 = Arc::new(MockChainClient::new().with_chain_id(1));
        let l2 = Arc::new(MockChainClient::new().with_chain_id(300));
        l1.set_fee_data(FeeData {
            max_fee_per_gas: U256::from(100),
            max_priority_fee_per_gas: U256::from(10),
        });
        l1.set_estimated_gas(U256::from(200_000));
        let ctx = BridgeCtx::new(
            l1.clone(),
            l2.clone(),
            BridgeContracts {
                l1_asset_router: Address::repeat_byte(0x11),
                l2_asset_router: Address::repeat_byte(0x22),
                l1_base_token: native_asset_sentinel(),
                l2_chain_id: 300,
            },
            Arc::new(BridgeMetrics::new_for_testing()),
        );
        (Deposits::new(Arc::new(ctx)), l1, l2)
    }

    #[tokio::test]
    async fn test_create_native_deposit() {
        crate::test_utils::init_test_tracing();
        let (deposits, l1, _l2) = deposits();
        let params = TransferParams::new(native_asset_sentinel(), U256::from(5000));
        let handle = deposits.create(&params).await.unwrap();

        assert_eq!(handle.route, DepositRoute::NativeBase);
        assert_eq!(handle.step_hashes.len(), 1);
        assert_eq!(handle.l2_tx_hash, None);
        assert_eq!(l1.sent_count(), 1);
        assert_eq!(handle.l1_tx_hash, l1.sent_hash(0));
    }

    #[tokio::test]
    async fn test_quote_reports_route_and_fee() {
        let (deposits, _l1, _l2) = deposits();
        let params = TransferParams::new(native_asset_sentinel(), U256::from(5000));
        let quote = deposits.quote(&params).await.unwrap();

        assert_eq!(quote.route, DepositRoute::NativeBase);
        assert!(!quote.approval_required);
        let fee = quote.fee.unwrap();
        assert!(fee.max_cost > U256::zero());
    }

    #[tokio::test]
    async fn test_status_and_counterpart_resolution() {
        let (deposits, l1, l2) = deposits();
        let params = TransferParams::new(native_asset_sentinel(), U256::from(5000));
        let mut handle = deposits.create(&params).await.unwrap();

        // The auto receipt carries no logs: still L1Included.
        let status = deposits.status(&handle).await.unwrap();
        assert_eq!(status.phase, DepositPhase::L1Included);

        // Now the bridge-entry event shows up in the receipt.
        let l2_hash = ethers::types::H256::repeat_byte(0x42);
        l1.set_receipt(
            handle.l1_tx_hash,
            test_utils::make_receipt(
                1,
                vec![test_utils::transaction_requested_log(
                    Address::repeat_byte(9),
                    l2_hash,
                )],
            ),
        );
        let resolved = deposits.resolve_counterpart(&mut handle).await.unwrap();
        assert_eq!(resolved, Some(l2_hash));
        assert_eq!(handle.l2_tx_hash, Some(l2_hash));

        l2.set_receipt(l2_hash, test_utils::make_receipt(1, vec![]));
        let status = deposits.status(&handle).await.unwrap();
        assert_eq!(status.phase, DepositPhase::L2Executed);
    }

    #[tokio::test]
    async fn test_wait_times_out_with_none() {
        let (deposits, _l1, _l2) = deposits();
        // A hash nobody knows about stays L1Pending forever.
        let result = deposits
            .wait(
                ethers::types::H256::repeat_byte(0x01),
                DepositPhase::L2Executed,
                &WaitOptions {
                    poll_ms: Some(1_000),
                    timeout_ms: Some(50),
                },
            )
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_wait_returns_receipt_once_phase_reached() {
        let (deposits, l1, _l2) = deposits();
        let params = TransferParams::new(native_asset_sentinel(), U256::from(100));
        let handle = deposits.create(&params).await.unwrap();
        l1.set_receipt(handle.l1_tx_hash, test_utils::make_receipt(1, vec![]));

        let receipt = deposits
            .wait(
                handle.l1_tx_hash,
                DepositPhase::L1Included,
                &WaitOptions {
                    poll_ms: Some(1_000),
                    timeout_ms: Some(5_000),
                },
            )
            .await
            .unwrap();
        assert!(receipt.is_some());
    }
}
