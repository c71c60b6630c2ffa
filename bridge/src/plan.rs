// Copyright (c) The Rollup Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Plan construction, one strategy per route.
//!
//! Building a plan is read-only: allowance lookups and registry reads
//! only. Token routes prepend an approval step when the vault allowance
//! is insufficient; base-asset routes encode a direct value-bearing call
//! to the system contract. Every step is quoted before placement.

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, H256, U256};
use tracing::{debug, warn};

use rollup_bridge_types::base_types::{base_asset_system_address, is_base_asset_alias};
use rollup_bridge_types::{
    ApprovalNeed, BridgeResult, DepositRoute, ErrorCtx, FeeOverrides, FeeSummary, Plan, PlanStep,
    StepKind, TransferParams, WithdrawalRoute,
};

use crate::cache::TtlCell;
use crate::chain::{ChainClient, ExecutionChainClient, FeeData};
use crate::config::BridgeContracts;
use crate::encoding;
use crate::metrics::BridgeMetrics;
use crate::quote::{estimate_l2_execution_gas, resolve_fee_summary};
use crate::routes::{select_deposit_route, select_withdrawal_route};

/// Gas-per-pubdata commitment carried by L1 -> L2 requests.
pub const DEFAULT_GAS_PER_PUBDATA: u64 = 50_000;

// Context defaults used when gas estimation degrades.
pub(crate) const DEFAULT_APPROVE_GAS: u64 = 80_000;
pub(crate) const DEFAULT_WITHDRAW_GAS: u64 = 300_000;
pub(crate) const DEFAULT_DEPOSIT_GAS: u64 = 600_000;

// Conservative execution-chain gas price used to fund the L1 -> L2
// request when no override is given and market data is unavailable.
const FALLBACK_L2_GAS_PRICE_WEI: u64 = 250_000_000;

fn apply_summary(tx: &mut TypedTransaction, summary: &FeeSummary) {
    tx.set_gas(summary.gas_limit);
    if let TypedTransaction::Eip1559(inner) = tx {
        inner.max_fee_per_gas = Some(summary.max_fee_per_gas);
        inner.max_priority_fee_per_gas = Some(summary.max_priority_fee_per_gas);
    }
}

// Total cost across quoted steps; fee fields come from the transfer step.
fn combine_summaries(transfer: Option<FeeSummary>, approve: Option<FeeSummary>) -> Option<FeeSummary> {
    let mut summary = transfer?;
    if let Some(approve) = approve {
        summary.max_cost = summary.max_cost + approve.max_cost;
    }
    Some(summary)
}

async fn read_allowance<C: ChainClient + ?Sized>(
    client: &C,
    ctx: &ErrorCtx,
    token: Address,
    owner: Address,
    spender: Address,
) -> BridgeResult<U256> {
    let data = client
        .call(&encoding::erc20_allowance(token, owner, spender))
        .await?;
    encoding::decode_u256(&data, "allowance").map_err(|e| {
        ctx.internal("allowance return data did not decode")
            .with_context("token", format!("{token:?}"))
            .with_cause(e)
    })
}

// Registered asset identifier from the vault, or the canonical identifier
// computed locally when the token is not registered yet.
async fn resolve_asset_id<C: ChainClient + ?Sized>(
    client: &C,
    vault: Address,
    origin_chain_id: u64,
    token: Address,
) -> H256 {
    match client.call(&encoding::vault_asset_id(vault, token)).await {
        Ok(data) => match encoding::decode_h256(&data, "assetId") {
            Ok(id) if id != H256::zero() => return id,
            Ok(_) => debug!("token {token:?} not registered in vault, deriving canonical id"),
            Err(e) => debug!("assetId return data did not decode ({e}), deriving canonical id"),
        },
        Err(e) => debug!("assetId lookup failed ({e}), deriving canonical id"),
    }
    encoding::canonical_asset_id(origin_chain_id, vault, token)
}

fn check_amount(ctx: &ErrorCtx, params: &TransferParams) -> BridgeResult<()> {
    if params.amount.is_zero() {
        return Err(ctx
            .validation("zero value transfers are not allowed")
            .with_context("token", format!("{:?}", params.token)));
    }
    Ok(())
}

/// Builds withdrawal plans (L2 -> L1).
pub struct WithdrawalPlanner<'a> {
    pub client: &'a dyn ExecutionChainClient,
    pub contracts: &'a BridgeContracts,
    pub metrics: &'a BridgeMetrics,
    pub fee_cache: &'a TtlCell<FeeData>,
}

impl<'a> WithdrawalPlanner<'a> {
    /// Cheap validation, callable before any chain I/O.
    pub fn preflight(&self, route: WithdrawalRoute, params: &TransferParams) -> BridgeResult<()> {
        let ctx = ErrorCtx::new("withdrawals", "preflight");
        check_amount(&ctx, params)?;
        match route {
            WithdrawalRoute::NativeBase | WithdrawalRoute::NativeNonBase => {
                if !is_base_asset_alias(params.token) {
                    return Err(ctx
                        .validation("token must equal the base-asset alias for this route")
                        .with_context("route", route)
                        .with_context("token", format!("{:?}", params.token)));
                }
            }
            WithdrawalRoute::TokenNonBase => {
                if is_base_asset_alias(params.token) {
                    return Err(ctx
                        .validation("base-asset alias cannot take the token route")
                        .with_context("token", format!("{:?}", params.token)));
                }
            }
        }
        Ok(())
    }

    pub async fn build(&self, params: &TransferParams) -> BridgeResult<Plan<WithdrawalRoute>> {
        let route = select_withdrawal_route(params.token, self.contracts.base_asset_is_native());
        self.preflight(route, params)?;

        let ctx = ErrorCtx::new("withdrawals", "prepare");
        let sender = self.client.sender();
        let recipient = params.to.unwrap_or(sender);
        let overrides = params.fee_overrides.as_ref();

        let mut steps = Vec::new();
        let mut approvals = Vec::new();
        let mut approve_summary = None;

        let mut transfer_tx = match route {
            WithdrawalRoute::NativeBase | WithdrawalRoute::NativeNonBase => {
                let mut tx = encoding::base_token_withdraw(base_asset_system_address(), recipient);
                tx.set_value(params.amount);
                tx
            }
            WithdrawalRoute::TokenNonBase => {
                let router = self.contracts.l2_asset_router;
                // Independent reads, issued concurrently.
                let (allowance, asset_id) = futures::join!(
                    read_allowance(self.client, &ctx, params.token, sender, router),
                    resolve_asset_id(
                        self.client,
                        router,
                        self.contracts.l2_chain_id,
                        params.token,
                    )
                );
                let allowance = allowance?;
                if allowance < params.amount {
                    let mut approve_tx =
                        encoding::erc20_approve(params.token, router, params.amount);
                    approve_tx.set_from(sender);
                    let summary = resolve_fee_summary(
                        self.client,
                        self.fee_cache,
                        self.metrics,
                        &approve_tx,
                        overrides,
                        U256::from(DEFAULT_APPROVE_GAS),
                    )
                    .await;
                    if let Some(summary) = &summary {
                        apply_summary(&mut approve_tx, summary);
                    }
                    approve_summary = summary;
                    approvals.push(ApprovalNeed {
                        token: params.token,
                        spender: router,
                        amount: params.amount,
                    });
                    steps.push(PlanStep {
                        key: "approve".to_string(),
                        kind: StepKind::Approve,
                        description: format!(
                            "approve asset router {router:?} to spend {} of {:?}",
                            params.amount, params.token
                        ),
                        tx: approve_tx,
                    });
                }

                let transfer_data =
                    encoding::encode_transfer_data(params.amount, recipient, params.token);
                encoding::router_withdraw(router, asset_id, transfer_data)
            }
        };
        transfer_tx.set_from(sender);

        let transfer_summary = resolve_fee_summary(
            self.client,
            self.fee_cache,
            self.metrics,
            &transfer_tx,
            overrides,
            U256::from(DEFAULT_WITHDRAW_GAS),
        )
        .await;
        if let Some(summary) = &transfer_summary {
            apply_summary(&mut transfer_tx, summary);
        }
        steps.push(PlanStep {
            key: "transfer".to_string(),
            kind: StepKind::Transfer,
            description: format!(
                "withdraw {} of {:?} to {recipient:?} via {route}",
                params.amount, params.token
            ),
            tx: transfer_tx,
        });

        Ok(Plan {
            route,
            summary: combine_summaries(transfer_summary, approve_summary),
            steps,
            approvals,
        })
    }
}

/// Builds deposit plans (L1 -> L2).
pub struct DepositPlanner<'a> {
    pub client: &'a dyn ChainClient,
    pub contracts: &'a BridgeContracts,
    pub metrics: &'a BridgeMetrics,
    pub fee_cache: &'a TtlCell<FeeData>,
    /// Settlement-chain bridgehub, resolved by the caller.
    pub bridgehub: Address,
    /// Settlement chain id, used to derive canonical asset identifiers.
    pub l1_chain_id: u64,
}

impl<'a> DepositPlanner<'a> {
    pub fn preflight(&self, route: DepositRoute, params: &TransferParams) -> BridgeResult<()> {
        let ctx = ErrorCtx::new("deposits", "preflight");
        check_amount(&ctx, params)?;
        match route {
            DepositRoute::NativeBase | DepositRoute::TokenBase => {
                if params.token != self.contracts.l1_base_token {
                    return Err(ctx
                        .validation("token must equal the base asset for this route")
                        .with_context("route", route)
                        .with_context("token", format!("{:?}", params.token)));
                }
            }
            DepositRoute::TokenNonBase => {
                if params.token == self.contracts.l1_base_token {
                    return Err(ctx
                        .validation("base asset cannot take the token route")
                        .with_context("token", format!("{:?}", params.token)));
                }
            }
        }
        Ok(())
    }

    // Best-effort balance check; a read failure skips the check rather
    // than failing the plan.
    async fn check_balance(&self, route: DepositRoute, params: &TransferParams) -> BridgeResult<()> {
        let ctx = ErrorCtx::new("deposits", "preflight");
        let sender = self.client.sender();
        let balance = match route {
            DepositRoute::NativeBase => match self.client.native_balance(sender).await {
                Ok(balance) => balance,
                Err(e) => {
                    debug!("native balance lookup failed, skipping balance check: {e}");
                    return Ok(());
                }
            },
            DepositRoute::TokenBase | DepositRoute::TokenNonBase => {
                let call = encoding::erc20_balance_of(params.token, sender);
                match self.client.call(&call).await {
                    Ok(data) => encoding::decode_u256(&data, "balanceOf").unwrap_or(U256::MAX),
                    Err(e) => {
                        debug!("token balance lookup failed, skipping balance check: {e}");
                        return Ok(());
                    }
                }
            }
        };
        if balance < params.amount {
            return Err(ctx
                .validation("insufficient balance for deposit")
                .with_context("balance", balance)
                .with_context("amount", params.amount));
        }
        Ok(())
    }

    // Execution-chain gas price used to fund the request's base cost.
    async fn l2_gas_price(&self, overrides: Option<&FeeOverrides>) -> U256 {
        if let Some(fee) = overrides.and_then(|o| o.max_fee_per_gas) {
            return fee;
        }
        if let Some(cached) = self.fee_cache.get_if_valid().await {
            return cached.max_fee_per_gas;
        }
        match self.client.fee_data().await {
            Ok(data) => {
                self.fee_cache.update(data).await;
                data.max_fee_per_gas
            }
            Err(e) => {
                warn!("fee data unavailable, funding base cost with fallback gas price: {e}");
                U256::from(FALLBACK_L2_GAS_PRICE_WEI)
            }
        }
    }

    pub async fn build(&self, params: &TransferParams) -> BridgeResult<Plan<DepositRoute>> {
        let route = select_deposit_route(params.token, self.contracts.l1_base_token);
        self.preflight(route, params)?;
        self.check_balance(route, params).await?;

        let sender = self.client.sender();
        let recipient = params.to.unwrap_or(sender);
        let overrides = params.fee_overrides.as_ref();
        let chain_id = self.contracts.l2_chain_id;

        let transfer_data =
            encoding::encode_transfer_data(params.amount, recipient, params.token);
        let l2_gas_limit = estimate_l2_execution_gas(route, transfer_data.len());
        let base_cost = l2_gas_limit * self.l2_gas_price(overrides).await;

        let mut steps = Vec::new();
        let mut approvals = Vec::new();
        let mut approve_summary = None;

        // The two token routes escrow through the vault and need a
        // settlement-chain allowance: the deposited amount, plus the base
        // cost when fees are paid in the deposited token itself.
        let approval_amount = match route {
            DepositRoute::NativeBase => U256::zero(),
            DepositRoute::TokenBase => params.amount + base_cost,
            DepositRoute::TokenNonBase => params.amount,
        };
        if !approval_amount.is_zero() {
            let spender = self.contracts.l1_asset_router;
            let ctx = ErrorCtx::new("deposits", "prepare");
            let allowance =
                read_allowance(self.client, &ctx, params.token, sender, spender).await?;
            if allowance < approval_amount {
                let mut approve_tx =
                    encoding::erc20_approve(params.token, spender, approval_amount);
                approve_tx.set_from(sender);
                let summary = resolve_fee_summary(
                    self.client,
                    self.fee_cache,
                    self.metrics,
                    &approve_tx,
                    overrides,
                    U256::from(DEFAULT_APPROVE_GAS),
                )
                .await;
                if let Some(summary) = &summary {
                    apply_summary(&mut approve_tx, summary);
                }
                approve_summary = summary;
                approvals.push(ApprovalNeed {
                    token: params.token,
                    spender,
                    amount: approval_amount,
                });
                steps.push(PlanStep {
                    key: "approve".to_string(),
                    kind: StepKind::Approve,
                    description: format!(
                        "approve vault {spender:?} to spend {approval_amount} of {:?}",
                        params.token
                    ),
                    tx: approve_tx,
                });
            }
        }

        let mut transfer_tx = match route {
            DepositRoute::NativeBase => {
                let mint_value = params.amount + base_cost;
                let req = encoding::L2RequestDirect {
                    chain_id,
                    mint_value,
                    l2_contract: recipient,
                    l2_value: params.amount,
                    l2_calldata: Bytes::default(),
                    l2_gas_limit,
                    gas_per_pubdata: U256::from(DEFAULT_GAS_PER_PUBDATA),
                    refund_recipient: sender,
                };
                let mut tx = encoding::request_l2_transaction_direct(self.bridgehub, &req);
                tx.set_value(mint_value);
                tx
            }
            DepositRoute::TokenBase => {
                // Fees and value are both paid in the base token; nothing
                // rides on the transaction value.
                let req = encoding::L2RequestDirect {
                    chain_id,
                    mint_value: params.amount + base_cost,
                    l2_contract: recipient,
                    l2_value: params.amount,
                    l2_calldata: Bytes::default(),
                    l2_gas_limit,
                    gas_per_pubdata: U256::from(DEFAULT_GAS_PER_PUBDATA),
                    refund_recipient: sender,
                };
                encoding::request_l2_transaction_direct(self.bridgehub, &req)
            }
            DepositRoute::TokenNonBase => {
                let vault = self.contracts.l1_asset_router;
                let asset_id =
                    resolve_asset_id(self.client, vault, self.l1_chain_id, params.token).await;
                let req = encoding::L2RequestTwoBridges {
                    chain_id,
                    mint_value: base_cost,
                    l2_value: U256::zero(),
                    l2_gas_limit,
                    gas_per_pubdata: U256::from(DEFAULT_GAS_PER_PUBDATA),
                    refund_recipient: sender,
                    second_bridge: vault,
                    second_bridge_value: U256::zero(),
                    second_bridge_calldata: encoding::encode_second_bridge_calldata(
                        asset_id,
                        &transfer_data,
                    ),
                };
                let mut tx = encoding::request_l2_transaction_two_bridges(self.bridgehub, &req);
                if self.contracts.base_asset_is_native() {
                    tx.set_value(base_cost);
                }
                tx
            }
        };
        transfer_tx.set_from(sender);

        let transfer_summary = resolve_fee_summary(
            self.client,
            self.fee_cache,
            self.metrics,
            &transfer_tx,
            overrides,
            U256::from(DEFAULT_DEPOSIT_GAS),
        )
        .await;
        if let Some(summary) = &transfer_summary {
            apply_summary(&mut transfer_tx, summary);
        }
        steps.push(PlanStep {
            key: "transfer".to_string(),
            kind: StepKind::Transfer,
            description: format!(
                "deposit {} of {:?} to {recipient:?} via {route}",
                params.amount, params.token
            ),
            tx: transfer_tx,
        });

        Ok(Plan {
            route,
            summary: combine_summaries(transfer_summary, approve_summary),
            steps,
            approvals,
        })
    }
}
