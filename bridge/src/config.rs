// Copyright (c) The Rollup Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

use std::str::FromStr;

use ethers::types::Address;
use serde::{Deserialize, Serialize};

use rollup_bridge_types::base_types::native_asset_sentinel;
use rollup_bridge_types::{BridgeResult, ErrorCtx};

/// Settlement-chain (L1) side of the bridge configuration.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SettlementConfig {
    // Rpc url for the settlement-chain fullnode.
    pub rpc_url: String,
    // The asset router contract: deposit vault spender, withdrawal
    // finalization target and finalization registry.
    pub asset_router_address: String,
    // The expected chain id on the settlement side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_chain_id: Option<u64>,
}

/// Execution-chain (L2) side of the bridge configuration.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExecutionConfig {
    // Rpc url for the execution-chain fullnode.
    pub rpc_url: String,
    // The asset router contract on the execution chain (token withdrawals).
    pub asset_router_address: String,
    // Settlement-chain address of the execution chain's base asset.
    // Unset means the base asset is the canonical native asset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_token_address: Option<String>,
    // The execution chain id, used in withdrawal keys and proofs.
    pub chain_id: u64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BridgeConfig {
    pub settlement: SettlementConfig,
    pub execution: ExecutionConfig,
    // Status polling interval for wait loops, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
}

/// Parsed and checked contract addresses the engine works against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BridgeContracts {
    pub l1_asset_router: Address,
    pub l2_asset_router: Address,
    /// Settlement-chain address of the execution chain's base asset; the
    /// native sentinel when the base asset is the canonical native asset.
    pub l1_base_token: Address,
    pub l2_chain_id: u64,
}

impl BridgeContracts {
    pub fn base_asset_is_native(&self) -> bool {
        self.l1_base_token == native_asset_sentinel()
    }
}

impl BridgeConfig {
    /// Validate the raw config into checked contract addresses.
    pub fn validate(&self) -> BridgeResult<BridgeContracts> {
        let ctx = ErrorCtx::new("config", "validate");
        let parse = |field: &'static str, raw: &str| {
            Address::from_str(raw).map_err(|e| {
                ctx.validation(format!("invalid address in {field}: {raw}"))
                    .with_cause(e)
            })
        };
        let l1_asset_router = parse(
            "settlement.asset-router-address",
            &self.settlement.asset_router_address,
        )?;
        let l2_asset_router = parse(
            "execution.asset-router-address",
            &self.execution.asset_router_address,
        )?;
        let l1_base_token = match &self.execution.base_token_address {
            Some(raw) => parse("execution.base-token-address", raw)?,
            None => native_asset_sentinel(),
        };
        if self.execution.chain_id == 0 {
            return Err(ctx.validation("execution.chain-id must be nonzero"));
        }
        Ok(BridgeContracts {
            l1_asset_router,
            l2_asset_router,
            l1_base_token,
            l2_chain_id: self.execution.chain_id,
        })
    }
}
