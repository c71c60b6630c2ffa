// Copyright (c) The Rollup Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Wiring of chain clients, contracts, metrics and shared caches into a
//! bridge context consumed by the [`crate::deposit::Deposits`] and
//! [`crate::withdrawal::Withdrawals`] surfaces.

use std::sync::Arc;

use anyhow::anyhow;
use ethers::types::Address;
use tracing::{info, warn};

use rollup_bridge_types::BridgeResult;

use crate::cache::{FinalizeHashCache, TtlCell};
use crate::chain::{ChainClient, ExecutionChainClient, FeeData};
use crate::config::BridgeContracts;
use crate::metrics::BridgeMetrics;
use crate::quote::FEE_CACHE_SECS;

// Chain ids and the bridgehub address are effectively immutable; cache
// them for a long time.
const TOPOLOGY_CACHE_SECS: u64 = 3_600;

pub struct BridgeCtx {
    pub l1: Arc<dyn ChainClient>,
    pub l2: Arc<dyn ExecutionChainClient>,
    pub contracts: BridgeContracts,
    pub metrics: Arc<BridgeMetrics>,
    pub(crate) l1_fee_cache: TtlCell<FeeData>,
    pub(crate) l2_fee_cache: TtlCell<FeeData>,
    pub(crate) bridgehub_cache: TtlCell<Address>,
    pub(crate) l1_chain_id_cache: TtlCell<u64>,
    pub(crate) finalize_cache: FinalizeHashCache,
}

impl BridgeCtx {
    pub fn new(
        l1: Arc<dyn ChainClient>,
        l2: Arc<dyn ExecutionChainClient>,
        contracts: BridgeContracts,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        BridgeCtx {
            l1,
            l2,
            contracts,
            metrics,
            l1_fee_cache: TtlCell::with_secs(FEE_CACHE_SECS),
            l2_fee_cache: TtlCell::with_secs(FEE_CACHE_SECS),
            bridgehub_cache: TtlCell::with_secs(TOPOLOGY_CACHE_SECS),
            l1_chain_id_cache: TtlCell::with_secs(TOPOLOGY_CACHE_SECS),
            finalize_cache: FinalizeHashCache::new(),
        }
    }

    /// Validate the configured chain ids against the live endpoints and
    /// log connection info.
    pub async fn describe(&self, expected_l1_chain_id: Option<u64>) -> anyhow::Result<()> {
        let l1_chain_id = self.l1.chain_id().await?;
        let l2_chain_id = self.l2.chain_id().await?;

        if let Some(expected) = expected_l1_chain_id {
            if l1_chain_id != expected {
                return Err(anyhow!(
                    "settlement chain id mismatch: expected {expected}, got {l1_chain_id}. \
                     This could indicate connecting to the wrong network!"
                ));
            }
            info!("settlement client connected to chain {l1_chain_id} (verified)");
        } else {
            warn!(
                "settlement client connected to chain {l1_chain_id} \
                 (NOT VERIFIED - no expected chain id set)"
            );
        }

        if l2_chain_id != self.contracts.l2_chain_id {
            return Err(anyhow!(
                "execution chain id mismatch: configured {}, got {l2_chain_id}",
                self.contracts.l2_chain_id
            ));
        }
        info!("execution client connected to chain {l2_chain_id} (verified)");
        Ok(())
    }

    pub(crate) async fn bridgehub(&self) -> BridgeResult<Address> {
        if let Some(cached) = self.bridgehub_cache.get_if_valid().await {
            return Ok(cached);
        }
        let address = self.l2.bridgehub_address().await?;
        self.bridgehub_cache.update(address).await;
        Ok(address)
    }

    pub(crate) async fn l1_chain_id(&self) -> BridgeResult<u64> {
        if let Some(cached) = self.l1_chain_id_cache.get_if_valid().await {
            return Ok(cached);
        }
        let chain_id = self.l1.chain_id().await?;
        self.l1_chain_id_cache.update(chain_id).await;
        Ok(chain_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollup_bridge_types::base_types::native_asset_sentinel;

    use crate::mock_client::MockChainClient;

    fn ctx(l1_chain_id: u64, l2_chain_id: u64) -> BridgeCtx {
        let l1 = Arc::new(MockChainClient::new().with_chain_id(l1_chain_id));
        let l2 = Arc::new(MockChainClient::new().with_chain_id(l2_chain_id));
        BridgeCtx::new(
            l1,
            l2,
            BridgeContracts {
                l1_asset_router: Address::repeat_byte(0x11),
                l2_asset_router: Address::repeat_byte(0x22),
                l1_base_token: native_asset_sentinel(),
                l2_chain_id: 300,
            },
            Arc::new(BridgeMetrics::new_for_testing()),
        )
    }

    #[tokio::test]
    async fn test_describe_validates_chain_ids() {
        crate::test_utils::init_test_tracing();
        ctx(1, 300).describe(Some(1)).await.unwrap();
        ctx(1, 300).describe(None).await.unwrap();

        // Wrong settlement chain.
        assert!(ctx(5, 300).describe(Some(1)).await.is_err());
        // Wrong execution chain.
        assert!(ctx(1, 299).describe(None).await.is_err());
    }

    #[tokio::test]
    async fn test_bridgehub_is_cached() {
        let ctx = ctx(1, 300);
        let first = ctx.bridgehub().await.unwrap();
        let second = ctx.bridgehub().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(ctx.bridgehub_cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_l1_chain_id_is_cached() {
        let ctx = ctx(1, 300);
        assert_eq!(ctx.l1_chain_id().await.unwrap(), 1);
        assert_eq!(ctx.l1_chain_id().await.unwrap(), 1);
        assert_eq!(ctx.l1_chain_id_cache.stats().hits, 1);
    }
}
