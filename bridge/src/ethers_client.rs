// Copyright (c) The Rollup Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! The one library-specific adapter: translates the [`ChainClient`]
//! capability to ethers-rs. All transaction-shape glue and revert-data
//! extraction for this client library lives here and nowhere else.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::providers::{Middleware, MiddlewareError};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, BlockNumber, Bytes, TransactionReceipt, H256, U256, U64};
use serde_json::Value;

use rollup_bridge_types::{BridgeError, BridgeResult, ErrorCtx, RevertInfo};

use crate::chain::{ChainClient, CrossLayerLogProof, CrossLayerReceipt, ExecutionChainClient, FeeData};

/// Settlement- or execution-chain client backed by any ethers
/// [`Middleware`] stack (typically a `SignerMiddleware` over an HTTP
/// provider).
pub struct EthersChainClient<M> {
    inner: Arc<M>,
    sender: Address,
}

impl<M> EthersChainClient<M> {
    pub fn new(inner: Arc<M>, sender: Address) -> Self {
        EthersChainClient { inner, sender }
    }
}

// Pull raw revert bytes out of a JSON-RPC error `data` field; clients
// ship it either as a bare hex string or nested under "data"/"message".
fn revert_bytes(data: &Value) -> Option<Vec<u8>> {
    match data {
        Value::String(s) => {
            let stripped = s.strip_prefix("0x")?;
            ethers::utils::hex::decode(stripped).ok()
        }
        Value::Object(map) => map.get("data").and_then(revert_bytes),
        _ => None,
    }
}

fn classify_middleware_error<E: MiddlewareError>(
    ctx: &ErrorCtx,
    operation_detail: &str,
    err: E,
) -> BridgeError {
    if let Some(rpc_err) = err.as_error_response() {
        if let Some(bytes) = rpc_err.data.as_ref().and_then(revert_bytes) {
            return ctx
                .contract(format!("{operation_detail} reverted: {}", rpc_err.message))
                .with_revert(RevertInfo::from_return_data(&bytes));
        }
        let lowered = rpc_err.message.to_lowercase();
        if lowered.contains("revert") {
            return ctx
                .contract(format!("{operation_detail} reverted: {}", rpc_err.message))
                .with_revert(RevertInfo::from_reason(rpc_err.message.clone()));
        }
        return ctx
            .rpc(format!("{operation_detail} failed: {}", rpc_err.message))
            .with_context("code", rpc_err.code);
    }
    ctx.rpc(format!("{operation_detail} failed: {err}"))
}

#[async_trait]
impl<M: Middleware + 'static> ChainClient for EthersChainClient<M> {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn chain_id(&self) -> BridgeResult<u64> {
        let ctx = ErrorCtx::new("chain", "chain_id");
        let chain_id = self
            .inner
            .get_chainid()
            .await
            .map_err(|e| classify_middleware_error(&ctx, "chain id query", e))?;
        Ok(chain_id.as_u64())
    }

    async fn call(&self, tx: &TypedTransaction) -> BridgeResult<Bytes> {
        let ctx = ErrorCtx::new("chain", "call");
        self.inner
            .call(tx, None)
            .await
            .map_err(|e| classify_middleware_error(&ctx, "call", e))
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> BridgeResult<U256> {
        let ctx = ErrorCtx::new("chain", "estimate_gas");
        self.inner
            .estimate_gas(tx, None)
            .await
            .map_err(|e| classify_middleware_error(&ctx, "gas estimation", e))
    }

    async fn fee_data(&self) -> BridgeResult<FeeData> {
        let ctx = ErrorCtx::new("chain", "fee_data");
        let (max_fee_per_gas, max_priority_fee_per_gas) = self
            .inner
            .estimate_eip1559_fees(None)
            .await
            .map_err(|e| classify_middleware_error(&ctx, "fee estimation", e))?;
        Ok(FeeData {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        })
    }

    async fn send_transaction(&self, tx: TypedTransaction) -> BridgeResult<H256> {
        let ctx = ErrorCtx::new("chain", "send_transaction");
        let pending = self
            .inner
            .send_transaction(tx, None)
            .await
            .map_err(|e| classify_middleware_error(&ctx, "transaction submission", e))?;
        Ok(*pending)
    }

    async fn transaction_receipt(&self, hash: H256) -> BridgeResult<Option<TransactionReceipt>> {
        let ctx = ErrorCtx::new("chain", "transaction_receipt");
        self.inner
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| classify_middleware_error(&ctx, "receipt lookup", e))
    }

    async fn next_nonce(&self) -> BridgeResult<U256> {
        let ctx = ErrorCtx::new("chain", "next_nonce");
        self.inner
            .get_transaction_count(self.sender, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| classify_middleware_error(&ctx, "nonce lookup", e))
    }

    async fn native_balance(&self, address: Address) -> BridgeResult<U256> {
        let ctx = ErrorCtx::new("chain", "native_balance");
        self.inner
            .get_balance(address, None)
            .await
            .map_err(|e| classify_middleware_error(&ctx, "balance lookup", e))
    }
}

#[async_trait]
impl<M: Middleware + 'static> ExecutionChainClient for EthersChainClient<M> {
    async fn bridgehub_address(&self) -> BridgeResult<Address> {
        let ctx = ErrorCtx::new("chain", "bridgehub_address");
        self.inner
            .provider()
            .request("zks_getBridgehubContract", ())
            .await
            .map_err(|e| ctx.rpc(format!("bridgehub lookup failed: {e}")))
    }

    async fn cross_layer_receipt(&self, hash: H256) -> BridgeResult<Option<CrossLayerReceipt>> {
        let ctx = ErrorCtx::new("chain", "cross_layer_receipt");
        let raw: Option<Value> = self
            .inner
            .provider()
            .request("eth_getTransactionReceipt", [hash])
            .await
            .map_err(|e| ctx.rpc(format!("receipt lookup failed: {e}")))?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let receipt: TransactionReceipt = serde_json::from_value(raw.clone())
            .map_err(|e| ctx.internal("receipt did not deserialize").with_cause(e))?;
        // Batch coordinates are chain-specific receipt extensions; null
        // until the transaction is sealed into a batch.
        let batch_number = raw
            .get("l1BatchNumber")
            .and_then(|v| serde_json::from_value::<Option<U64>>(v.clone()).ok())
            .flatten();
        let batch_tx_index = raw
            .get("l1BatchTxIndex")
            .and_then(|v| serde_json::from_value::<Option<U64>>(v.clone()).ok())
            .flatten();
        Ok(Some(CrossLayerReceipt {
            receipt,
            batch_number,
            batch_tx_index,
        }))
    }

    async fn cross_layer_log_proof(
        &self,
        hash: H256,
        index: u64,
    ) -> BridgeResult<Option<CrossLayerLogProof>> {
        let ctx = ErrorCtx::new("chain", "cross_layer_log_proof");
        self.inner
            .provider()
            .request("zks_getL2ToL1LogProof", (hash, index))
            .await
            .map_err(|e| ctx.rpc(format!("log proof lookup failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_revert_bytes_from_hex_string() {
        let data = json!("0xdeadbeef");
        assert_eq!(revert_bytes(&data), Some(vec![0xde, 0xad, 0xbe, 0xef]));
    }

    #[test]
    fn test_revert_bytes_from_nested_object() {
        let data = json!({ "data": "0x08c379a0" });
        assert_eq!(revert_bytes(&data), Some(vec![0x08, 0xc3, 0x79, 0xa0]));
    }

    #[test]
    fn test_revert_bytes_rejects_garbage() {
        assert_eq!(revert_bytes(&json!("not-hex")), None);
        assert_eq!(revert_bytes(&json!(42)), None);
        assert_eq!(revert_bytes(&json!({ "other": "0x00" })), None);
    }

    #[test]
    fn test_cross_layer_proof_deserializes() {
        let proof: CrossLayerLogProof = serde_json::from_value(json!({
            "id": 3,
            "proof": [format!("0x{}", "11".repeat(32))],
            "root": format!("0x{}", "22".repeat(32)),
        }))
        .unwrap();
        assert_eq!(proof.id, 3);
        assert_eq!(proof.proof.len(), 1);
    }
}
