// Copyright (c) The Rollup Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! The chain-client capability consumed by the engine.
//!
//! One implementation per underlying client library translates this
//! interface to concrete RPC calls (see [`crate::ethers_client`]); the
//! engine itself never talks to a transport directly.

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256, U64};
use serde::{Deserialize, Serialize};

use rollup_bridge_types::{BridgeError, BridgeResult, ErrorKind};

/// Market fee estimate for EIP-1559 style transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeData {
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

/// A transaction receipt enriched with the execution chain's batch
/// coordinates. Batch fields stay `None` until the transaction has been
/// assigned to a batch.
#[derive(Debug, Clone)]
pub struct CrossLayerReceipt {
    pub receipt: TransactionReceipt,
    pub batch_number: Option<U64>,
    pub batch_tx_index: Option<U64>,
}

/// Inclusion proof for one cross-layer log, as returned by the execution
/// chain's proof RPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossLayerLogProof {
    /// Index of the message within its batch.
    pub id: u64,
    pub proof: Vec<H256>,
    pub root: H256,
}

/// Capability interface over one chain side: contract reads, simulation,
/// transaction submission, receipts and fee queries. Implementations must
/// tolerate concurrent independent calls.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// The signing account transactions are sent from.
    fn sender(&self) -> Address;

    async fn chain_id(&self) -> BridgeResult<u64>;

    /// Execute a read or simulation call without mutating state. Reverts
    /// surface as `Contract` errors carrying decoded revert info.
    async fn call(&self, tx: &TypedTransaction) -> BridgeResult<Bytes>;

    async fn estimate_gas(&self, tx: &TypedTransaction) -> BridgeResult<U256>;

    async fn fee_data(&self) -> BridgeResult<FeeData>;

    /// Sign and submit. Returns the transaction hash without waiting for
    /// inclusion.
    async fn send_transaction(&self, tx: TypedTransaction) -> BridgeResult<H256>;

    async fn transaction_receipt(&self, hash: H256) -> BridgeResult<Option<TransactionReceipt>>;

    /// Next pending nonce of the sender. Fetched once per plan execution
    /// and incremented locally afterwards.
    async fn next_nonce(&self) -> BridgeResult<U256>;

    async fn native_balance(&self, address: Address) -> BridgeResult<U256>;
}

/// Chain-specific extensions available on the execution chain only.
#[async_trait]
pub trait ExecutionChainClient: ChainClient {
    /// Address of the settlement-chain bridgehub, as known by the
    /// execution chain.
    async fn bridgehub_address(&self) -> BridgeResult<Address>;

    /// Receipt with batch coordinates attached.
    async fn cross_layer_receipt(&self, hash: H256) -> BridgeResult<Option<CrossLayerReceipt>>;

    /// Inclusion proof for the `index`-th cross-layer message of the
    /// transaction. `None` while the batch data is not yet available.
    async fn cross_layer_log_proof(
        &self,
        hash: H256,
        index: u64,
    ) -> BridgeResult<Option<CrossLayerLogProof>>;
}

// Message fragments that the two underlying client libraries use to report
// a missing receipt. The same logical condition arrives as different error
// names, codes and phrasings, so classification is by pattern.
const NOT_FOUND_PATTERNS: &[&str] = &[
    "not found",
    "could not be found",
    "cannot be found",
    "unknown transaction",
    "transactionreceiptnotfound",
    "transactionnotfound",
    "resource not found",
    "-32001",
];

/// Whether an error from a receipt lookup means "the transaction is not
/// known to the node yet" (an expected transient condition) rather than a
/// genuine transport failure.
pub fn is_receipt_not_found(err: &BridgeError) -> bool {
    if err.is_kind(ErrorKind::State) {
        return true;
    }
    if !err.is_kind(ErrorKind::Rpc) {
        return false;
    }
    let message = err.message().to_lowercase();
    if NOT_FOUND_PATTERNS.iter().any(|p| message.contains(p)) {
        return true;
    }
    err.context()
        .get("code")
        .map(|code| code == "-32001")
        .unwrap_or(false)
}
