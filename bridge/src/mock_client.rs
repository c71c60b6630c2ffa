// Copyright (c) The Rollup Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! A programmable mock [`ChainClient`] for tests.
//!
//! Read/simulation responses are keyed by (target address, selector) so a
//! test can program each contract entry point independently, either as a
//! persistent response or as a one-shot queue. Every submitted
//! transaction is recorded so tests can assert on exactly what was sent,
//! including that nothing was.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256, U64};

use rollup_bridge_types::{BridgeError, BridgeResult, ErrorKind, RevertInfo};

use crate::chain::{ChainClient, CrossLayerLogProof, CrossLayerReceipt, ExecutionChainClient, FeeData};

type CallKey = (Address, [u8; 4]);

// Errors are stored in rebuildable form because BridgeError is not Clone.
#[derive(Debug, Clone)]
struct StoredErr {
    kind: ErrorKind,
    message: String,
    revert: Option<RevertInfo>,
}

impl StoredErr {
    fn rebuild(&self, operation: &'static str) -> BridgeError {
        let mut err = BridgeError::new(self.kind, "mock", operation, self.message.clone());
        if let Some(revert) = &self.revert {
            err = err.with_revert(revert.clone());
        }
        err
    }
}

#[derive(Debug, Default)]
struct Inner {
    persistent_calls: HashMap<CallKey, Bytes>,
    call_queue: HashMap<CallKey, VecDeque<Result<Bytes, StoredErr>>>,
    call_log: Vec<CallKey>,

    estimated_gas: Option<U256>,
    estimate_err: Option<String>,

    fee_data: Option<FeeData>,
    fee_err: Option<String>,
    fee_data_calls: u64,

    send_err: Option<StoredErr>,
    sent: Vec<TypedTransaction>,
    // Receipt automatically attached to each sent transaction. None means
    // sent transactions stay pending.
    auto_receipt_status: Option<u64>,

    receipts: HashMap<H256, TransactionReceipt>,
    receipt_errors: HashMap<H256, StoredErr>,
    cross_receipts: HashMap<H256, CrossLayerReceipt>,
    proofs: HashMap<(H256, u64), CrossLayerLogProof>,

    next_nonce: U256,
    balances: HashMap<Address, U256>,
}

pub struct MockChainClient {
    inner: Mutex<Inner>,
    sender: Address,
    chain_id: u64,
    bridgehub: Address,
}

fn call_key(tx: &TypedTransaction) -> CallKey {
    let to = tx
        .to()
        .and_then(|t| t.as_address())
        .copied()
        .unwrap_or_default();
    let mut selector = [0u8; 4];
    if let Some(data) = tx.data() {
        if data.len() >= 4 {
            selector.copy_from_slice(&data[..4]);
        }
    }
    (to, selector)
}

impl Default for MockChainClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChainClient {
    pub fn new() -> Self {
        MockChainClient {
            inner: Mutex::new(Inner {
                auto_receipt_status: Some(1),
                next_nonce: U256::from(7),
                ..Default::default()
            }),
            sender: Address::repeat_byte(0xfe),
            chain_id: 31337,
            bridgehub: Address::repeat_byte(0xbb),
        }
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn with_sender(mut self, sender: Address) -> Self {
        self.sender = sender;
        self
    }

    // ---------- programming ----------

    /// Persistent response for every call hitting (to, selector).
    pub fn set_call_response(&self, to: Address, selector: [u8; 4], response: Bytes) {
        self.inner
            .lock()
            .unwrap()
            .persistent_calls
            .insert((to, selector), response);
    }

    /// One-shot response consumed before any persistent entry.
    pub fn push_call_response(&self, to: Address, selector: [u8; 4], response: Bytes) {
        self.inner
            .lock()
            .unwrap()
            .call_queue
            .entry((to, selector))
            .or_default()
            .push_back(Ok(response));
    }

    /// One-shot RPC failure for (to, selector).
    pub fn push_call_error(&self, to: Address, selector: [u8; 4], message: &str) {
        self.inner
            .lock()
            .unwrap()
            .call_queue
            .entry((to, selector))
            .or_default()
            .push_back(Err(StoredErr {
                kind: ErrorKind::Rpc,
                message: message.to_string(),
                revert: None,
            }));
    }

    /// One-shot contract revert for (to, selector).
    pub fn push_call_revert(&self, to: Address, selector: [u8; 4], revert: RevertInfo) {
        self.inner
            .lock()
            .unwrap()
            .call_queue
            .entry((to, selector))
            .or_default()
            .push_back(Err(StoredErr {
                kind: ErrorKind::Contract,
                message: "execution reverted".to_string(),
                revert: Some(revert),
            }));
    }

    pub fn set_estimated_gas(&self, gas: U256) {
        self.inner.lock().unwrap().estimated_gas = Some(gas);
    }

    pub fn fail_estimate_gas(&self, message: &str) {
        self.inner.lock().unwrap().estimate_err = Some(message.to_string());
    }

    pub fn set_fee_data(&self, data: FeeData) {
        self.inner.lock().unwrap().fee_data = Some(data);
    }

    pub fn fail_fee_data(&self, message: &str) {
        self.inner.lock().unwrap().fee_err = Some(message.to_string());
    }

    pub fn fail_send(&self, message: &str) {
        self.inner.lock().unwrap().send_err = Some(StoredErr {
            kind: ErrorKind::Execution,
            message: message.to_string(),
            revert: None,
        });
    }

    /// Receipt status automatically attached to sent transactions;
    /// `None` keeps them pending.
    pub fn set_auto_receipt_status(&self, status: Option<u64>) {
        self.inner.lock().unwrap().auto_receipt_status = status;
    }

    pub fn set_receipt(&self, hash: H256, receipt: TransactionReceipt) {
        self.inner.lock().unwrap().receipts.insert(hash, receipt);
    }

    pub fn fail_receipt_lookup(&self, hash: H256, kind: ErrorKind, message: &str) {
        self.inner.lock().unwrap().receipt_errors.insert(
            hash,
            StoredErr {
                kind,
                message: message.to_string(),
                revert: None,
            },
        );
    }

    pub fn set_cross_receipt(&self, hash: H256, receipt: CrossLayerReceipt) {
        self.inner.lock().unwrap().cross_receipts.insert(hash, receipt);
    }

    pub fn set_proof(&self, hash: H256, index: u64, proof: CrossLayerLogProof) {
        self.inner.lock().unwrap().proofs.insert((hash, index), proof);
    }

    pub fn set_next_nonce(&self, nonce: U256) {
        self.inner.lock().unwrap().next_nonce = nonce;
    }

    pub fn set_native_balance(&self, address: Address, balance: U256) {
        self.inner.lock().unwrap().balances.insert(address, balance);
    }

    // ---------- inspection ----------

    pub fn sent_transactions(&self) -> Vec<TypedTransaction> {
        self.inner.lock().unwrap().sent.clone()
    }

    pub fn sent_count(&self) -> usize {
        self.inner.lock().unwrap().sent.len()
    }

    pub fn fee_data_calls(&self) -> u64 {
        self.inner.lock().unwrap().fee_data_calls
    }

    /// Number of read/simulation calls hitting (to, selector).
    pub fn call_count(&self, to: Address, selector: [u8; 4]) -> usize {
        self.inner
            .lock()
            .unwrap()
            .call_log
            .iter()
            .filter(|key| **key == (to, selector))
            .count()
    }

    /// Hash the mock assigned to the `index`-th sent transaction.
    pub fn sent_hash(&self, index: usize) -> H256 {
        H256::from_low_u64_be(0x1000 + index as u64)
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn chain_id(&self) -> BridgeResult<u64> {
        Ok(self.chain_id)
    }

    async fn call(&self, tx: &TypedTransaction) -> BridgeResult<Bytes> {
        let key = call_key(tx);
        let mut inner = self.inner.lock().unwrap();
        inner.call_log.push(key);
        if let Some(queue) = inner.call_queue.get_mut(&key) {
            if let Some(front) = queue.pop_front() {
                return front.map_err(|e| e.rebuild("call"));
            }
        }
        if let Some(response) = inner.persistent_calls.get(&key) {
            return Ok(response.clone());
        }
        Err(BridgeError::new(
            ErrorKind::Internal,
            "mock",
            "call",
            format!("no mock response for call to {:?} selector {:02x?}", key.0, key.1),
        ))
    }

    async fn estimate_gas(&self, _tx: &TypedTransaction) -> BridgeResult<U256> {
        let inner = self.inner.lock().unwrap();
        if let Some(message) = &inner.estimate_err {
            return Err(BridgeError::new(
                ErrorKind::Rpc,
                "mock",
                "estimate_gas",
                message.clone(),
            ));
        }
        Ok(inner.estimated_gas.unwrap_or_else(|| U256::from(100_000)))
    }

    async fn fee_data(&self) -> BridgeResult<FeeData> {
        let mut inner = self.inner.lock().unwrap();
        inner.fee_data_calls += 1;
        if let Some(message) = &inner.fee_err {
            return Err(BridgeError::new(
                ErrorKind::Rpc,
                "mock",
                "fee_data",
                message.clone(),
            ));
        }
        inner.fee_data.ok_or_else(|| {
            BridgeError::new(ErrorKind::Rpc, "mock", "fee_data", "no fee data programmed")
        })
    }

    async fn send_transaction(&self, tx: TypedTransaction) -> BridgeResult<H256> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(err) = &inner.send_err {
            return Err(err.rebuild("send_transaction"));
        }
        let index = inner.sent.len();
        let hash = H256::from_low_u64_be(0x1000 + index as u64);
        inner.sent.push(tx);
        if let Some(status) = inner.auto_receipt_status {
            let receipt = TransactionReceipt {
                transaction_hash: hash,
                status: Some(U64::from(status)),
                block_number: Some(U64::from(100 + index as u64)),
                ..Default::default()
            };
            inner.receipts.insert(hash, receipt);
        }
        Ok(hash)
    }

    async fn transaction_receipt(&self, hash: H256) -> BridgeResult<Option<TransactionReceipt>> {
        let inner = self.inner.lock().unwrap();
        if let Some(err) = inner.receipt_errors.get(&hash) {
            return Err(err.rebuild("transaction_receipt"));
        }
        Ok(inner.receipts.get(&hash).cloned())
    }

    async fn next_nonce(&self) -> BridgeResult<U256> {
        Ok(self.inner.lock().unwrap().next_nonce)
    }

    async fn native_balance(&self, address: Address) -> BridgeResult<U256> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .balances
            .get(&address)
            .copied()
            .unwrap_or(U256::MAX))
    }
}

#[async_trait]
impl ExecutionChainClient for MockChainClient {
    async fn bridgehub_address(&self) -> BridgeResult<Address> {
        Ok(self.bridgehub)
    }

    async fn cross_layer_receipt(&self, hash: H256) -> BridgeResult<Option<CrossLayerReceipt>> {
        let inner = self.inner.lock().unwrap();
        if let Some(err) = inner.receipt_errors.get(&hash) {
            return Err(err.rebuild("cross_layer_receipt"));
        }
        Ok(inner.cross_receipts.get(&hash).cloned())
    }

    async fn cross_layer_log_proof(
        &self,
        hash: H256,
        index: u64,
    ) -> BridgeResult<Option<CrossLayerLogProof>> {
        Ok(self.inner.lock().unwrap().proofs.get(&(hash, index)).cloned())
    }
}
