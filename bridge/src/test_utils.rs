// Copyright (c) The Rollup Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared constructors for receipts and bridge logs used across tests.

use ethers::abi::{encode, Token};
use ethers::types::{Address, Bytes, Log, TransactionReceipt, H256, U64};
use ethers::utils::keccak256;

use crate::chain::{CrossLayerLogProof, CrossLayerReceipt};
use crate::encoding::{
    LEGACY_MESSAGE_SENT_TOPIC, MESSAGE_SENT_TOPIC, REQUEST_ASSIGNED_TOPIC,
    REQUEST_SUCCEEDED_TOPIC, TRANSACTION_REQUESTED_TOPIC,
};

pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

fn address_topic(address: Address) -> H256 {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    H256::from(word)
}

pub fn make_receipt(status: u64, logs: Vec<Log>) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: H256::repeat_byte(0xaa),
        status: Some(U64::from(status)),
        block_number: Some(U64::from(1234)),
        logs,
        ..Default::default()
    }
}

pub fn cross_receipt(
    receipt: TransactionReceipt,
    batch_number: Option<u64>,
    batch_tx_index: Option<u64>,
) -> CrossLayerReceipt {
    CrossLayerReceipt {
        receipt,
        batch_number: batch_number.map(U64::from),
        batch_tx_index: batch_tx_index.map(U64::from),
    }
}

pub fn sample_proof(message_index: u64) -> CrossLayerLogProof {
    CrossLayerLogProof {
        id: message_index,
        proof: vec![H256::repeat_byte(0x01), H256::repeat_byte(0x02)],
        root: H256::repeat_byte(0x03),
    }
}

/// Cross-layer message log in the current shape: sender and message hash
/// indexed, message bytes in data.
pub fn message_sent_log(emitter: Address, sender: Address, message: &Bytes) -> Log {
    Log {
        address: emitter,
        topics: vec![
            *MESSAGE_SENT_TOPIC,
            address_topic(sender),
            H256::from(keccak256(message)),
        ],
        data: Bytes::from(encode(&[Token::Bytes(message.to_vec())])),
        ..Default::default()
    }
}

/// Cross-layer message log in the legacy shape: everything in data.
pub fn legacy_message_sent_log(emitter: Address, sender: Address, message: &Bytes) -> Log {
    Log {
        address: emitter,
        topics: vec![*LEGACY_MESSAGE_SENT_TOPIC],
        data: Bytes::from(encode(&[
            Token::Address(sender),
            Token::Bytes(message.to_vec()),
        ])),
        ..Default::default()
    }
}

/// Primary bridge-entry event: the execution-chain hash is the second
/// data word.
pub fn transaction_requested_log(emitter: Address, l2_hash: H256) -> Log {
    Log {
        address: emitter,
        topics: vec![*TRANSACTION_REQUESTED_TOPIC],
        data: Bytes::from(encode(&[
            Token::Uint(1u64.into()),
            Token::FixedBytes(l2_hash.as_bytes().to_vec()),
            Token::Uint(9_999_999u64.into()),
        ])),
        ..Default::default()
    }
}

/// Legacy assignment event: hash indexed at topic position 2.
pub fn request_assigned_log(emitter: Address, sender: Address, l2_hash: H256) -> Log {
    Log {
        address: emitter,
        topics: vec![*REQUEST_ASSIGNED_TOPIC, address_topic(sender), l2_hash],
        data: Bytes::default(),
        ..Default::default()
    }
}

/// Legacy success event: hash indexed at topic position 3.
pub fn request_succeeded_log(emitter: Address, from: Address, to: Address, l2_hash: H256) -> Log {
    Log {
        address: emitter,
        topics: vec![
            *REQUEST_SUCCEEDED_TOPIC,
            address_topic(from),
            address_topic(to),
            l2_hash,
        ],
        data: Bytes::default(),
        ..Default::default()
    }
}
