// Copyright (c) The Rollup Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Calldata construction and log decoding for the handful of bridge
//! contract entry points the engine consumes. Selectors and topics are
//! derived from their signatures at first use; contract binding
//! generation is out of scope.

use ethers::abi::{decode, encode, ParamType, Token};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Eip1559TransactionRequest, Log, H256, U256};
use ethers::utils::{id, keccak256};
use once_cell::sync::Lazy;

use rollup_bridge_types::{BridgeResult, ErrorCtx};

fn selector_call(signature: &str, tokens: &[Token]) -> Bytes {
    let mut out = id(signature).to_vec();
    out.extend(encode(tokens));
    Bytes::from(out)
}

/// A read/simulation or submission candidate against `to` with calldata.
pub fn contract_call(to: Address, data: Bytes) -> TypedTransaction {
    TypedTransaction::Eip1559(Eip1559TransactionRequest::new().to(to).data(data))
}

// ---------- ERC-20 ----------

pub fn erc20_allowance(token: Address, owner: Address, spender: Address) -> TypedTransaction {
    contract_call(
        token,
        selector_call(
            "allowance(address,address)",
            &[Token::Address(owner), Token::Address(spender)],
        ),
    )
}

pub fn erc20_approve(token: Address, spender: Address, amount: U256) -> TypedTransaction {
    contract_call(
        token,
        selector_call(
            "approve(address,uint256)",
            &[Token::Address(spender), Token::Uint(amount)],
        ),
    )
}

pub fn erc20_balance_of(token: Address, owner: Address) -> TypedTransaction {
    contract_call(
        token,
        selector_call("balanceOf(address)", &[Token::Address(owner)]),
    )
}

// ---------- Asset vault / router ----------

/// Cross-chain asset identifier registered in the vault for `token`.
pub fn vault_asset_id(vault: Address, token: Address) -> TypedTransaction {
    contract_call(
        vault,
        selector_call("assetId(address)", &[Token::Address(token)]),
    )
}

/// Canonical asset identifier, computed locally the same way the vault
/// mints it on registration: keccak of (origin chain id, vault, token).
pub fn canonical_asset_id(chain_id: u64, vault: Address, token: Address) -> H256 {
    H256::from(keccak256(encode(&[
        Token::Uint(U256::from(chain_id)),
        Token::Address(vault),
        Token::Address(token),
    ])))
}

/// ABI-encoded `(amount, receiver, token)` transfer payload, shared by
/// token withdrawals and token deposit bridge calldata.
pub fn encode_transfer_data(amount: U256, receiver: Address, token: Address) -> Bytes {
    Bytes::from(encode(&[
        Token::Uint(amount),
        Token::Address(receiver),
        Token::Address(token),
    ]))
}

pub fn decode_transfer_data(data: &[u8]) -> BridgeResult<(U256, Address, Address)> {
    let ctx = ErrorCtx::new("encoding", "decode_transfer_data");
    let tokens = decode(
        &[ParamType::Uint(256), ParamType::Address, ParamType::Address],
        data,
    )
    .map_err(|e| ctx.internal("malformed transfer payload").with_cause(e))?;
    match (&tokens[0], &tokens[1], &tokens[2]) {
        (Token::Uint(amount), Token::Address(receiver), Token::Address(token)) => {
            Ok((*amount, *receiver, *token))
        }
        _ => Err(ctx.internal("transfer payload tokens of unexpected type")),
    }
}

/// Token withdrawal through the execution-chain asset router.
pub fn router_withdraw(router: Address, asset_id: H256, transfer_data: Bytes) -> TypedTransaction {
    contract_call(
        router,
        selector_call(
            "withdraw(bytes32,bytes)",
            &[
                Token::FixedBytes(asset_id.as_bytes().to_vec()),
                Token::Bytes(transfer_data.to_vec()),
            ],
        ),
    )
}

/// Base-asset withdrawal through the system contract; the amount rides on
/// the transaction value.
pub fn base_token_withdraw(system_contract: Address, l1_receiver: Address) -> TypedTransaction {
    contract_call(
        system_contract,
        selector_call("withdraw(address)", &[Token::Address(l1_receiver)]),
    )
}

// ---------- Finalization ----------

pub fn finalize_withdrawal_calldata(
    chain_id: u64,
    batch_number: u64,
    message_index: u64,
    tx_index_in_batch: u16,
    message: &Bytes,
    merkle_proof: &[H256],
) -> Bytes {
    selector_call(
        "finalizeWithdrawal(uint256,uint256,uint256,uint16,bytes,bytes32[])",
        &[
            Token::Uint(U256::from(chain_id)),
            Token::Uint(U256::from(batch_number)),
            Token::Uint(U256::from(message_index)),
            Token::Uint(U256::from(tx_index_in_batch)),
            Token::Bytes(message.to_vec()),
            Token::Array(
                merkle_proof
                    .iter()
                    .map(|h| Token::FixedBytes(h.as_bytes().to_vec()))
                    .collect(),
            ),
        ],
    )
}

pub fn is_withdrawal_finalized(
    registry: Address,
    chain_id: u64,
    batch_number: u64,
    message_index: u64,
) -> TypedTransaction {
    contract_call(
        registry,
        selector_call(
            "isWithdrawalFinalized(uint256,uint256,uint256)",
            &[
                Token::Uint(U256::from(chain_id)),
                Token::Uint(U256::from(batch_number)),
                Token::Uint(U256::from(message_index)),
            ],
        ),
    )
}

// ---------- Bridgehub deposit requests ----------

/// Direct L2 transaction request: base-asset deposits.
#[derive(Debug, Clone)]
pub struct L2RequestDirect {
    pub chain_id: u64,
    pub mint_value: U256,
    pub l2_contract: Address,
    pub l2_value: U256,
    pub l2_calldata: Bytes,
    pub l2_gas_limit: U256,
    pub gas_per_pubdata: U256,
    pub refund_recipient: Address,
}

pub fn request_l2_transaction_direct(bridgehub: Address, req: &L2RequestDirect) -> TypedTransaction {
    contract_call(
        bridgehub,
        selector_call(
            "requestL2TransactionDirect((uint256,uint256,address,uint256,bytes,uint256,uint256,bytes[],address))",
            &[Token::Tuple(vec![
                Token::Uint(U256::from(req.chain_id)),
                Token::Uint(req.mint_value),
                Token::Address(req.l2_contract),
                Token::Uint(req.l2_value),
                Token::Bytes(req.l2_calldata.to_vec()),
                Token::Uint(req.l2_gas_limit),
                Token::Uint(req.gas_per_pubdata),
                Token::Array(vec![]),
                Token::Address(req.refund_recipient),
            ])],
        ),
    )
}

/// Two-bridges L2 transaction request: token deposits through the vault.
#[derive(Debug, Clone)]
pub struct L2RequestTwoBridges {
    pub chain_id: u64,
    pub mint_value: U256,
    pub l2_value: U256,
    pub l2_gas_limit: U256,
    pub gas_per_pubdata: U256,
    pub refund_recipient: Address,
    pub second_bridge: Address,
    pub second_bridge_value: U256,
    pub second_bridge_calldata: Bytes,
}

pub fn request_l2_transaction_two_bridges(
    bridgehub: Address,
    req: &L2RequestTwoBridges,
) -> TypedTransaction {
    contract_call(
        bridgehub,
        selector_call(
            "requestL2TransactionTwoBridges((uint256,uint256,uint256,uint256,uint256,address,uint256,bytes))",
            &[Token::Tuple(vec![
                Token::Uint(U256::from(req.chain_id)),
                Token::Uint(req.mint_value),
                Token::Uint(req.l2_value),
                Token::Uint(req.l2_gas_limit),
                Token::Uint(req.gas_per_pubdata),
                Token::Address(req.refund_recipient),
                Token::Address(req.second_bridge),
                Token::Uint(req.second_bridge_value),
                Token::Bytes(req.second_bridge_calldata.to_vec()),
            ])],
        ),
    )
}

/// Versioned vault calldata carried by the two-bridges request:
/// a version byte followed by `(assetId, transferData)`.
pub fn encode_second_bridge_calldata(asset_id: H256, transfer_data: &Bytes) -> Bytes {
    let mut out = vec![0x01];
    out.extend(encode(&[
        Token::FixedBytes(asset_id.as_bytes().to_vec()),
        Token::Bytes(transfer_data.to_vec()),
    ]));
    Bytes::from(out)
}

// ---------- Return-data decoding ----------

pub fn decode_u256(data: &[u8], what: &'static str) -> BridgeResult<U256> {
    let ctx = ErrorCtx::new("encoding", "decode_u256");
    let tokens = decode(&[ParamType::Uint(256)], data)
        .map_err(|e| ctx.internal(format!("malformed uint256 return data for {what}")).with_cause(e))?;
    tokens[0]
        .clone()
        .into_uint()
        .ok_or_else(|| ctx.internal(format!("expected uint256 for {what}")))
}

pub fn decode_bool(data: &[u8], what: &'static str) -> BridgeResult<bool> {
    let ctx = ErrorCtx::new("encoding", "decode_bool");
    let tokens = decode(&[ParamType::Bool], data)
        .map_err(|e| ctx.internal(format!("malformed bool return data for {what}")).with_cause(e))?;
    tokens[0]
        .clone()
        .into_bool()
        .ok_or_else(|| ctx.internal(format!("expected bool for {what}")))
}

pub fn decode_h256(data: &[u8], what: &'static str) -> BridgeResult<H256> {
    let ctx = ErrorCtx::new("encoding", "decode_h256");
    if data.len() != 32 {
        return Err(ctx.internal(format!(
            "expected 32-byte return data for {what}, got {}",
            data.len()
        )));
    }
    Ok(H256::from_slice(data))
}

// ---------- Event topics ----------

/// Current cross-layer message log: `L1MessageSent(address indexed sender,
/// bytes32 indexed messageHash, bytes message)`.
pub static MESSAGE_SENT_TOPIC: Lazy<H256> =
    Lazy::new(|| H256::from(keccak256(b"L1MessageSent(address,bytes32,bytes)")));

/// Historical cross-layer message log shape, still emitted by older
/// deployments: `MessageSent(address sender, bytes message)`, unindexed.
pub static LEGACY_MESSAGE_SENT_TOPIC: Lazy<H256> =
    Lazy::new(|| H256::from(keccak256(b"MessageSent(address,bytes)")));

/// Primary bridge-entry event on deposit: carries the execution-chain
/// transaction hash as the second data word.
pub static TRANSACTION_REQUESTED_TOPIC: Lazy<H256> =
    Lazy::new(|| H256::from(keccak256(b"TransactionRequested(uint256,bytes32,uint64)")));

/// Older deployments: canonical hash assigned, hash indexed in topic 2.
pub static REQUEST_ASSIGNED_TOPIC: Lazy<H256> =
    Lazy::new(|| H256::from(keccak256(b"RequestAssigned(address,bytes32,uint256)")));

/// Older deployments: request succeeded, hash indexed in topic 3.
pub static REQUEST_SUCCEEDED_TOPIC: Lazy<H256> =
    Lazy::new(|| H256::from(keccak256(b"RequestSucceeded(address,address,bytes32)")));

/// Whether the log is a cross-layer message log, in either historical
/// shape.
pub fn is_message_sent_log(log: &Log) -> bool {
    log.topics
        .first()
        .map(|t| *t == *MESSAGE_SENT_TOPIC || *t == *LEGACY_MESSAGE_SENT_TOPIC)
        .unwrap_or(false)
}

/// Decode the sender and message bytes from a cross-layer message log.
/// Both historical shapes are recognized; `None` for anything else.
pub fn decode_message_sent(log: &Log) -> Option<(Address, Bytes)> {
    let topic0 = log.topics.first()?;
    if *topic0 == *MESSAGE_SENT_TOPIC {
        let sender_topic = log.topics.get(1)?;
        let sender = Address::from_slice(&sender_topic.as_bytes()[12..]);
        let tokens = decode(&[ParamType::Bytes], &log.data).ok()?;
        let message = tokens.first()?.clone().into_bytes()?;
        Some((sender, Bytes::from(message)))
    } else if *topic0 == *LEGACY_MESSAGE_SENT_TOPIC {
        let tokens = decode(&[ParamType::Address, ParamType::Bytes], &log.data).ok()?;
        let sender = tokens.first()?.clone().into_address()?;
        let message = tokens.get(1)?.clone().into_bytes()?;
        Some((sender, Bytes::from(message)))
    } else {
        None
    }
}

/// Decode the execution-chain transaction hash embedded in the primary
/// bridge-entry event. `None` when the log is a different event or the
/// data is too short to carry the hash word.
pub fn decode_requested_l2_hash(log: &Log) -> Option<H256> {
    if log.topics.first()? != &*TRANSACTION_REQUESTED_TOPIC {
        return None;
    }
    let word = log.data.get(32..64)?;
    Some(H256::from_slice(word))
}
