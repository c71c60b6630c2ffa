// Copyright (c) The Rollup Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared primitives and data model for the rollup bridge engine.
//!
//! This crate holds everything that is pure data: addresses and amounts,
//! transfer routes, plans and handles, lifecycle phases, the withdrawal
//! finalization proof, and the structured error envelope. All chain I/O
//! lives in the `rollup-bridge` engine crate.

pub mod base_types;
pub mod error;
pub mod transfer;

pub use base_types::{
    base_asset_system_address, bootloader_address, cross_layer_messenger_address,
    native_asset_sentinel, Amount, ChainSide,
};
pub use error::{BridgeError, BridgeResult, ErrorCtx, ErrorKind, RevertInfo};
pub use transfer::{
    ApprovalNeed, DepositHandle, DepositPhase, DepositRoute, DepositStatus, FeeOverrides,
    FeeSummary, FinalizeOutcome, FinalizeProof, FinalizeReadiness, Plan, PlanStep, StepKind,
    TransferParams, TransferQuote, WithdrawalHandle, WithdrawalKey, WithdrawalPhase,
    WithdrawalRoute, WithdrawalStatus,
};
