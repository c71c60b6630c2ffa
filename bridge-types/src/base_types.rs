// Copyright (c) The Rollup Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Address and amount primitives, plus the well-known system contract
//! addresses of the execution chain.

use serde::{Deserialize, Serialize};
use strum_macros::Display;

pub use ethers::types::{Address, Bytes, H256, U256, U64};

/// Token amounts are arbitrary-precision unsigned integers. All arithmetic
/// on amounts (buffering, clamps, totals) is integer-only.
pub type Amount = U256;

/// Which of the two chains an operation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum ChainSide {
    /// The settlement chain (deposits originate here, withdrawals finalize here).
    L1,
    /// The execution chain.
    L2,
}

impl ChainSide {
    /// Lowercase label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ChainSide::L1 => "l1",
            ChainSide::L2 => "l2",
        }
    }
}

/// The canonical native-asset sentinel address. Callers pass this where a
/// token address is expected to mean "the native asset itself".
pub fn native_asset_sentinel() -> Address {
    Address::from_slice(&[0xee; 20])
}

fn system_address(low: u16) -> Address {
    let mut bytes = [0u8; 20];
    bytes[18..20].copy_from_slice(&low.to_be_bytes());
    Address::from_slice(&bytes)
}

/// System contract on the execution chain that moves the chain's own base
/// asset. The base asset may or may not be the canonical native asset.
pub fn base_asset_system_address() -> Address {
    system_address(0x800a)
}

/// System contract on the execution chain that emits cross-layer messages.
/// Withdrawal proofs are derived from its logs.
pub fn cross_layer_messenger_address() -> Address {
    system_address(0x8008)
}

/// Bootloader formal address on the execution chain.
pub fn bootloader_address() -> Address {
    system_address(0x8001)
}

/// Returns `true` when `token` is one of the two aliases of the execution
/// chain's base asset (the native sentinel or the system contract address).
pub fn is_base_asset_alias(token: Address) -> bool {
    token == native_asset_sentinel() || token == base_asset_system_address()
}
