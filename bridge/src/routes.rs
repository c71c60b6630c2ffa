// Copyright (c) The Rollup Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Route selection: a pure mapping from (token, base-asset configuration)
//! to the transfer strategy variant. Decided once per transfer and
//! immutable afterwards; the selected route keys the plan builder.

use ethers::types::Address;

use rollup_bridge_types::base_types::{base_asset_system_address, native_asset_sentinel};
use rollup_bridge_types::{DepositRoute, WithdrawalRoute};

/// Map the canonical native-asset sentinel to the execution chain's
/// base-asset system address; every other token passes through unchanged.
pub fn normalize_l2_token(token: Address) -> Address {
    if token == native_asset_sentinel() {
        base_asset_system_address()
    } else {
        token
    }
}

/// Select the withdrawal route.
///
/// The chain exposes a single system contract for moving its own base
/// asset and a generic vault for all other tokens; whether the base asset
/// coincides with the canonical native asset depends on chain
/// configuration, hence the three-way split.
pub fn select_withdrawal_route(token: Address, base_asset_is_native: bool) -> WithdrawalRoute {
    let token = normalize_l2_token(token);
    if token == base_asset_system_address() {
        if base_asset_is_native {
            WithdrawalRoute::NativeBase
        } else {
            WithdrawalRoute::NativeNonBase
        }
    } else {
        WithdrawalRoute::TokenNonBase
    }
}

/// Select the deposit route. `l1_base_token` is the settlement-chain
/// address of the execution chain's base asset (the native sentinel when
/// the base asset is the canonical native asset).
pub fn select_deposit_route(token: Address, l1_base_token: Address) -> DepositRoute {
    if token == l1_base_token {
        if l1_base_token == native_asset_sentinel() {
            DepositRoute::NativeBase
        } else {
            DepositRoute::TokenBase
        }
    } else {
        DepositRoute::TokenNonBase
    }
}
