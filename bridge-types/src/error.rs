// Copyright (c) The Rollup Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! The structured error envelope shared by every bridge operation.
//!
//! Every failure carries a machine-readable envelope (kind tag, resource,
//! operation, message, structured context, optional decoded revert data,
//! optional cause) plus a human-readable rendering. Errors are constructed
//! through [`ErrorCtx`], which pins the resource and operation explicitly
//! at each call site instead of relying on module-level state.

use std::collections::BTreeMap;

use ethers::types::Bytes;
use strum_macros::Display;
use thiserror::Error;

pub type BridgeResult<T> = Result<T, BridgeError>;

/// Tagged error kinds. These drive retry decisions and metrics labels, so
/// their names must remain stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ErrorKind {
    /// Bad input shape or route mismatch.
    Validation,
    /// Required on-chain data not yet available (receipt, proof, batch).
    State,
    /// A sent transaction reverted or failed to send/confirm.
    Execution,
    /// Transport or estimation failure.
    Rpc,
    /// Encoding/decoding bug in the engine itself.
    Internal,
    /// Cross-chain hash correlation failed.
    Verification,
    /// A read or simulation call reverted.
    Contract,
    Timeout,
}

impl ErrorKind {
    /// Stable lowercase label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::State => "state",
            ErrorKind::Execution => "execution",
            ErrorKind::Rpc => "rpc",
            ErrorKind::Internal => "internal",
            ErrorKind::Verification => "verification",
            ErrorKind::Contract => "contract",
            ErrorKind::Timeout => "timeout",
        }
    }
}

/// Decoded information about a contract revert, when available.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RevertInfo {
    /// Four-byte custom error selector, if the revert data carried one.
    pub selector: Option<[u8; 4]>,
    /// Decoded `Error(string)` reason, if the revert data carried one.
    pub reason: Option<String>,
    /// Raw revert return data.
    pub data: Option<Bytes>,
}

// Error(string) and Panic(uint256) selectors per the Solidity ABI spec.
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];
const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

impl RevertInfo {
    /// Parse revert return data into selector/reason form. `Error(string)`
    /// payloads get their reason decoded; anything else keeps its selector
    /// and raw bytes.
    pub fn from_return_data(data: &[u8]) -> Self {
        if data.len() < 4 {
            return RevertInfo {
                selector: None,
                reason: None,
                data: Some(Bytes::from(data.to_vec())),
            };
        }
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&data[..4]);

        let reason = if selector == ERROR_STRING_SELECTOR {
            decode_abi_string(&data[4..])
        } else if selector == PANIC_SELECTOR {
            Some("panic".to_string())
        } else {
            None
        };

        RevertInfo {
            selector: Some(selector),
            reason,
            data: Some(Bytes::from(data.to_vec())),
        }
    }

    /// Build from a bare reason string (clients that surface the decoded
    /// reason but not the raw data).
    pub fn from_reason(reason: impl Into<String>) -> Self {
        RevertInfo {
            selector: None,
            reason: Some(reason.into()),
            data: None,
        }
    }
}

// Minimal decoder for a single ABI-encoded dynamic string (offset, length,
// payload). Returns None rather than erroring on malformed data.
fn decode_abi_string(words: &[u8]) -> Option<String> {
    if words.len() < 64 {
        return None;
    }
    let offset = u64::from_be_bytes(words[24..32].try_into().ok()?) as usize;
    let len_start = offset.checked_add(32)?;
    if words.len() < len_start {
        return None;
    }
    let len = u64::from_be_bytes(words[offset + 24..offset + 32].try_into().ok()?) as usize;
    let payload = words.get(len_start..len_start.checked_add(len)?)?;
    String::from_utf8(payload.to_vec()).ok()
}

/// The one concrete error type thrown by the bridge engine.
#[derive(Debug, Error)]
#[error("{kind} error in {resource}.{operation}: {message}")]
pub struct BridgeError {
    kind: ErrorKind,
    resource: &'static str,
    operation: &'static str,
    message: String,
    context: BTreeMap<&'static str, String>,
    revert: Option<RevertInfo>,
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl BridgeError {
    pub fn new(
        kind: ErrorKind,
        resource: &'static str,
        operation: &'static str,
        message: impl Into<String>,
    ) -> Self {
        BridgeError {
            kind,
            resource,
            operation,
            message: message.into(),
            context: BTreeMap::new(),
            revert: None,
            cause: None,
        }
    }

    pub fn with_context(mut self, key: &'static str, value: impl ToString) -> Self {
        self.context.insert(key, value.to_string());
        self
    }

    pub fn with_revert(mut self, revert: RevertInfo) -> Self {
        self.revert = Some(revert);
        self
    }

    pub fn with_cause(
        mut self,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn resource(&self) -> &'static str {
        self.resource
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &BTreeMap<&'static str, String> {
        &self.context
    }

    pub fn revert(&self) -> Option<&RevertInfo> {
        self.revert.as_ref()
    }

    pub fn is_kind(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    /// Multi-line human rendering: the one-line summary plus context,
    /// revert reason and cause on their own lines.
    pub fn pretty(&self) -> String {
        let mut out = self.to_string();
        for (key, value) in &self.context {
            out.push_str(&format!("\n  {key}: {value}"));
        }
        if let Some(revert) = &self.revert {
            if let Some(reason) = &revert.reason {
                out.push_str(&format!("\n  revert reason: {reason}"));
            }
            if let Some(selector) = &revert.selector {
                out.push_str(&format!(
                    "\n  revert selector: 0x{}",
                    selector.iter().map(|b| format!("{b:02x}")).collect::<String>()
                ));
            }
        }
        if let Some(cause) = &self.cause {
            out.push_str(&format!("\n  caused by: {cause}"));
        }
        out
    }
}

/// Stateless error constructor pinned to one resource and operation.
///
/// Components create one per call site (`ErrorCtx::new("withdrawals",
/// "finalize")`) so every error they emit carries correlatable origin
/// fields without any hidden module-level state.
#[derive(Debug, Clone, Copy)]
pub struct ErrorCtx {
    resource: &'static str,
    operation: &'static str,
}

impl ErrorCtx {
    pub fn new(resource: &'static str, operation: &'static str) -> Self {
        ErrorCtx { resource, operation }
    }

    pub fn build(&self, kind: ErrorKind, message: impl Into<String>) -> BridgeError {
        BridgeError::new(kind, self.resource, self.operation, message)
    }

    pub fn validation(&self, message: impl Into<String>) -> BridgeError {
        self.build(ErrorKind::Validation, message)
    }

    pub fn state(&self, message: impl Into<String>) -> BridgeError {
        self.build(ErrorKind::State, message)
    }

    pub fn execution(&self, message: impl Into<String>) -> BridgeError {
        self.build(ErrorKind::Execution, message)
    }

    pub fn rpc(&self, message: impl Into<String>) -> BridgeError {
        self.build(ErrorKind::Rpc, message)
    }

    pub fn internal(&self, message: impl Into<String>) -> BridgeError {
        self.build(ErrorKind::Internal, message)
    }

    pub fn verification(&self, message: impl Into<String>) -> BridgeError {
        self.build(ErrorKind::Verification, message)
    }

    pub fn contract(&self, message: impl Into<String>) -> BridgeError {
        self.build(ErrorKind::Contract, message)
    }

    pub fn timeout(&self, message: impl Into<String>) -> BridgeError {
        self.build(ErrorKind::Timeout, message)
    }
}
