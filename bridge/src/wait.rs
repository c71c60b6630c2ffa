// Copyright (c) The Rollup Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bounded and unbounded polling loops.
//!
//! Each iteration runs a probe; between iterations the loop selects
//! between the next poll tick and the deadline, so a timeout cancels the
//! sleep immediately and returns "not yet" (`None`) rather than erroring.

use std::future::Future;
use std::time::Duration;

use ethers::types::{TransactionReceipt, H256};

use rollup_bridge_types::BridgeResult;

use crate::chain::{is_receipt_not_found, ChainClient};

/// Default pause between status polls.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_500;

/// Lower bound on the poll interval; callers cannot poll hotter than this.
pub const MIN_POLL_INTERVAL_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, Default)]
pub struct WaitOptions {
    pub poll_ms: Option<u64>,
    /// Unset means wait indefinitely.
    pub timeout_ms: Option<u64>,
}

impl WaitOptions {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(
            self.poll_ms
                .unwrap_or(DEFAULT_POLL_INTERVAL_MS)
                .max(MIN_POLL_INTERVAL_MS),
        )
    }
}

/// Poll `probe` until it yields a value, the probe errors, or the
/// optional timeout elapses (returning `Ok(None)`).
pub async fn poll_until<T, F, Fut>(options: &WaitOptions, mut probe: F) -> BridgeResult<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BridgeResult<Option<T>>>,
{
    let interval = options.interval();
    let deadline = options
        .timeout_ms
        .map(|ms| tokio::time::Instant::now() + Duration::from_millis(ms));

    loop {
        if let Some(value) = probe().await? {
            return Ok(Some(value));
        }
        match deadline {
            Some(deadline) => {
                if tokio::time::Instant::now() >= deadline {
                    return Ok(None);
                }
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = tokio::time::sleep_until(deadline) => return Ok(None),
                }
            }
            None => tokio::time::sleep(interval).await,
        }
    }
}

/// Poll for a transaction receipt. "Not found" lookup errors are the
/// expected transient condition and keep the loop going; genuine RPC
/// failures propagate.
pub async fn wait_for_receipt<C: ChainClient + ?Sized>(
    client: &C,
    hash: H256,
    options: &WaitOptions,
) -> BridgeResult<Option<TransactionReceipt>> {
    poll_until(options, || async move {
        match client.transaction_receipt(hash).await {
            Ok(receipt) => Ok(receipt),
            Err(e) if is_receipt_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    })
    .await
}
