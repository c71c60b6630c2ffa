// Copyright (c) The Rollup Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bridge transaction lifecycle engine for an L1 settlement chain and an
//! L2 execution chain: route selection, fee/gas quoting, step-plan
//! construction, execution with nonce and gas management, status
//! derivation, and withdrawal finalization.
//!
//! The engine does not construct RPC clients; it consumes the
//! [`chain::ChainClient`] capability and ships exactly one library
//! adapter ([`ethers_client`]) translating it to ethers-rs.

pub mod cache;
pub mod chain;
pub mod config;
pub mod deposit;
pub mod encoding;
pub mod ethers_client;
pub mod execute;
pub mod finalize;
pub mod metrics;
pub mod node;
pub mod plan;
pub mod quote;
pub mod routes;
pub mod status;
pub mod wait;
pub mod withdrawal;

#[cfg(test)]
pub mod mock_client;

#[cfg(test)]
pub mod test_utils;

#[macro_export]
macro_rules! retry_with_max_elapsed_time {
    ($func:expr, $max_elapsed_time:expr) => {{
        // The following delay sequence (in secs) will be used, applied with jitter
        // 0.4, 0.8, 1.6, 3.2, 6.4, 12.8, 25.6, 30, 60, 120, 120 ...
        let backoff = backoff::ExponentialBackoff {
            initial_interval: std::time::Duration::from_millis(400),
            randomization_factor: 0.1,
            multiplier: 2.0,
            max_interval: std::time::Duration::from_secs(120),
            max_elapsed_time: Some($max_elapsed_time),
            ..Default::default()
        };
        backoff::future::retry(backoff, || {
            let fut = async {
                let result = $func.await;
                match result {
                    Ok(_) => {
                        return Ok(result);
                    }
                    Err(e) => {
                        // Every error is treated as transient so we retry until max_elapsed_time
                        tracing::debug!("Retrying due to error: {:?}", e);
                        return Err(backoff::Error::transient(e));
                    }
                }
            };
            std::boxed::Box::pin(fut)
        })
        .await
    }};
}
