// Copyright (c) The Rollup Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Small caches for data that changes infrequently, to avoid repeated RPC
//! calls: the resolved bridgehub address, market fee data, and the map of
//! finalize transaction hashes keyed by source hash.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use ethers::types::H256;
use tokio::sync::RwLock;

/// A thread-safe single-value cache with TTL expiry.
#[derive(Debug)]
pub struct TtlCell<T: Clone + Send + Sync> {
    value: RwLock<Option<(Instant, T)>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T: Clone + Send + Sync> TtlCell<T> {
    pub fn new(ttl: Duration) -> Self {
        TtlCell {
            value: RwLock::new(None),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn with_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Return the cached value if it has not expired.
    pub async fn get_if_valid(&self) -> Option<T> {
        let guard = self.value.read().await;
        if let Some((updated_at, value)) = guard.as_ref() {
            if updated_at.elapsed() < self.ttl {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(value.clone());
            }
        }
        None
    }

    pub async fn update(&self, value: T) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        let mut guard = self.value.write().await;
        *guard = Some((Instant::now(), value));
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Force the next access to fetch fresh data.
    #[cfg(test)]
    pub async fn invalidate(&self) {
        let mut guard = self.value.write().await;
        *guard = None;
    }
}

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Map from source (execution-chain) transaction hash to the finalize
/// transaction hash submitted for it. Safe under concurrent reads; a
/// stale entry only means a slightly stale receipt lookup, never an
/// incorrect finalization.
#[derive(Debug, Default)]
pub struct FinalizeHashCache {
    inner: RwLock<HashMap<H256, H256>>,
}

impl FinalizeHashCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, source: H256, finalize: H256) {
        self.inner.write().await.insert(source, finalize);
    }

    pub async fn get(&self, source: H256) -> Option<H256> {
        self.inner.read().await.get(&source).copied()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}
