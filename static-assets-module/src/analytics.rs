// Copyright 2025 Bazaar Web Server contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Process-wide request and bandwidth accounting per asset
//!
//! The store is an explicitly owned component rather than a module-level
//! singleton: the handler keeps it behind an [`std::sync::Arc`] and hands out
//! clones, so tests can substitute a fresh instance per run. Counters live
//! for the process lifetime and are only cleared by [`AssetAnalytics::reset`].

use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Usage counters for a single asset.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    /// Number of full deliveries
    pub requests: u64,
    /// Cumulative body bytes served by full deliveries
    pub bytes_served: u64,
    /// Time of the most recent delivery
    pub last_access: Option<SystemTime>,
}

/// Process-wide asset usage store, safe for concurrent access.
///
/// Not-modified responses carry no body and are counted in a separate
/// aggregate, never against per-asset delivery counters or bandwidth.
#[derive(Debug, Default)]
pub struct AssetAnalytics {
    records: DashMap<PathBuf, AssetRecord>,
    total_requests: AtomicU64,
    total_bytes: AtomicU64,
    cache_hits: AtomicU64,
}

impl AssetAnalytics {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful full delivery of the given asset.
    pub fn record_delivery(&self, path: &Path, bytes: u64) {
        {
            let mut record = self.records.entry(path.to_path_buf()).or_default();
            record.requests += 1;
            record.bytes_served += bytes;
            record.last_access = Some(SystemTime::now());
        }
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records a not-modified short-circuit.
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Total number of full deliveries.
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Total body bytes served by full deliveries.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes.load(Ordering::Relaxed)
    }

    /// Total number of not-modified short-circuits.
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Returns the usage counters for a single asset if it was ever
    /// delivered.
    pub fn record(&self, path: &Path) -> Option<AssetRecord> {
        self.records.get(path).map(|record| record.clone())
    }

    /// Returns up to `limit` assets ranked by request count, most requested
    /// first.
    pub fn top_requested(&self, limit: usize) -> Vec<(PathBuf, AssetRecord)> {
        let mut entries = self
            .records
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect::<Vec<_>>();
        entries.sort_by(|(_, a), (_, b)| b.requests.cmp(&a.requests));
        entries.truncate(limit);
        entries
    }

    /// Clears all counters. This is the only way counters are ever reset.
    pub fn reset(&self) {
        self.records.clear();
        self.total_requests.store(0, Ordering::Relaxed);
        self.total_bytes.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
    }
}
