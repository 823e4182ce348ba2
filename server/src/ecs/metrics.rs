//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Injected counters for the creature AI
//!
//! Each landblock group owns its own [`AiMetrics`], so tests observe exactly
//! the work done by the group under test. [`AiMetrics::publish`] forwards the
//! accumulated deltas to the process-wide `metrics` recorder.

use metrics::counter;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter collection for one landblock group
#[derive(Debug, Default)]
pub struct AiMetrics {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    targets_acquired: AtomicU64,
    allies_alerted: AtomicU64,
    stuck_recoveries: AtomicU64,
    attacks_launched: AtomicU64,
    attacks_dropped: AtomicU64,
    enrages: AtomicU64,
    selection_anomalies: AtomicU64,
    published: std::sync::Mutex<MetricsSnapshot>,
}

/// Point-in-time copy of every counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub targets_acquired: u64,
    pub allies_alerted: u64,
    pub stuck_recoveries: u64,
    pub attacks_launched: u64,
    pub attacks_dropped: u64,
    pub enrages: u64,
    pub selection_anomalies: u64,
}

impl std::ops::AddAssign for MetricsSnapshot {
    fn add_assign(&mut self, other: Self) {
        self.cache_hits += other.cache_hits;
        self.cache_misses += other.cache_misses;
        self.targets_acquired += other.targets_acquired;
        self.allies_alerted += other.allies_alerted;
        self.stuck_recoveries += other.stuck_recoveries;
        self.attacks_launched += other.attacks_launched;
        self.attacks_dropped += other.attacks_dropped;
        self.enrages += other.enrages;
        self.selection_anomalies += other.selection_anomalies;
    }
}

impl AiMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn target_acquired(&self) {
        self.targets_acquired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn allies_alerted(&self, count: usize) {
        self.allies_alerted.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn stuck_recovery(&self) {
        self.stuck_recoveries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn attack_launched(&self) {
        self.attacks_launched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn attack_dropped(&self) {
        self.attacks_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn enraged(&self) {
        self.enrages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn selection_anomaly(&self) {
        self.selection_anomalies.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            targets_acquired: self.targets_acquired.load(Ordering::Relaxed),
            allies_alerted: self.allies_alerted.load(Ordering::Relaxed),
            stuck_recoveries: self.stuck_recoveries.load(Ordering::Relaxed),
            attacks_launched: self.attacks_launched.load(Ordering::Relaxed),
            attacks_dropped: self.attacks_dropped.load(Ordering::Relaxed),
            enrages: self.enrages.load(Ordering::Relaxed),
            selection_anomalies: self.selection_anomalies.load(Ordering::Relaxed),
        }
    }

    /// Forward everything counted since the last publish to the global recorder
    pub fn publish(&self) {
        let current = self.snapshot();
        let mut published = self
            .published
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        counter!("bestiary.cache.hits").increment(current.cache_hits - published.cache_hits);
        counter!("bestiary.cache.misses").increment(current.cache_misses - published.cache_misses);
        counter!("bestiary.targets.acquired")
            .increment(current.targets_acquired - published.targets_acquired);
        counter!("bestiary.allies.alerted")
            .increment(current.allies_alerted - published.allies_alerted);
        counter!("bestiary.stuck.recoveries")
            .increment(current.stuck_recoveries - published.stuck_recoveries);
        counter!("bestiary.attacks.launched")
            .increment(current.attacks_launched - published.attacks_launched);
        counter!("bestiary.attacks.dropped")
            .increment(current.attacks_dropped - published.attacks_dropped);
        counter!("bestiary.enrages").increment(current.enrages - published.enrages);
        counter!("bestiary.selection.anomalies")
            .increment(current.selection_anomalies - published.selection_anomalies);

        *published = current;
    }
}
