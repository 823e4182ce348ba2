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

//! Short-lived memoization of physics distance queries
//!
//! Physics distance queries are the most expensive thing a monster does per
//! tick, and the answers barely change over a fraction of a second. Each
//! monster owns a [`TargetCache`] holding three windows:
//!
//! - the distance to its current attack target
//! - a map of distances to arbitrary targets, keyed by `(target, squared)`
//! - the filtered list of visible attack candidates
//!
//! A read inside the window returns the stored value. A read outside the
//! window recomputes before returning. The whole cache is dropped whenever
//! the monster's attack target changes.

use crate::ecs::EcsEntity;
use crate::ecs::metrics::AiMetrics;
use std::collections::HashMap;

/// A value stamped with the simulated time it was computed at
#[derive(Debug, Clone, PartialEq)]
pub struct TimedValue<T> {
    pub computed_at: f64,
    pub value: T,
}

impl<T> TimedValue<T> {
    pub fn new(computed_at: f64, value: T) -> Self {
        Self { computed_at, value }
    }

    /// Whether a read at `now` falls inside the validity window
    pub fn is_fresh(&self, now: f64, window: f64) -> bool {
        now >= self.computed_at && now < self.computed_at + window
    }
}

/// Validity windows for the three cache tiers, in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheWindows {
    pub target_distance: f64,
    pub distance_map: f64,
    pub visible_targets: f64,
}

impl Default for CacheWindows {
    fn default() -> Self {
        Self {
            target_distance: 0.25,
            distance_map: 0.3,
            visible_targets: 0.5,
        }
    }
}

/// Per-monster distance and candidate cache
#[derive(Debug, Clone, Default)]
pub struct TargetCache {
    target_distance: Option<TimedValue<f32>>,
    distances: HashMap<(EcsEntity, bool), TimedValue<f32>>,
    visible_targets: Option<TimedValue<Vec<EcsEntity>>>,
}

impl TargetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distance to the current attack target, recomputed when stale
    pub fn target_distance(
        &mut self,
        now: f64,
        window: f64,
        metrics: &AiMetrics,
        compute: impl FnOnce() -> f32,
    ) -> f32 {
        if let Some(cached) = &self.target_distance {
            if cached.is_fresh(now, window) {
                metrics.cache_hit();
                return cached.value;
            }
        }
        metrics.cache_miss();
        let value = compute();
        self.target_distance = Some(TimedValue::new(now, value));
        value
    }

    /// Distance to an arbitrary target. Squared and linear distances are
    /// cached under separate keys.
    pub fn distance(
        &mut self,
        target: EcsEntity,
        squared: bool,
        now: f64,
        window: f64,
        metrics: &AiMetrics,
        compute: impl FnOnce() -> f32,
    ) -> f32 {
        if let Some(cached) = self.distances.get(&(target, squared)) {
            if cached.is_fresh(now, window) {
                metrics.cache_hit();
                return cached.value;
            }
        }
        metrics.cache_miss();
        let value = compute();
        // Expired entries are never read again
        self.distances.retain(|_, cached| cached.is_fresh(now, window));
        self.distances
            .insert((target, squared), TimedValue::new(now, value));
        value
    }

    /// Cached candidate list if still inside its window
    pub fn visible_targets(&self, now: f64, window: f64, metrics: &AiMetrics) -> Option<Vec<EcsEntity>> {
        match &self.visible_targets {
            Some(cached) if cached.is_fresh(now, window) => {
                metrics.cache_hit();
                Some(cached.value.clone())
            }
            _ => {
                metrics.cache_miss();
                None
            }
        }
    }

    pub fn store_visible_targets(&mut self, now: f64, targets: Vec<EcsEntity>) {
        self.visible_targets = Some(TimedValue::new(now, targets));
    }

    /// Drop every cached value
    pub fn invalidate(&mut self) {
        self.target_distance = None;
        self.distances.clear();
        self.visible_targets = None;
    }

    pub fn is_empty(&self) -> bool {
        self.target_distance.is_none() && self.distances.is_empty() && self.visible_targets.is_none()
    }
}
