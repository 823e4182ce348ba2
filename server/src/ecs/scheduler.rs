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

//! Delayed actions on the simulated clock
//!
//! Each landblock group owns one [`Scheduler`]. Actions come due when the
//! group's tick passes their time; actions due at the same instant run in the
//! order they were scheduled.

use crate::ecs::EcsEntity;
use crate::ecs::components::{AttackType, DamageType};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// Handle for cancelling a scheduled action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

/// A hit in flight between an attack and its landing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingHit {
    pub attacker: EcsEntity,
    pub target: EcsEntity,
    pub attack_type: AttackType,
    pub damage_type: DamageType,
    pub amount: f32,
}

/// Something the group does at a later simulated time
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduledAction {
    /// Despawn a corpse or an expired hazard
    RemoveEntity(EcsEntity),
    LandAttack(PendingHit),
}

impl ScheduledAction {
    /// Whether the action refers to `entity` in any role
    pub fn involves(&self, entity: EcsEntity) -> bool {
        match self {
            ScheduledAction::RemoveEntity(target) => *target == entity,
            ScheduledAction::LandAttack(hit) => hit.attacker == entity || hit.target == entity,
        }
    }
}

#[derive(Debug)]
struct Entry {
    at: f64,
    id: TaskId,
    action: ScheduledAction,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Reversed so the max-heap pops the earliest entry first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .total_cmp(&self.at)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Simulated-time priority queue of actions
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: BinaryHeap<Entry>,
    cancelled: HashSet<TaskId>,
    next_id: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, at: f64, action: ScheduledAction) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.queue.push(Entry { at, id, action });
        id
    }

    pub fn cancel(&mut self, id: TaskId) {
        if self.queue.iter().any(|entry| entry.id == id) {
            self.cancelled.insert(id);
        }
    }

    /// Cancel every pending action that refers to `entity`. Returns how many
    /// were cancelled.
    pub fn cancel_involving(&mut self, entity: EcsEntity) -> usize {
        let ids: Vec<TaskId> = self
            .queue
            .iter()
            .filter(|entry| !self.cancelled.contains(&entry.id) && entry.action.involves(entity))
            .map(|entry| entry.id)
            .collect();
        let count = ids.len();
        self.cancelled.extend(ids);
        count
    }

    /// Pop every action due at or before `now`, earliest first
    pub fn take_due(&mut self, now: f64) -> Vec<ScheduledAction> {
        let mut due = Vec::new();
        while self.queue.peek().is_some_and(|entry| entry.at <= now) {
            let Some(entry) = self.queue.pop() else {
                break;
            };
            if self.cancelled.remove(&entry.id) {
                continue;
            }
            due.push(entry.action);
        }
        due
    }

    /// Time of the earliest action that has not been cancelled
    pub fn next_due(&self) -> Option<f64> {
        if self.cancelled.is_empty() {
            return self.queue.peek().map(|entry| entry.at);
        }
        self.queue
            .iter()
            .filter(|entry| !self.cancelled.contains(&entry.id))
            .map(|entry| entry.at)
            .min_by(f64::total_cmp)
    }

    /// Pending actions, cancelled ones excluded
    pub fn len(&self) -> usize {
        self.queue.len() - self.cancelled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
