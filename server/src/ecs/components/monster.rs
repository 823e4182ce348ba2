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

//! Monster decision state
//!
//! [`Monster`] is the per-actor record the decision loop reads and writes
//! every tick. The attack target is private: the only ways to change it also
//! drop the [`TargetCache`], so a cached distance can never outlive the
//! target it was measured against.

use crate::ecs::EcsEntity;
use crate::ecs::cache::TargetCache;
use flagset::{FlagSet, flags};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Engagement lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonsterState {
    /// Asleep at home, no target
    Idle,
    /// Engaged or looking for a target
    Awake,
    /// Walking back home after losing the target or leaving the leash
    Return,
}

flags! {
    /// Restrictions on what a monster will attack and when
    pub enum Tolerance: u32 {
        /// Never attacks
        NoAttack = 0x0001,
        /// Only turns hostile when appraised
        Appraise = 0x0002,
        /// Only turns hostile when provoked
        Provoke = 0x0004,
        /// Only fights back against whoever hurt it
        Retaliate = 0x0008,
        /// Locked onto its current target
        Target = 0x0010,
        /// Only fights other monsters
        Monster = 0x0020,
    }

    /// Algorithms for picking an attack target among candidates
    pub enum TargetingTactic: u32 {
        Random = 0x0001,
        Focused = 0x0002,
        LastDamager = 0x0004,
        TopDamager = 0x0008,
        Weakest = 0x0010,
        Strongest = 0x0020,
        Nearest = 0x0040,
    }
}

/// Tolerances that suppress spontaneous aggression
pub fn passive_tolerances() -> FlagSet<Tolerance> {
    Tolerance::NoAttack | Tolerance::Appraise | Tolerance::Provoke | Tolerance::Retaliate
}

/// Tactic set used when a monster is configured with none
pub fn default_tactics() -> FlagSet<TargetingTactic> {
    TargetingTactic::Random | TargetingTactic::TopDamager
}

/// When each target was last used to rally allies
#[derive(Debug, Clone, Default)]
pub struct AlertLedger {
    alerts: HashMap<EcsEntity, f64>,
}

impl AlertLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether allies were rallied against `target` within `threshold` seconds
    pub fn recently_alerted(&self, target: EcsEntity, now: f64, threshold: f64) -> bool {
        self.alerts
            .get(&target)
            .is_some_and(|&at| now - at < threshold)
    }

    /// Record a successful alert and prune expired entries
    pub fn record(&mut self, target: EcsEntity, now: f64, threshold: f64) {
        self.alerts.retain(|_, at| now - *at < threshold);
        self.alerts.insert(target, now);
    }

    pub fn last_alert(&self, target: EcsEntity) -> Option<f64> {
        self.alerts.get(&target).copied()
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

/// Decision state for an autonomous hostile creature
#[derive(Debug, Clone)]
pub struct Monster {
    state: MonsterState,
    attack_target: Option<EcsEntity>,
    /// Tactics this monster may draw from for each engagement
    pub tactics: FlagSet<TargetingTactic>,
    /// Tactic drawn for the current evaluation
    pub current_tactic: Option<TargetingTactic>,
    pub tolerance: FlagSet<Tolerance>,
    /// Range at which new candidates are noticed
    pub visual_range: f32,
    /// Range at which a fight involving a kinsman is heard
    pub aural_range: f32,
    /// Range at which the current target is still pursued
    pub chase_range: f32,
    retaliation: HashSet<EcsEntity>,
    cache: TargetCache,
    alerts: AlertLedger,
    /// When the current target is next re-evaluated
    pub next_find_target: f64,
    /// When an idle monster next scans for prey
    pub next_scan: f64,
    /// Locked in an animation until this time
    pub busy_until: f64,
}

impl Monster {
    pub fn new() -> Self {
        Self {
            state: MonsterState::Idle,
            attack_target: None,
            tactics: FlagSet::default(),
            current_tactic: None,
            tolerance: FlagSet::default(),
            visual_range: 20.0,
            aural_range: 40.0,
            chase_range: 60.0,
            retaliation: HashSet::new(),
            cache: TargetCache::new(),
            alerts: AlertLedger::new(),
            next_find_target: 0.0,
            next_scan: 0.0,
            busy_until: 0.0,
        }
    }

    pub fn with_tactics(mut self, tactics: impl Into<FlagSet<TargetingTactic>>) -> Self {
        self.tactics = tactics.into();
        self
    }

    pub fn with_tolerance(mut self, tolerance: impl Into<FlagSet<Tolerance>>) -> Self {
        self.tolerance = tolerance.into();
        self
    }

    pub fn with_ranges(mut self, visual: f32, aural: f32, chase: f32) -> Self {
        self.visual_range = visual;
        self.aural_range = aural;
        self.chase_range = chase;
        self
    }

    pub fn state(&self) -> MonsterState {
        self.state
    }

    pub fn attack_target(&self) -> Option<EcsEntity> {
        self.attack_target
    }

    /// Awake covers both fighting and walking home
    pub fn is_awake(&self) -> bool {
        self.state != MonsterState::Idle
    }

    /// Lock onto a target. Switching targets drops every cached distance.
    pub fn engage(&mut self, target: EcsEntity) {
        if self.attack_target != Some(target) {
            self.cache.invalidate();
        }
        self.attack_target = Some(target);
        self.state = MonsterState::Awake;
    }

    /// Drop the current target, if any, along with every cached distance
    pub fn disengage(&mut self) {
        self.attack_target = None;
        self.cache.invalidate();
    }

    /// Wake without a target; target selection runs next
    pub fn wake(&mut self) {
        if self.state == MonsterState::Idle {
            self.state = MonsterState::Awake;
        }
    }

    /// Give up the fight and head home
    pub fn begin_return(&mut self) {
        self.disengage();
        self.state = MonsterState::Return;
    }

    /// Back to idle. Provocations are forgiven.
    pub fn sleep(&mut self) {
        self.disengage();
        self.state = MonsterState::Idle;
        self.current_tactic = None;
        self.retaliation.clear();
    }

    /// Drop every handle into the world this monster is leaving. Handles
    /// from another world could alias unrelated entities.
    pub fn forget_entities(&mut self) {
        self.disengage();
        self.retaliation.clear();
        self.alerts = AlertLedger::new();
    }

    pub fn add_retaliate_target(&mut self, target: EcsEntity) {
        self.retaliation.insert(target);
    }

    pub fn is_retaliate_target(&self, target: EcsEntity) -> bool {
        self.retaliation.contains(&target)
    }

    pub fn retaliate_targets(&self) -> &HashSet<EcsEntity> {
        &self.retaliation
    }

    /// Whether tolerance rules out attacking anything unprovoked
    pub fn is_passive(&self) -> bool {
        !(self.tolerance & passive_tolerances()).is_empty()
    }

    pub fn is_busy(&self, now: f64) -> bool {
        now < self.busy_until
    }

    pub fn cache(&self) -> &TargetCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut TargetCache {
        &mut self.cache
    }

    pub fn alerts(&self) -> &AlertLedger {
        &self.alerts
    }

    pub fn alerts_mut(&mut self) -> &mut AlertLedger {
        &mut self.alerts
    }
}

impl Default for Monster {
    fn default() -> Self {
        Self::new()
    }
}
