//
// Copyright 2025 Hans W. Uhlig. All Rights Reserved.
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

//! Combat components for vitals, damage bookkeeping, and attack timing

use crate::ecs::EcsEntity;
use crate::ecs::content::SpellId;
use serde::{Deserialize, Serialize};

/// Attack categories, each with its own cooldown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackType {
    Melee,
    Missile,
    Magic,
}

impl AttackType {
    pub const ALL: [AttackType; 3] = [AttackType::Melee, AttackType::Missile, AttackType::Magic];

    fn index(self) -> usize {
        match self {
            AttackType::Melee => 0,
            AttackType::Missile => 1,
            AttackType::Magic => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttackType::Melee => "Melee",
            AttackType::Missile => "Missile",
            AttackType::Magic => "Magic",
        }
    }
}

/// Melee swing heights from the combat maneuver table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackHeight {
    High,
    Medium,
    Low,
}

/// Damage types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageType {
    Slashing,
    Piercing,
    Bludgeoning,
    Fire,
    Cold,
    Acid,
    Electric,
}

impl DamageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DamageType::Slashing => "Slashing",
            DamageType::Piercing => "Piercing",
            DamageType::Bludgeoning => "Bludgeoning",
            DamageType::Fire => "Fire",
            DamageType::Cold => "Cold",
            DamageType::Acid => "Acid",
            DamageType::Electric => "Electric",
        }
    }
}

/// Health pool
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    pub health_current: f32,
    pub health_maximum: f32,
}

impl Vitals {
    /// Create a full health pool
    pub fn new(health_maximum: f32) -> Self {
        Self {
            health_current: health_maximum,
            health_maximum,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health_current > 0.0
    }

    /// Current health as a fraction of maximum, 0.0 when maximum is zero
    pub fn health_fraction(&self) -> f32 {
        if self.health_maximum <= 0.0 {
            0.0
        } else {
            self.health_current / self.health_maximum
        }
    }

    /// Subtract damage, clamping at zero. Returns the amount actually taken.
    pub fn take_damage(&mut self, amount: f32) -> f32 {
        let taken = amount.max(0.0).min(self.health_current);
        self.health_current -= taken;
        taken
    }
}

/// A single line in the damage ledger
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageEntry {
    /// `None` for environmental damage such as hazards
    pub source: Option<EcsEntity>,
    pub damage_type: DamageType,
    pub amount: f32,
    pub at: f64,
}

/// Ledger of damage taken, used by the LastDamager and TopDamager tactics
#[derive(Debug, Clone, Default)]
pub struct DamageHistory {
    entries: Vec<DamageEntry>,
    totals: Vec<(EcsEntity, f32)>,
}

impl DamageHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, source: Option<EcsEntity>, damage_type: DamageType, amount: f32, at: f64) {
        self.entries.push(DamageEntry {
            source,
            damage_type,
            amount,
            at,
        });
        if let Some(source) = source {
            match self.totals.iter_mut().find(|(entity, _)| *entity == source) {
                Some((_, total)) => *total += amount,
                None => self.totals.push((source, amount)),
            }
        }
    }

    /// Most recent actor that dealt damage, skipping environmental sources
    pub fn last_damager(&self) -> Option<EcsEntity> {
        self.entries.iter().rev().find_map(|entry| entry.source)
    }

    /// Actor with the highest accumulated damage. Ties go to whoever hit first.
    pub fn top_damager(&self) -> Option<EcsEntity> {
        let mut best: Option<(EcsEntity, f32)> = None;
        for &(entity, total) in &self.totals {
            if best.is_none_or(|(_, top)| total > top) {
                best = Some((entity, total));
            }
        }
        best.map(|(entity, _)| entity)
    }

    pub fn entries(&self) -> &[DamageEntry] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.totals.clear();
    }
}

/// Damage roll and timing for a single weapon
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeaponProfile {
    pub range: f32,
    /// Seconds between attacks of this type
    pub interval: f64,
    pub damage_min: f32,
    pub damage_max: f32,
    pub damage_type: DamageType,
}

impl WeaponProfile {
    pub fn new(range: f32, interval: f64, damage_min: f32, damage_max: f32, damage_type: DamageType) -> Self {
        Self {
            range,
            interval,
            damage_min,
            damage_max,
            damage_type,
        }
    }
}

/// What a monster can attack with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackProfile {
    pub melee: Option<WeaponProfile>,
    pub missile: Option<WeaponProfile>,
    #[serde(default)]
    pub spells: Vec<SpellId>,
    /// Minimum seconds between two spell casts
    #[serde(default = "AttackProfile::default_cast_delay")]
    pub cast_delay: f64,
    /// Seconds the creature is locked in its attack animation
    #[serde(default = "AttackProfile::default_animation_time")]
    pub animation_time: f64,
}

impl AttackProfile {
    fn default_cast_delay() -> f64 {
        3.0
    }

    fn default_animation_time() -> f64 {
        1.0
    }

    /// A melee-only profile
    pub fn melee(weapon: WeaponProfile) -> Self {
        Self {
            melee: Some(weapon),
            missile: None,
            spells: Vec::new(),
            cast_delay: Self::default_cast_delay(),
            animation_time: Self::default_animation_time(),
        }
    }

    pub fn with_missile(mut self, weapon: WeaponProfile) -> Self {
        self.missile = Some(weapon);
        self
    }

    pub fn with_spells(mut self, spells: Vec<SpellId>) -> Self {
        self.spells = spells;
        self
    }

    pub fn is_ranged(&self) -> bool {
        self.missile.is_some()
    }
}

impl Default for AttackProfile {
    fn default() -> Self {
        Self::melee(WeaponProfile::new(2.0, 2.0, 4.0, 8.0, DamageType::Bludgeoning))
    }
}

/// Attack scheduling state
///
/// `current` and `max_range` describe the attack being lined up. They are
/// cleared after every dispatched attack.
#[derive(Debug, Clone, Default)]
pub struct CombatState {
    pub current: Option<AttackType>,
    pub max_range: f32,
    pub pending_spell: Option<SpellId>,
    next_attack: [f64; 3],
    prev_attack: [f64; 3],
}

impl CombatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_attack_time(&self, attack_type: AttackType) -> f64 {
        self.next_attack[attack_type.index()]
    }

    pub fn prev_attack_time(&self, attack_type: AttackType) -> f64 {
        self.prev_attack[attack_type.index()]
    }

    pub fn set_next_attack_time(&mut self, attack_type: AttackType, at: f64) {
        self.next_attack[attack_type.index()] = at;
    }

    /// Record a dispatched attack and push its cooldown out
    pub fn record_attack(&mut self, attack_type: AttackType, now: f64, interval: f64) {
        self.prev_attack[attack_type.index()] = now;
        self.next_attack[attack_type.index()] = now + interval;
    }

    /// Forget the lined-up attack
    pub fn reset(&mut self) {
        self.current = None;
        self.max_range = 0.0;
        self.pending_spell = None;
    }
}
