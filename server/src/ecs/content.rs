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

//! Read-only content tables consulted by the combat scheduler and navigation

use crate::ecs::components::{AttackHeight, CreatureType, DamageType};
use crate::error::{AiError, AiResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifier of a spell in the content tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpellId(pub u32);

impl std::fmt::Display for SpellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "spell#{}", self.0)
    }
}

/// Spell data needed to decide whether and how to cast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellInfo {
    pub name: String,
    /// Probability in `[0, 1]` that the spell is picked on a given roll
    pub cast_chance: f32,
    pub range: f32,
    /// Projectile spells need line of sight to the target
    #[serde(default)]
    pub projectile: bool,
    #[serde(default = "SpellInfo::default_projectile_speed")]
    pub projectile_speed: f32,
    pub damage_min: f32,
    pub damage_max: f32,
    pub damage_type: DamageType,
}

impl SpellInfo {
    fn default_projectile_speed() -> f32 {
        20.0
    }
}

/// Content lookups used by the decision loop
#[cfg_attr(test, mockall::automock)]
pub trait ContentTables: Send + Sync {
    fn spell(&self, id: SpellId) -> Option<SpellInfo>;

    /// Melee attack heights available to a creature type
    fn maneuvers(&self, creature_type: CreatureType) -> Vec<AttackHeight>;

    /// Running speed in world units per second
    fn run_speed(&self, creature_type: CreatureType) -> f32;
}

/// Content tables loaded from the `content` section of the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticContent {
    #[serde(default)]
    pub spells: HashMap<SpellId, SpellInfo>,
    #[serde(default)]
    pub maneuvers: HashMap<CreatureType, Vec<AttackHeight>>,
    #[serde(default)]
    pub run_speeds: HashMap<CreatureType, f32>,
    #[serde(default = "StaticContent::default_run_speed")]
    pub default_run_speed: f32,
}

impl StaticContent {
    fn default_run_speed() -> f32 {
        4.0
    }

    pub fn new() -> Self {
        Self {
            spells: HashMap::new(),
            maneuvers: HashMap::new(),
            run_speeds: HashMap::new(),
            default_run_speed: Self::default_run_speed(),
        }
    }

    /// Parse content from YAML text
    pub fn from_yaml(text: &str) -> AiResult<Self> {
        let content: StaticContent =
            serde_yaml::from_str(text).map_err(|e| AiError::ContentParse(e.to_string()))?;
        content.validate()?;
        Ok(content)
    }

    fn validate(&self) -> AiResult<()> {
        for (id, spell) in &self.spells {
            if !(0.0..=1.0).contains(&spell.cast_chance) {
                return Err(AiError::ContentParse(format!(
                    "{} '{}' has cast chance {} outside [0, 1]",
                    id, spell.name, spell.cast_chance
                )));
            }
            if spell.damage_min > spell.damage_max {
                return Err(AiError::ContentParse(format!(
                    "{} '{}' has damage_min above damage_max",
                    id, spell.name
                )));
            }
        }
        Ok(())
    }

    pub fn with_spell(mut self, id: SpellId, spell: SpellInfo) -> Self {
        self.spells.insert(id, spell);
        self
    }

    pub fn with_run_speed(mut self, creature_type: CreatureType, speed: f32) -> Self {
        self.run_speeds.insert(creature_type, speed);
        self
    }
}

impl Default for StaticContent {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentTables for StaticContent {
    fn spell(&self, id: SpellId) -> Option<SpellInfo> {
        self.spells.get(&id).cloned()
    }

    fn maneuvers(&self, creature_type: CreatureType) -> Vec<AttackHeight> {
        self.maneuvers
            .get(&creature_type)
            .cloned()
            .unwrap_or_else(|| vec![AttackHeight::High, AttackHeight::Medium, AttackHeight::Low])
    }

    fn run_speed(&self, creature_type: CreatureType) -> f32 {
        self.run_speeds
            .get(&creature_type)
            .copied()
            .unwrap_or(self.default_run_speed)
    }
}
