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

//! Creature templates and the helpers that turn them into entities

use crate::config::AiConfig;
use crate::ecs::components::*;
use crate::ecs::physics::PhysicsEngine;
use crate::ecs::{EcsEntity, GameWorld};
use flagset::FlagSet;
use serde::{Deserialize, Serialize};

/// Everything needed to spawn a monster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonsterTemplate {
    pub name: String,
    pub creature_type: CreatureType,
    #[serde(default)]
    pub friend_type: Option<CreatureType>,
    #[serde(default)]
    pub foe_type: Option<CreatureType>,
    #[serde(default)]
    pub faction: FlagSet<Faction>,
    #[serde(default = "MonsterTemplate::default_level")]
    pub level: u32,
    pub health: f32,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub immobile: bool,
    #[serde(default)]
    pub tactics: FlagSet<TargetingTactic>,
    #[serde(default)]
    pub tolerance: FlagSet<Tolerance>,
    #[serde(default = "MonsterTemplate::default_visual_range")]
    pub visual_range: f32,
    #[serde(default = "MonsterTemplate::default_aural_range")]
    pub aural_range: f32,
    #[serde(default = "MonsterTemplate::default_chase_range")]
    pub chase_range: f32,
    /// Overrides the configured leash radius
    #[serde(default)]
    pub home_radius: Option<f32>,
    #[serde(default)]
    pub attacks: AttackProfile,
    #[serde(default)]
    pub enrage: Option<EnrageProfile>,
    #[serde(default)]
    pub persistent: bool,
}

impl MonsterTemplate {
    fn default_level() -> u32 {
        1
    }

    fn default_visual_range() -> f32 {
        20.0
    }

    fn default_aural_range() -> f32 {
        40.0
    }

    fn default_chase_range() -> f32 {
        60.0
    }

    /// A plain melee monster with default perception
    pub fn new(name: impl Into<String>, creature_type: CreatureType, health: f32) -> Self {
        Self {
            name: name.into(),
            creature_type,
            friend_type: None,
            foe_type: None,
            faction: FlagSet::default(),
            level: Self::default_level(),
            health,
            hidden: false,
            immobile: false,
            tactics: FlagSet::default(),
            tolerance: FlagSet::default(),
            visual_range: Self::default_visual_range(),
            aural_range: Self::default_aural_range(),
            chase_range: Self::default_chase_range(),
            home_radius: None,
            attacks: AttackProfile::default(),
            enrage: None,
            persistent: false,
        }
    }

    fn creature(&self) -> Creature {
        let mut flags: FlagSet<CreatureFlag> = CreatureFlag::Attackable.into();
        if self.hidden {
            flags |= CreatureFlag::Hidden;
        }
        if self.immobile {
            flags |= CreatureFlag::Immobile;
        }
        let mut creature = Creature::new(CreatureKind::Monster, self.creature_type, self.level)
            .with_faction(self.faction)
            .with_flags(flags);
        creature.friend_type = self.friend_type;
        creature.foe_type = self.foe_type;
        creature
    }

    fn monster(&self) -> Monster {
        Monster::new()
            .with_tactics(self.tactics)
            .with_tolerance(self.tolerance)
            .with_ranges(self.visual_range, self.aural_range, self.chase_range)
    }
}

/// Everything needed to spawn a player stand-in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerTemplate {
    pub name: String,
    #[serde(default = "MonsterTemplate::default_level")]
    pub level: u32,
    pub health: f32,
    #[serde(default)]
    pub faction: FlagSet<Faction>,
    #[serde(default)]
    pub hidden: bool,
}

impl PlayerTemplate {
    pub fn new(name: impl Into<String>, level: u32, health: f32) -> Self {
        Self {
            name: name.into(),
            level,
            health,
            faction: FlagSet::default(),
            hidden: false,
        }
    }
}

/// A template tagged with what it spawns
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SpawnTemplate {
    Monster(MonsterTemplate),
    Player(PlayerTemplate),
}

/// One template spawned at each listed position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnGroup {
    pub template: SpawnTemplate,
    pub positions: Vec<Position>,
}

/// Spawn a monster at `position`, which also becomes its home
pub fn spawn_monster(
    world: &mut GameWorld,
    physics: &mut dyn PhysicsEngine,
    template: &MonsterTemplate,
    position: Position,
    config: &AiConfig,
) -> EcsEntity {
    let home_radius = template.home_radius.unwrap_or(config.home_radius);
    let entity = world.spawn((
        EntityUuid::new(),
        Name::new(template.name.clone()),
        template.creature(),
        Vitals::new(template.health),
        position,
        template.monster(),
        Navigator::new(position, home_radius),
        template.attacks.clone(),
        CombatState::new(),
        DamageHistory::new(),
    ));
    if let Some(profile) = &template.enrage {
        let _ = world.insert_one(entity, Enrage::new(profile.clone()));
    }
    if template.persistent {
        let _ = world.insert_one(entity, Persistent);
    }
    physics.add_body(entity, position);
    tracing::debug!("Spawned monster {} as {:?} at {:?}", template.name, entity, position);
    entity
}

/// Spawn a player at `position`. Players are always persistent.
pub fn spawn_player(
    world: &mut GameWorld,
    physics: &mut dyn PhysicsEngine,
    template: &PlayerTemplate,
    position: Position,
) -> EcsEntity {
    let mut creature = Creature::player(template.level).with_faction(template.faction);
    if template.hidden {
        creature.flags |= CreatureFlag::Hidden;
    }
    let entity = world.spawn((
        EntityUuid::new(),
        Name::new(template.name.clone()),
        creature,
        Vitals::new(template.health),
        position,
        DamageHistory::new(),
        Persistent,
    ));
    physics.add_body(entity, position);
    tracing::debug!("Spawned player {} as {:?} at {:?}", template.name, entity, position);
    entity
}
