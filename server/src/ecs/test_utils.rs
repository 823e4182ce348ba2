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

//! Test utilities for ECS testing

use crate::config::AiConfig;
use crate::ecs::components::{CreatureType, Position};
use crate::ecs::content::StaticContent;
use crate::ecs::events::EventBus;
use crate::ecs::metrics::AiMetrics;
use crate::ecs::physics::PlanarPhysics;
use crate::ecs::scheduler::Scheduler;
use crate::ecs::spawner::{MonsterTemplate, PlayerTemplate, spawn_monster, spawn_player};
use crate::ecs::systems::MonsterAiSystem;
use crate::ecs::{EcsEntity, GameWorld, TickContext};
use std::sync::Arc;

/// A single landblock group without the engine around it
pub struct TestGroup {
    pub world: GameWorld,
    pub physics: PlanarPhysics,
    pub scheduler: Scheduler,
    pub ai: MonsterAiSystem,
    pub bus: EventBus,
    pub config: Arc<AiConfig>,
    pub now: f64,
}

impl TestGroup {
    pub fn new() -> Self {
        Self::with_setup(AiConfig::default(), StaticContent::new())
    }

    pub fn with_content(content: StaticContent) -> Self {
        Self::with_setup(AiConfig::default(), content)
    }

    pub fn with_setup(config: AiConfig, content: StaticContent) -> Self {
        let bus = EventBus::new();
        let config = Arc::new(config);
        let ai = MonsterAiSystem::new(
            bus.clone(),
            config.clone(),
            Arc::new(content),
            Arc::new(AiMetrics::new()),
            7,
        );
        Self {
            world: GameWorld::new(),
            physics: PlanarPhysics::default(),
            scheduler: Scheduler::new(),
            ai,
            bus,
            config,
            now: 0.0,
        }
    }

    /// Spawn a plain melee monster
    pub fn monster(&mut self, position: Position) -> EcsEntity {
        self.monster_from(&MonsterTemplate::new("Test Wolf", CreatureType(7), 100.0), position)
    }

    pub fn monster_from(&mut self, template: &MonsterTemplate, position: Position) -> EcsEntity {
        spawn_monster(&mut self.world, &mut self.physics, template, position, &self.config)
    }

    pub fn player(&mut self, position: Position) -> EcsEntity {
        spawn_player(
            &mut self.world,
            &mut self.physics,
            &PlayerTemplate::new("Test Player", 10, 100.0),
            position,
        )
    }

    /// Run `f` against a tick context at the current time
    pub fn with_ctx<R>(&mut self, f: impl FnOnce(&mut MonsterAiSystem, &mut TickContext) -> R) -> R {
        let mut ctx = TickContext::new(&mut self.world, &mut self.physics, &mut self.scheduler, self.now);
        f(&mut self.ai, &mut ctx)
    }

    /// Advance the clock by `dt` and run a full group step
    pub fn tick(&mut self, dt: f64) {
        self.now += dt;
        let mut ctx = TickContext::new(&mut self.world, &mut self.physics, &mut self.scheduler, self.now);
        self.ai.step(&mut ctx, dt as f32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::{Creature, Monster};

    #[test]
    fn test_group_spawns() {
        let mut group = TestGroup::new();
        let wolf = group.monster(Position::default());
        let player = group.player(Position::new(50.0, 0.0, 0.0));

        assert!(group.world.get::<&Monster>(wolf).is_ok());
        assert!(group.world.get::<&Creature>(player).unwrap().is_player());
        group.tick(0.1);
        assert!((group.now - 0.1).abs() < 1e-9);
    }
}
