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

//! Shared setup for integration tests

#![allow(dead_code)]

use bestiary_server::config::AiConfig;
use bestiary_server::ecs::components::{CreatureType, Position};
use bestiary_server::ecs::content::StaticContent;
use bestiary_server::ecs::events::{EventBus, GameEvent};
use bestiary_server::ecs::metrics::AiMetrics;
use bestiary_server::ecs::physics::PlanarPhysics;
use bestiary_server::ecs::scheduler::Scheduler;
use bestiary_server::ecs::spawner::{MonsterTemplate, PlayerTemplate, spawn_monster, spawn_player};
use bestiary_server::ecs::systems::MonsterAiSystem;
use bestiary_server::ecs::{EcsEntity, GameWorld, TickContext};
use std::sync::Arc;

/// One landblock group's worth of state, driven by hand
pub struct Harness {
    pub world: GameWorld,
    pub physics: PlanarPhysics,
    pub scheduler: Scheduler,
    pub ai: MonsterAiSystem,
    pub bus: EventBus,
    pub config: Arc<AiConfig>,
    pub now: f64,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(AiConfig::default())
    }

    pub fn with_config(config: AiConfig) -> Self {
        let bus = EventBus::new();
        let config = Arc::new(config);
        let ai = MonsterAiSystem::new(
            bus.clone(),
            config.clone(),
            Arc::new(StaticContent::new()),
            Arc::new(AiMetrics::new()),
            42,
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

    pub fn wolf(&mut self, position: Position) -> EcsEntity {
        self.spawn(&MonsterTemplate::new("Wolf", CreatureType(7), 100.0), position)
    }

    pub fn spawn(&mut self, template: &MonsterTemplate, position: Position) -> EcsEntity {
        spawn_monster(&mut self.world, &mut self.physics, template, position, &self.config)
    }

    pub fn player(&mut self, position: Position) -> EcsEntity {
        spawn_player(
            &mut self.world,
            &mut self.physics,
            &PlayerTemplate::new("Adventurer", 10, 100.0),
            position,
        )
    }

    pub fn with_ctx<R>(&mut self, f: impl FnOnce(&mut MonsterAiSystem, &mut TickContext) -> R) -> R {
        let mut ctx = TickContext::new(&mut self.world, &mut self.physics, &mut self.scheduler, self.now);
        f(&mut self.ai, &mut ctx)
    }

    pub fn tick(&mut self, dt: f64) {
        self.now += dt;
        let mut ctx = TickContext::new(&mut self.world, &mut self.physics, &mut self.scheduler, self.now);
        self.ai.step(&mut ctx, dt as f32);
    }

    pub fn events(&self) -> Vec<GameEvent> {
        self.bus.drain()
    }
}

pub fn at(x: f32, y: f32) -> Position {
    Position::new(x, y, 0.0)
}
