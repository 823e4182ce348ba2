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

//! A landblock group: one world, one physics instance, one scheduler

use crate::ecs::components::*;
use crate::ecs::events::GameEvent;
use crate::ecs::metrics::AiMetrics;
use crate::ecs::physics::PhysicsEngine;
use crate::ecs::scheduler::Scheduler;
use crate::ecs::spawner::{MonsterTemplate, PlayerTemplate, spawn_monster, spawn_player};
use crate::ecs::systems::{MonsterAiSystem, Relocation};
use crate::ecs::{EcsEntity, Entity, GameWorld, TickContext};
use crate::engine::GroupId;
use hecs::{Component, EntityBuilder};
use std::collections::{HashMap, HashSet};

/// A persistent record changed since the last save
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirtyRecord {
    pub entity: EcsEntity,
    pub uuid: Option<EntityUuid>,
    pub since: f64,
}

/// A creature in transit between two groups
pub struct Emigrant {
    pub uuid: Option<EntityUuid>,
    pub position: Position,
    components: EntityBuilder,
}

/// Owns everything needed to simulate a square of landblocks
///
/// Ticking a group is strictly sequential. Groups share nothing, so the
/// engine ticks them in parallel.
pub struct LandblockGroup {
    id: GroupId,
    world: GameWorld,
    physics: Box<dyn PhysicsEngine>,
    scheduler: Scheduler,
    ai: MonsterAiSystem,
    index: HashMap<LandblockId, HashSet<EcsEntity>>,
    landblocks: HashMap<EcsEntity, LandblockId>,
    now: f64,
}

impl LandblockGroup {
    pub fn new(id: GroupId, physics: Box<dyn PhysicsEngine>, ai: MonsterAiSystem, now: f64) -> Self {
        Self {
            id,
            world: GameWorld::new(),
            physics,
            scheduler: Scheduler::new(),
            ai,
            index: HashMap::new(),
            landblocks: HashMap::new(),
            now,
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn world(&self) -> &GameWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut GameWorld {
        &mut self.world
    }

    pub fn physics(&self) -> &dyn PhysicsEngine {
        &*self.physics
    }

    pub fn metrics(&self) -> &AiMetrics {
        self.ai.metrics()
    }

    pub fn spawn_monster(&mut self, template: &MonsterTemplate, position: Position) -> EcsEntity {
        let entity = spawn_monster(&mut self.world, &mut *self.physics, template, position, self.ai.config());
        self.admitted(entity, template.name.clone(), position);
        entity
    }

    pub fn spawn_player(&mut self, template: &PlayerTemplate, position: Position) -> EcsEntity {
        let entity = spawn_player(&mut self.world, &mut *self.physics, template, position);
        self.admitted(entity, template.name.clone(), position);
        entity
    }

    fn admitted(&mut self, entity: EcsEntity, name: String, position: Position) {
        let landblock = position.landblock();
        self.index_entity(entity, landblock);
        self.ai.event_bus().publish(GameEvent::EntitySpawned {
            entity,
            name,
            landblock,
        });
    }

    fn index_entity(&mut self, entity: EcsEntity, landblock: LandblockId) {
        self.index.entry(landblock).or_default().insert(entity);
        self.landblocks.insert(entity, landblock);
    }

    fn unindex_entity(&mut self, entity: EcsEntity) {
        if let Some(landblock) = self.landblocks.remove(&entity) {
            if let Some(entities) = self.index.get_mut(&landblock) {
                entities.remove(&entity);
                if entities.is_empty() {
                    self.index.remove(&landblock);
                }
            }
        }
    }

    /// Move an entity between landblocks in the spatial index
    pub fn relocate(&mut self, entity: EcsEntity, to: LandblockId) {
        self.unindex_entity(entity);
        self.index_entity(entity, to);
    }

    pub fn entities_in(&self, landblock: LandblockId) -> Vec<EcsEntity> {
        self.index
            .get(&landblock)
            .map(|entities| entities.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn landblock_of(&self, entity: EcsEntity) -> Option<LandblockId> {
        self.landblocks.get(&entity).copied()
    }

    /// Run `f` against this group's tick context
    pub fn with_ctx<R>(&mut self, f: impl FnOnce(&mut MonsterAiSystem, &mut TickContext) -> R) -> R {
        let mut ctx = TickContext::new(&mut self.world, &mut *self.physics, &mut self.scheduler, self.now);
        f(&mut self.ai, &mut ctx)
    }

    /// Advance the group by `dt` seconds
    ///
    /// Returns every landblock crossing of the tick. The spatial index has
    /// already been updated for all of them; the engine decides which ones
    /// leave the group.
    #[tracing::instrument(skip(self), fields(group = %self.id))]
    pub fn tick(&mut self, dt: f64) -> Vec<Relocation> {
        self.now += dt;
        let mut ctx = TickContext::new(&mut self.world, &mut *self.physics, &mut self.scheduler, self.now);
        let relocations = self.ai.step(&mut ctx, dt as f32);
        for relocation in &relocations {
            self.relocate(relocation.entity, relocation.to);
        }

        let departed: Vec<EcsEntity> = self
            .landblocks
            .keys()
            .filter(|entity| !self.world.contains(**entity))
            .copied()
            .collect();
        for entity in departed {
            self.unindex_entity(entity);
        }
        relocations
    }

    /// Strip the dirty mark from every changed persistent record
    pub fn take_dirty(&mut self) -> Vec<DirtyRecord> {
        let records: Vec<DirtyRecord> = self
            .world
            .query::<(Entity, &Dirty, Option<&EntityUuid>)>()
            .iter()
            .map(|(entity, dirty, uuid)| DirtyRecord {
                entity,
                uuid: uuid.copied(),
                since: dirty.since,
            })
            .collect();
        for record in &records {
            let _ = self.world.remove_one::<Dirty>(record.entity);
        }
        records
    }

    /// Take a creature out of this group, components and physics body both
    ///
    /// Enrage loops are cancelled here and re-armed by the receiving group.
    /// Returns `None` if the entity no longer exists.
    pub fn extract(&mut self, entity: EcsEntity) -> Option<Emigrant> {
        if !self.world.contains(entity) {
            return None;
        }
        if let Ok(mut enrage) = self.world.get::<&mut Enrage>(entity) {
            enrage.cancel_loops();
        }
        let uuid = self.world.get::<&EntityUuid>(entity).ok().map(|uuid| *uuid);
        let physical = self.physics.remove_body(entity);
        let position = physical
            .or_else(|| self.world.get::<&Position>(entity).ok().map(|p| *p))
            .unwrap_or_default();

        let mut components = EntityBuilder::new();
        carry::<EntityUuid>(&mut self.world, entity, &mut components);
        carry::<Name>(&mut self.world, entity, &mut components);
        carry::<Creature>(&mut self.world, entity, &mut components);
        carry::<Vitals>(&mut self.world, entity, &mut components);
        carry::<Monster>(&mut self.world, entity, &mut components);
        carry::<Navigator>(&mut self.world, entity, &mut components);
        carry::<AttackProfile>(&mut self.world, entity, &mut components);
        carry::<CombatState>(&mut self.world, entity, &mut components);
        carry::<DamageHistory>(&mut self.world, entity, &mut components);
        carry::<Enrage>(&mut self.world, entity, &mut components);
        carry::<Persistent>(&mut self.world, entity, &mut components);
        carry::<Dirty>(&mut self.world, entity, &mut components);
        components.add(position);

        let _ = self.world.despawn(entity);
        self.unindex_entity(entity);
        Some(Emigrant {
            uuid,
            position,
            components,
        })
    }

    /// Spawn a creature handed over by another group
    ///
    /// Every handle it carried referred to the old world and is dropped. A
    /// monster keeps its state but has to choose a new target here.
    pub fn admit(&mut self, mut emigrant: Emigrant) -> EcsEntity {
        let entity = self.world.spawn(emigrant.components.build());
        self.physics.add_body(entity, emigrant.position);
        self.index_entity(entity, emigrant.position.landblock());

        if let Ok(mut monster) = self.world.get::<&mut Monster>(entity) {
            monster.forget_entities();
        }
        if let Ok(mut nav) = self.world.get::<&mut Navigator>(entity) {
            nav.stop();
        }
        if let Ok(mut combat) = self.world.get::<&mut CombatState>(entity) {
            combat.reset();
        }
        if let Ok(mut history) = self.world.get::<&mut DamageHistory>(entity) {
            history.clear();
        }
        if let Ok(mut enrage) = self.world.get::<&mut Enrage>(entity) {
            enrage.grapple_victim = None;
            enrage.last_grappled = None;
        }
        self.with_ctx(|ai, ctx| ai.rearm_enrage(ctx, entity));
        entity
    }
}

fn carry<T: Component>(world: &mut GameWorld, entity: EcsEntity, components: &mut EntityBuilder) {
    if let Ok(component) = world.remove_one::<T>(entity) {
        components.add(component);
    }
}
