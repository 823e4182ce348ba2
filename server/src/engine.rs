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

//! World engine
//!
//! The world is split into square groups of landblocks. Each
//! [`LandblockGroup`] owns its own hecs world, physics, scheduler and AI
//! system, and all groups tick in parallel as tokio tasks. Creatures that
//! wander into a landblock owned by another group are handed over in a
//! sequential phase once every group has finished its tick.
//!
//! # Architecture
//!
//! - **Groups**: created lazily the first time something spawns or arrives in
//!   one of their landblocks
//! - **Registry**: follows persistent creatures across handovers, since the
//!   hecs handle changes on every transfer
//! - **Events**: every group publishes to one shared [`EventBus`]

mod group;
mod registry;

pub use group::{DirtyRecord, Emigrant, LandblockGroup};
pub use registry::{EntityRegistry, Location};

use crate::config::{AiConfig, SimulationConfig};
use crate::ecs::EcsEntity;
use crate::ecs::components::{EntityUuid, LandblockId, Position};
use crate::ecs::content::ContentTables;
use crate::ecs::events::{EventBus, GameEvent};
use crate::ecs::metrics::{AiMetrics, MetricsSnapshot};
use crate::ecs::physics::PlanarPhysics;
use crate::ecs::spawner::{SpawnGroup, SpawnTemplate};
use crate::ecs::systems::{MonsterAiSystem, Relocation};
use crate::error::{AiError, AiResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Identifier of a landblock group, in group-sized steps across the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId {
    pub x: u8,
    pub y: u8,
}

impl GroupId {
    /// The group owning `landblock` when groups are `group_size` landblocks wide
    pub fn containing(landblock: LandblockId, group_size: u8) -> Self {
        let size = group_size.max(1);
        Self {
            x: landblock.block_x() / size,
            y: landblock.block_y() / size,
        }
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02X}{:02X}", self.x, self.y)
    }
}

/// Drives every landblock group in the world
pub struct WorldEngine {
    groups: BTreeMap<GroupId, LandblockGroup>,
    registry: EntityRegistry,
    config: Arc<AiConfig>,
    content: Arc<dyn ContentTables>,
    event_bus: EventBus,
    group_size: u8,
    view_distance: f32,
    seed: u64,
    now: f64,
}

impl WorldEngine {
    pub fn new(
        simulation: &SimulationConfig,
        config: AiConfig,
        content: Arc<dyn ContentTables>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            groups: BTreeMap::new(),
            registry: EntityRegistry::new(),
            config: Arc::new(config),
            content,
            event_bus,
            group_size: *simulation.group_size,
            view_distance: simulation.view_distance,
            seed: *simulation.seed,
            now: 0.0,
        }
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn group_for(&self, landblock: LandblockId) -> GroupId {
        GroupId::containing(landblock, self.group_size)
    }

    pub fn group(&self, id: GroupId) -> Option<&LandblockGroup> {
        self.groups.get(&id)
    }

    pub fn group_mut(&mut self, id: GroupId) -> Option<&mut LandblockGroup> {
        self.groups.get_mut(&id)
    }

    pub fn groups(&self) -> impl Iterator<Item = &LandblockGroup> {
        self.groups.values()
    }

    fn group_or_create(&mut self, id: GroupId) -> &mut LandblockGroup {
        let Self {
            groups,
            config,
            content,
            event_bus,
            view_distance,
            seed,
            now,
            ..
        } = self;
        groups.entry(id).or_insert_with(|| {
            tracing::info!("Starting landblock group {}", id);
            let ai = MonsterAiSystem::new(
                event_bus.clone(),
                config.clone(),
                content.clone(),
                Arc::new(AiMetrics::new()),
                *seed ^ (((id.x as u64) << 8) | id.y as u64),
            );
            LandblockGroup::new(id, Box::new(PlanarPhysics::new(*view_distance)), ai, *now)
        })
    }

    /// Spawn one creature in whichever group owns `position`
    pub fn spawn(&mut self, template: &SpawnTemplate, position: Position) -> Location {
        let id = self.group_for(position.landblock());
        let group = self.group_or_create(id);
        let entity = match template {
            SpawnTemplate::Monster(monster) => group.spawn_monster(monster, position),
            SpawnTemplate::Player(player) => group.spawn_player(player, position),
        };
        let uuid = group.world().get::<&EntityUuid>(entity).ok().map(|uuid| *uuid);
        let location = Location { group: id, entity };
        if let Some(uuid) = uuid {
            if let Err(e) = self.registry.register(uuid, location) {
                tracing::warn!("Failed to register spawned creature: {}", e);
            }
        }
        location
    }

    /// Spawn a template at every one of its positions
    pub fn spawn_group(&mut self, spawn: &SpawnGroup) -> Vec<Location> {
        spawn
            .positions
            .iter()
            .map(|position| self.spawn(&spawn.template, *position))
            .collect()
    }

    /// Current location of a creature, if it is still alive somewhere
    pub fn locate(&self, uuid: EntityUuid) -> Option<Location> {
        self.registry.locate(uuid).filter(|location| {
            self.groups
                .get(&location.group)
                .is_some_and(|group| group.world().contains(location.entity))
        })
    }

    /// Advance every group by `dt`, then hand over creatures that crossed
    /// into another group's landblocks
    ///
    /// Returns how many creatures were transferred.
    #[tracing::instrument(skip(self), fields(now = self.now))]
    pub async fn tick(&mut self, dt: f64) -> usize {
        self.now += dt;

        let mut tasks = JoinSet::new();
        for (_, mut group) in std::mem::take(&mut self.groups) {
            tasks.spawn(async move {
                let relocations = group.tick(dt);
                (group, relocations)
            });
        }

        let mut departures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((group, relocations)) => {
                    let id = group.id();
                    departures.extend(
                        relocations
                            .into_iter()
                            .filter(|relocation| self.group_for(relocation.to) != id)
                            .map(|relocation| (id, relocation)),
                    );
                    self.groups.insert(id, group);
                }
                Err(e) => tracing::error!("Landblock group task failed: {}", e),
            }
        }

        // Handover order must not depend on which task finished first
        departures.sort_by_key(|(id, relocation)| (*id, relocation.entity.to_bits()));
        let mut transferred = 0;
        for (id, relocation) in departures {
            match self.transfer(id, relocation) {
                Ok(_) => transferred += 1,
                Err(e) => tracing::warn!("{}", e),
            }
        }

        let groups = &self.groups;
        self.registry.retain(|location| {
            groups
                .get(&location.group)
                .is_some_and(|group| group.world().contains(location.entity))
        });
        transferred
    }

    /// Move one creature from group `from` to the group owning its new landblock
    pub fn transfer(&mut self, from: GroupId, relocation: Relocation) -> AiResult<EcsEntity> {
        let destination = self.group_for(relocation.to);
        let source = self.groups.get_mut(&from).ok_or_else(|| AiError::Transfer {
            landblock: relocation.to,
            reason: format!("source group {} is not running", from),
        })?;
        let emigrant = source.extract(relocation.entity).ok_or_else(|| AiError::Transfer {
            landblock: relocation.to,
            reason: format!("{:?} left group {} before its handover", relocation.entity, from),
        })?;
        let uuid = emigrant.uuid;

        let entity = self.group_or_create(destination).admit(emigrant);
        if let Some(uuid) = uuid {
            self.registry.relocate(
                uuid,
                Location {
                    group: destination,
                    entity,
                },
            );
        }
        tracing::info!(
            "Transferred {:?} from group {} to group {} as {:?}",
            relocation.entity,
            from,
            destination,
            entity
        );
        self.event_bus.publish(GameEvent::EntityTransferred {
            entity,
            from: relocation.from,
            to: relocation.to,
        });
        Ok(entity)
    }

    /// Drain dirty records from every group for an external save scheduler
    pub fn take_dirty(&mut self) -> Vec<(GroupId, DirtyRecord)> {
        self.groups
            .iter_mut()
            .flat_map(|(id, group)| group.take_dirty().into_iter().map(move |record| (*id, record)))
            .collect()
    }

    /// Counters summed over every group
    pub fn metrics(&self) -> MetricsSnapshot {
        let mut total = MetricsSnapshot::default();
        for group in self.groups.values() {
            total += group.metrics().snapshot();
        }
        total
    }

    /// Forward every group's counters to the `metrics` recorder
    pub fn publish_metrics(&self) {
        for group in self.groups.values() {
            group.metrics().publish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::{CreatureType, Monster, MonsterState};
    use crate::ecs::content::StaticContent;
    use crate::ecs::spawner::{MonsterTemplate, PlayerTemplate};

    fn engine() -> WorldEngine {
        WorldEngine::new(
            &SimulationConfig::default(),
            AiConfig::default(),
            Arc::new(StaticContent::new()),
            EventBus::new(),
        )
    }

    #[test]
    fn test_group_id_containing() {
        assert_eq!(GroupId::containing(LandblockId::new(5, 9), 4), GroupId { x: 1, y: 2 });
        assert_eq!(GroupId::containing(LandblockId::new(5, 9), 0), GroupId { x: 5, y: 9 });
        assert_eq!(GroupId { x: 1, y: 10 }.to_string(), "010A");
    }

    #[test]
    fn test_spawn_creates_groups_lazily() {
        let mut engine = engine();
        let wolf = SpawnTemplate::Monster(MonsterTemplate::new("Wolf", CreatureType(7), 100.0));
        let near = engine.spawn(&wolf, Position::new(10.0, 10.0, 0.0));
        let far = engine.spawn(&wolf, Position::new(192.0 * 9.0, 10.0, 0.0));

        assert_eq!(near.group, GroupId { x: 0, y: 0 });
        assert_eq!(far.group, GroupId { x: 2, y: 0 });
        assert_eq!(engine.groups().count(), 2);
        assert_eq!(engine.registry().len(), 2);
    }

    #[tokio::test]
    async fn test_tick_advances_all_groups() {
        let mut engine = engine();
        let rogue = SpawnTemplate::Player(PlayerTemplate::new("Rogue", 5, 50.0));
        let wolf = SpawnTemplate::Monster(MonsterTemplate::new("Wolf", CreatureType(7), 100.0));
        engine.spawn(&rogue, Position::new(10.0, 10.0, 0.0));
        let hunter = engine.spawn(&wolf, Position::new(15.0, 10.0, 0.0));
        engine.spawn(&wolf, Position::new(192.0 * 9.0, 10.0, 0.0));

        for _ in 0..3 {
            engine.tick(0.1).await;
        }
        assert!((engine.now() - 0.3).abs() < 1e-9);
        for group in engine.groups() {
            assert!((group.now() - 0.3).abs() < 1e-9);
        }
        let group = engine.group(hunter.group).unwrap();
        let monster = group.world().get::<&Monster>(hunter.entity).unwrap();
        assert_eq!(monster.state(), MonsterState::Awake);
    }

    #[tokio::test]
    async fn test_dragged_player_is_transferred() {
        let mut engine = engine();
        let rogue = SpawnTemplate::Player(PlayerTemplate::new("Rogue", 5, 50.0));
        let at = engine.spawn(&rogue, Position::new(760.0, 10.0, 0.0));
        let uuid = *engine
            .group(at.group)
            .unwrap()
            .world()
            .get::<&EntityUuid>(at.entity)
            .unwrap();

        let group = engine.group_mut(at.group).unwrap();
        group.with_ctx(|_, ctx| ctx.physics.teleport(at.entity, Position::new(780.0, 10.0, 0.0)));
        assert_eq!(engine.tick(0.1).await, 1);

        let moved = engine.locate(uuid).unwrap();
        assert_eq!(moved.group, GroupId { x: 1, y: 0 });
        assert!(!engine.group(at.group).unwrap().world().contains(at.entity));
        assert!(engine.event_bus().drain().iter().any(|event| matches!(
            event,
            GameEvent::EntityTransferred { entity, .. } if *entity == moved.entity
        )));
    }
}
