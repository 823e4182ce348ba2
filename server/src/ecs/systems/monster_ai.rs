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

//! Monster decision loop
//!
//! [`MonsterAiSystem`] drives every monster in a landblock group. Its
//! behavior is split by concern over the sibling modules (awareness, alert,
//! navigation, combat, enrage); this module owns the per-tick state machine
//! that ties them together.

use crate::config::AiConfig;
use crate::ecs::components::{CombatState, Creature, Enrage, Hazard, Monster, MonsterState, Navigator, Vitals};
use crate::ecs::content::ContentTables;
use crate::ecs::events::{EventBus, GameEvent};
use crate::ecs::metrics::AiMetrics;
use crate::ecs::physics::MotionEvent;
use crate::ecs::scheduler::ScheduledAction;
use crate::ecs::systems::enrage::EnrageCommand;
use crate::ecs::systems::navigation::{Relocation, sync_positions};
use crate::ecs::{EcsEntity, Entity, GameWorld, TickContext};
use crate::error::{AiError, AiResult};
use hecs::{ComponentError, RefMut};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Capacity of the enrage command channel per group
const ENRAGE_CHANNEL_CAPACITY: usize = 256;

/// Drives awareness, navigation, combat, and enrage for a landblock group
pub struct MonsterAiSystem {
    pub(super) event_bus: EventBus,
    pub(super) config: Arc<AiConfig>,
    pub(super) content: Arc<dyn ContentTables>,
    pub(super) metrics: Arc<AiMetrics>,
    pub(super) rng: StdRng,
    pub(super) enrage_tx: mpsc::Sender<EnrageCommand>,
    pub(super) enrage_rx: mpsc::Receiver<EnrageCommand>,
}

impl MonsterAiSystem {
    pub fn new(
        event_bus: EventBus,
        config: Arc<AiConfig>,
        content: Arc<dyn ContentTables>,
        metrics: Arc<AiMetrics>,
        seed: u64,
    ) -> Self {
        let (enrage_tx, enrage_rx) = mpsc::channel(ENRAGE_CHANNEL_CAPACITY);
        Self {
            event_bus,
            config,
            content,
            metrics,
            rng: StdRng::seed_from_u64(seed),
            enrage_tx,
            enrage_rx,
        }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    pub fn metrics(&self) -> &AiMetrics {
        &self.metrics
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Advance the group by `dt` seconds ending at `ctx.now`
    ///
    /// Physics moves first. Positions are synced, then queued enrage and
    /// scheduled work is applied before the monsters decide. Returns every
    /// entity that crossed into another landblock.
    #[tracing::instrument(skip(self, ctx), fields(now = ctx.now))]
    pub fn step(&mut self, ctx: &mut TickContext, dt: f32) -> Vec<Relocation> {
        for event in ctx.physics.step(dt) {
            self.on_motion_event(ctx, event);
        }
        let relocations = sync_positions(ctx.world, &*ctx.physics);
        self.drain_enrage_commands(ctx);
        self.run_scheduled(ctx);
        self.tick(ctx);
        self.pulse_hazards(ctx);
        relocations
    }

    fn run_scheduled(&mut self, ctx: &mut TickContext) {
        for action in ctx.scheduler.take_due(ctx.now) {
            match action {
                ScheduledAction::LandAttack(hit) => self.land_attack(ctx, hit),
                ScheduledAction::RemoveEntity(entity) => self.remove_entity(ctx, entity),
            }
        }
    }

    /// Despawn a corpse or an expired hazard
    pub fn remove_entity(&mut self, ctx: &mut TickContext, entity: EcsEntity) {
        if let Ok(mut enrage) = ctx.world.get::<&mut Enrage>(entity) {
            enrage.cancel_loops();
        }
        let hazard = ctx.world.satisfies::<&Hazard>(entity);
        ctx.physics.remove_body(entity);
        ctx.scheduler.cancel_involving(entity);
        if ctx.world.despawn(entity).is_err() {
            return;
        }
        if hazard {
            self.event_bus.publish(GameEvent::HazardExpired { hazard: entity });
        } else {
            tracing::debug!("Despawned {:?}", entity);
            self.event_bus.publish(GameEvent::EntityDespawned { entity });
        }
    }

    /// Run one decision step for every living monster in the group
    pub fn tick(&mut self, ctx: &mut TickContext) {
        let monsters: Vec<EcsEntity> = ctx
            .world
            .query::<(Entity, &Monster)>()
            .iter()
            .map(|(entity, _)| entity)
            .collect();

        for entity in monsters {
            if !is_alive(ctx, entity) {
                continue;
            }
            let Ok(state) = ctx.world.get::<&Monster>(entity).map(|m| m.state()) else {
                continue;
            };
            match state {
                MonsterState::Idle => self.tick_idle(ctx, entity),
                MonsterState::Awake => self.tick_awake(ctx, entity),
                MonsterState::Return => self.tick_return(ctx, entity),
            }
        }
    }

    fn tick_idle(&mut self, ctx: &mut TickContext, entity: EcsEntity) {
        let now = ctx.now;
        let ready = match ctx.world.get::<&mut Monster>(entity) {
            Ok(mut monster) if !monster.is_passive() && now >= monster.next_scan => {
                monster.next_scan = now + self.config.scan_interval;
                true
            }
            _ => false,
        };
        if !ready {
            return;
        }
        if !self.visible_targets(ctx, entity).is_empty() {
            if let Err(e) = self.wake_up(ctx, entity, true) {
                tracing::warn!("Monster {:?} failed to wake: {}", entity, e);
            }
        }
    }

    fn tick_return(&mut self, ctx: &mut TickContext, entity: EcsEntity) {
        if self.check_stuck(ctx, entity) {
            return;
        }
        if self.check_distress(ctx, entity) {
            return;
        }
        // Aborted or transferred moves leave the navigator idle mid-return
        let walking = ctx
            .world
            .get::<&Navigator>(entity)
            .map(|nav| nav.is_moving() || nav.is_turning())
            .unwrap_or(true);
        if !walking {
            if let Err(e) = self.move_to_home(ctx, entity) {
                tracing::warn!("Monster {:?} failed to resume heading home: {}", entity, e);
            }
        }
    }

    fn tick_awake(&mut self, ctx: &mut TickContext, entity: EcsEntity) {
        let now = ctx.now;
        let (target, busy, next_find_target, chase_range) = match ctx.world.get::<&Monster>(entity) {
            Ok(monster) => (
                monster.attack_target(),
                monster.is_busy(now),
                monster.next_find_target,
                monster.chase_range,
            ),
            Err(_) => return,
        };
        if busy {
            return;
        }
        if self.check_leash(ctx, entity) {
            return;
        }

        let target_lost = target.is_none_or(|target| !is_valid_target(ctx, target));
        if target_lost || now >= next_find_target {
            match self.find_next_target(ctx, entity) {
                Ok(Some(_)) => {}
                Ok(None) => return,
                Err(e) => {
                    tracing::warn!("Monster {:?} target selection failed: {}", entity, e);
                    return;
                }
            }
        }

        let distance = self.distance_to_target(ctx, entity);
        if distance > chase_range {
            tracing::debug!("Monster {:?} lost its target at {:.1}", entity, distance);
            if let Err(e) = self.find_next_target(ctx, entity) {
                tracing::warn!("Monster {:?} target selection failed: {}", entity, e);
            }
            return;
        }

        if self.resolve_attack_type(ctx, entity).is_none() {
            return;
        }
        let max_range = ctx
            .world
            .get::<&CombatState>(entity)
            .map(|combat| combat.max_range)
            .unwrap_or(0.0);

        if in_range(distance, max_range) {
            let moving = ctx
                .world
                .get::<&Navigator>(entity)
                .map(|nav| nav.is_moving())
                .unwrap_or(false);
            if moving {
                ctx.physics.cancel_move(entity);
                if let Ok(mut nav) = ctx.world.get::<&mut Navigator>(entity) {
                    nav.stop();
                }
            }
            if self.is_attack_ready(ctx, entity) {
                if let Err(e) = self.attack(ctx, entity) {
                    tracing::warn!("Monster {:?} attack failed: {}", entity, e);
                }
            }
            return;
        }

        let idle = ctx
            .world
            .get::<&Navigator>(entity)
            .map(|nav| !nav.is_moving() && !nav.is_turning())
            .unwrap_or(false);
        if idle {
            self.start_turn(ctx, entity);
        } else {
            self.check_stuck(ctx, entity);
        }
    }

    /// React to a motion finishing or aborting in physics
    pub fn on_motion_event(&mut self, ctx: &mut TickContext, event: MotionEvent) {
        match event {
            MotionEvent::Completed(entity) => self.on_move_complete(ctx, entity),
            MotionEvent::Aborted(entity) => {
                if let Ok(mut nav) = ctx.world.get::<&mut Navigator>(entity) {
                    nav.stop();
                }
            }
        }
    }
}

/// Slack on the range check so a move that stops exactly at attack range
/// still counts as arrived
pub(super) const RANGE_TOLERANCE: f32 = 0.01;

pub(super) fn in_range(distance: f32, max_range: f32) -> bool {
    distance <= max_range + RANGE_TOLERANCE
}

pub(super) fn is_alive(ctx: &TickContext, entity: EcsEntity) -> bool {
    ctx.world
        .get::<&Vitals>(entity)
        .map(|vitals| vitals.is_alive())
        .unwrap_or(false)
}

/// Mutable access to a monster's AI component
pub(super) fn monster_mut(world: &GameWorld, entity: EcsEntity) -> AiResult<RefMut<'_, Monster>> {
    world.get::<&mut Monster>(entity).map_err(|e| match e {
        ComponentError::NoSuchEntity => AiError::EntityNotFound(entity),
        ComponentError::MissingComponent(_) => AiError::NotAMonster(entity),
    })
}

/// Whether `target` still exists here and can be fought
pub(super) fn is_valid_target(ctx: &TickContext, target: EcsEntity) -> bool {
    if !is_alive(ctx, target) {
        return false;
    }
    ctx.world
        .get::<&Creature>(target)
        .map(|creature| creature.is_attackable() && !creature.is_hidden() && !creature.is_teleporting())
        .unwrap_or(false)
}
