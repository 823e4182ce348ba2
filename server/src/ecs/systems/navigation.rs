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

//! Navigation: chasing, turning, leashing, and getting unstuck
//!
//! Motion itself is executed by the [`PhysicsEngine`]; this module decides
//! when to start and abandon motions and keeps the [`Navigator`] component in
//! step with what physics is doing.

use super::monster_ai::{MonsterAiSystem, in_range, is_alive, is_valid_target, monster_mut};
use crate::ecs::components::{
    AttackType, CombatState, Creature, Enrage, LandblockId, Monster, MonsterState, MotionState, Navigator, Position,
};
use crate::ecs::events::GameEvent;
use crate::ecs::physics::{MoveParams, PhysicsEngine};
use crate::ecs::{EcsEntity, Entity, GameWorld, TickContext};
use crate::error::AiResult;

/// An entity whose position crossed into another landblock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    pub entity: EcsEntity,
    pub from: LandblockId,
    pub to: LandblockId,
}

/// Copy physics positions into [`Position`] components
///
/// Returns every entity whose landblock changed so the owner can update its
/// spatial index. Entities without a physics body keep their position.
pub fn sync_positions(world: &mut GameWorld, physics: &dyn PhysicsEngine) -> Vec<Relocation> {
    let mut relocations = Vec::new();
    for (entity, position) in world.query_mut::<(Entity, &mut Position)>() {
        let Some(current) = physics.position(entity) else {
            continue;
        };
        if current == *position {
            continue;
        }
        let from = position.landblock();
        *position = current;
        let to = current.landblock();
        if from != to {
            relocations.push(Relocation { entity, from, to });
        }
    }
    relocations
}

impl MonsterAiSystem {
    /// Distance to the current target, `f32::MAX` without one
    pub(super) fn distance_to_target(&self, ctx: &TickContext, entity: EcsEntity) -> f32 {
        let physics = &*ctx.physics;
        let Ok(mut monster) = ctx.world.get::<&mut Monster>(entity) else {
            return f32::MAX;
        };
        let Some(target) = monster.attack_target() else {
            return f32::MAX;
        };
        monster.cache_mut().target_distance(
            ctx.now,
            self.config.target_distance_window,
            &self.metrics,
            || physics.distance(entity, target).unwrap_or(f32::MAX),
        )
    }

    /// Face or close on the current target
    ///
    /// Ranged attackers already in range and immobile creatures turn in
    /// place; everyone else runs to the target until within attack range.
    pub(super) fn start_turn(&mut self, ctx: &mut TickContext, entity: EcsEntity) {
        let now = ctx.now;
        let (target, busy) = match ctx.world.get::<&Monster>(entity) {
            Ok(monster) => (monster.attack_target(), monster.is_busy(now)),
            Err(_) => return,
        };
        let Some(target) = target else {
            return;
        };
        let move_ready = ctx
            .world
            .get::<&Navigator>(entity)
            .map(|nav| now >= nav.next_move_time)
            .unwrap_or(false);
        if busy || !move_ready {
            return;
        }

        let (current, max_range) = ctx
            .world
            .get::<&CombatState>(entity)
            .map(|combat| (combat.current, combat.max_range))
            .unwrap_or((None, 0.0));
        let (immobile, creature_type) = match ctx.world.get::<&Creature>(entity) {
            Ok(creature) => (creature.is_immobile(), creature.creature_type),
            Err(_) => return,
        };

        let ranged = matches!(current, Some(AttackType::Missile | AttackType::Magic));
        let turn_only = immobile || (ranged && in_range(self.distance_to_target(ctx, entity), max_range));
        let (motion, started) = if turn_only {
            (MotionState::Turning, ctx.physics.turn_to_object(entity, target))
        } else {
            let params = MoveParams {
                speed: self.content.run_speed(creature_type),
                distance_to_object: max_range,
            };
            (MotionState::Moving, ctx.physics.move_to_object(entity, target, params))
        };
        if !started {
            tracing::debug!("Monster {:?} could not start {:?} toward {:?}", entity, motion, target);
            return;
        }

        if let Ok(mut nav) = ctx.world.get::<&mut Navigator>(entity) {
            nav.begin(motion, now, self.config.stuck_window);
            nav.next_move_time = now + self.config.move_cooldown;
        }
    }

    /// A motion finished. Returning monsters that arrive go to sleep.
    pub(super) fn on_move_complete(&mut self, ctx: &mut TickContext, entity: EcsEntity) {
        if let Ok(mut nav) = ctx.world.get::<&mut Navigator>(entity) {
            nav.stop();
        }
        let returning = ctx
            .world
            .get::<&Monster>(entity)
            .map(|monster| monster.state() == MonsterState::Return)
            .unwrap_or(false);
        if returning {
            tracing::debug!("Monster {:?} arrived home", entity);
            if let Err(e) = self.sleep(ctx, entity) {
                tracing::warn!("Monster {:?} failed to sleep: {}", entity, e);
            }
        }
    }

    /// Recover from a move that stopped making progress
    ///
    /// Returns true when a recovery ran this tick.
    pub(super) fn check_stuck(&mut self, ctx: &mut TickContext, entity: EcsEntity) -> bool {
        let now = ctx.now;
        let due = ctx
            .world
            .get::<&Navigator>(entity)
            .map(|nav| nav.is_moving() && now >= nav.next_stuck_check)
            .unwrap_or(false);
        if !due {
            return false;
        }
        let immobile = ctx
            .world
            .get::<&Creature>(entity)
            .map(|creature| creature.is_immobile())
            .unwrap_or(true);
        let (state, target) = match ctx.world.get::<&Monster>(entity) {
            Ok(monster) => (monster.state(), monster.attack_target()),
            Err(_) => return false,
        };
        let applies = match state {
            MonsterState::Awake => target.is_some(),
            MonsterState::Return => true,
            MonsterState::Idle => false,
        };
        if immobile || !applies {
            return false;
        }

        if let Ok(mut nav) = ctx.world.get::<&mut Navigator>(entity) {
            nav.next_stuck_check = now + self.config.stuck_window;
        }
        let failed = ctx.physics.failed_progress_count(entity);
        if failed < self.config.stuck_threshold {
            return false;
        }

        tracing::info!("Monster {:?} is stuck after {} failed steps", entity, failed);
        ctx.physics.cancel_move(entity);
        if let Ok(mut nav) = ctx.world.get::<&mut Navigator>(entity) {
            nav.stop();
        }
        self.metrics.stuck_recovery();

        match state {
            MonsterState::Return => {
                let home = ctx.world.get::<&Navigator>(entity).ok().and_then(|nav| nav.home);
                if let Some(home) = home {
                    ctx.physics.teleport(entity, home);
                }
                if let Err(e) = self.sleep(ctx, entity) {
                    tracing::warn!("Monster {:?} failed to sleep: {}", entity, e);
                }
            }
            _ => {
                if let Err(e) = self.find_next_target(ctx, entity) {
                    tracing::warn!("Monster {:?} target selection failed: {}", entity, e);
                }
            }
        }
        true
    }

    /// Send a monster that strayed past its leash home. Returns true if it
    /// was leashed this tick.
    pub(super) fn check_leash(&mut self, ctx: &mut TickContext, entity: EcsEntity) -> bool {
        let returning = ctx
            .world
            .get::<&Monster>(entity)
            .map(|monster| monster.state() == MonsterState::Return)
            .unwrap_or(true);
        if returning {
            return false;
        }
        let Ok(position) = ctx.world.get::<&Position>(entity).map(|p| *p) else {
            return false;
        };
        let leashed = ctx
            .world
            .get::<&Navigator>(entity)
            .map(|nav| nav.is_outside_leash(&position))
            .unwrap_or(false);
        if !leashed {
            return false;
        }

        tracing::info!("Monster {:?} strayed past its leash at {:?}", entity, position);
        if let Err(e) = self.move_to_home(ctx, entity) {
            tracing::warn!("Monster {:?} failed to head home: {}", entity, e);
        }
        true
    }

    /// Abandon the fight and walk home, or sleep if already there
    #[tracing::instrument(skip(self, ctx), fields(monster = ?entity))]
    pub fn move_to_home(&mut self, ctx: &mut TickContext, entity: EcsEntity) -> AiResult<()> {
        let now = ctx.now;
        monster_mut(ctx.world, entity)?.begin_return();
        if let Ok(mut combat) = ctx.world.get::<&mut CombatState>(entity) {
            combat.reset();
        }

        let home = ctx.world.get::<&Navigator>(entity).ok().and_then(|nav| nav.home);
        let position = ctx
            .physics
            .position(entity)
            .or_else(|| ctx.world.get::<&Position>(entity).ok().map(|p| *p));
        let (Some(home), Some(position)) = (home, position) else {
            return self.sleep(ctx, entity);
        };
        let arrival = self.config.home_arrival;
        if position.distance(&home) <= arrival {
            return self.sleep(ctx, entity);
        }

        let creature_type = ctx
            .world
            .get::<&Creature>(entity)
            .map(|creature| creature.creature_type)
            .ok();
        let speed = creature_type
            .map(|creature_type| self.content.run_speed(creature_type))
            .unwrap_or(0.0);
        let params = MoveParams {
            speed,
            distance_to_object: arrival,
        };
        if !ctx.physics.move_to_position(entity, home, params) {
            return self.sleep(ctx, entity);
        }
        if let Ok(mut nav) = ctx.world.get::<&mut Navigator>(entity) {
            nav.begin(MotionState::Moving, now, self.config.stuck_window);
        }

        tracing::debug!("Monster {:?} heading home to {:?}", entity, home);
        self.event_bus.publish(GameEvent::MonsterReturning { entity, home });
        Ok(())
    }

    /// Put a monster back to sleep, cancelling anything in flight
    #[tracing::instrument(skip(self, ctx), fields(monster = ?entity))]
    pub fn sleep(&mut self, ctx: &mut TickContext, entity: EcsEntity) -> AiResult<()> {
        monster_mut(ctx.world, entity)?.sleep();
        ctx.physics.cancel_move(entity);
        if let Ok(mut nav) = ctx.world.get::<&mut Navigator>(entity) {
            nav.stop();
        }
        if let Ok(mut combat) = ctx.world.get::<&mut CombatState>(entity) {
            combat.reset();
        }
        if let Ok(mut enrage) = ctx.world.get::<&mut Enrage>(entity) {
            enrage.calm();
        }
        tracing::debug!("Monster {:?} went to sleep", entity);
        self.event_bus.publish(GameEvent::MonsterSlept { entity });
        Ok(())
    }

    /// A returning monster joins a fight its allies are still in
    pub(super) fn check_distress(&mut self, ctx: &mut TickContext, entity: EcsEntity) -> bool {
        let Ok(position) = ctx.world.get::<&Position>(entity).map(|p| *p) else {
            return false;
        };
        let inside_leash = ctx
            .world
            .get::<&Navigator>(entity)
            .map(|nav| !nav.is_outside_leash(&position))
            .unwrap_or(false);
        if !inside_leash {
            return false;
        }
        let Ok(actor) = ctx.world.get::<&Creature>(entity).map(|c| c.clone()) else {
            return false;
        };

        let mut joined = None;
        for ally in ctx.physics.visible_creatures(entity) {
            if ally == entity || !is_alive(ctx, ally) {
                continue;
            }
            let kin = ctx
                .world
                .get::<&Creature>(ally)
                .map(|other| {
                    !other.is_player() && (actor.same_faction(&other) || other.creature_type == actor.creature_type)
                })
                .unwrap_or(false);
            if !kin {
                continue;
            }
            let fighting = ctx
                .world
                .get::<&Monster>(ally)
                .ok()
                .filter(|monster| monster.state() == MonsterState::Awake)
                .and_then(|monster| monster.attack_target());
            if let Some(target) = fighting.filter(|target| *target != entity && is_valid_target(ctx, *target)) {
                joined = Some((ally, target));
                break;
            }
        }
        let Some((ally, target)) = joined else {
            return false;
        };

        ctx.physics.cancel_move(entity);
        if let Ok(mut nav) = ctx.world.get::<&mut Navigator>(entity) {
            nav.stop();
        }
        let next_find_target = ctx.now + self.config.retarget_interval;
        if let Ok(mut monster) = ctx.world.get::<&mut Monster>(entity) {
            monster.engage(target);
            monster.next_find_target = next_find_target;
        }
        tracing::debug!("Monster {:?} answered {:?} in distress against {:?}", entity, ally, target);
        self.event_bus.publish(GameEvent::EngagedNewEnemy { entity, target });
        true
    }
}
