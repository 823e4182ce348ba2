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

//! Combat scheduler for monster attacks
//!
//! An attack is lined up by [`MonsterAiSystem::resolve_attack_type`], fired
//! by [`MonsterAiSystem::attack`] once ready, and lands later through the
//! group [`Scheduler`](crate::ecs::scheduler::Scheduler). Damage from any
//! source goes through [`MonsterAiSystem::apply_damage`].

use super::monster_ai::{MonsterAiSystem, in_range, is_alive, is_valid_target, monster_mut};
use crate::ecs::components::{
    AttackProfile, AttackType, CombatState, Creature, DamageHistory, DamageType, Enrage, Monster, MonsterState,
    Navigator, Tolerance, Vitals, WeaponProfile, mark_dirty,
};
use crate::ecs::content::SpellId;
use crate::ecs::events::GameEvent;
use crate::ecs::scheduler::{PendingHit, ScheduledAction};
use crate::ecs::{EcsEntity, TickContext};
use crate::error::{AiError, AiResult};
use rand::Rng;
use rand::seq::IndexedRandom;

/// Used when a monster has to fight without a melee weapon
const UNARMED: WeaponProfile = WeaponProfile {
    range: 1.5,
    interval: 2.0,
    damage_min: 1.0,
    damage_max: 3.0,
    damage_type: DamageType::Bludgeoning,
};

/// Arrow and bolt flight speed in world units per second
const MISSILE_SPEED: f32 = 25.0;

/// Outcome of a single attack-type roll
#[derive(Debug, Clone, Copy)]
struct AttackRoll {
    attack_type: AttackType,
    range: f32,
    spell: Option<SpellId>,
    needs_sight: bool,
}

impl MonsterAiSystem {
    /// Line up the next attack, keeping one that is already lined up
    ///
    /// Projectile spells without line of sight are rerolled a bounded number
    /// of times, after which melee is forced and delayed by a short recovery.
    pub(super) fn resolve_attack_type(&mut self, ctx: &TickContext, entity: EcsEntity) -> Option<AttackType> {
        let now = ctx.now;
        let current = ctx.world.get::<&CombatState>(entity).ok()?.current;
        if current.is_some() {
            return current;
        }
        let profile = ctx.world.get::<&AttackProfile>(entity).ok()?.clone();
        let target = ctx.world.get::<&Monster>(entity).ok()?.attack_target();

        let mut chosen = None;
        for _ in 0..self.config.max_attack_rerolls {
            let roll = self.roll_attack_type(&profile);
            let blocked = roll.needs_sight && !target.is_some_and(|target| ctx.physics.line_of_sight(entity, target));
            if !blocked {
                chosen = Some(roll);
                break;
            }
        }

        let mut combat = ctx.world.get::<&mut CombatState>(entity).ok()?;
        let roll = match chosen {
            Some(roll) => roll,
            None => {
                let recovery = self.recovery_delay();
                let next = combat.next_attack_time(AttackType::Melee).max(now) + recovery;
                combat.set_next_attack_time(AttackType::Melee, next);
                tracing::debug!("Monster {:?} has no line of sight, forcing melee at {:.2}", entity, next);
                AttackRoll {
                    attack_type: AttackType::Melee,
                    range: profile.melee.unwrap_or(UNARMED).range,
                    spell: None,
                    needs_sight: false,
                }
            }
        };

        combat.current = Some(roll.attack_type);
        combat.max_range = roll.range;
        combat.pending_spell = roll.spell;
        Some(roll.attack_type)
    }

    fn roll_attack_type(&mut self, profile: &AttackProfile) -> AttackRoll {
        for &spell in &profile.spells {
            let Some(info) = self.content.spell(spell) else {
                tracing::debug!("No content for {}, skipping", spell);
                continue;
            };
            if self.rng.random::<f32>() < info.cast_chance {
                return AttackRoll {
                    attack_type: AttackType::Magic,
                    range: info.range,
                    spell: Some(spell),
                    needs_sight: info.projectile,
                };
            }
        }
        match profile.missile {
            Some(missile) => AttackRoll {
                attack_type: AttackType::Missile,
                range: missile.range,
                spell: None,
                needs_sight: false,
            },
            None => AttackRoll {
                attack_type: AttackType::Melee,
                range: profile.melee.unwrap_or(UNARMED).range,
                spell: None,
                needs_sight: false,
            },
        }
    }

    fn recovery_delay(&mut self) -> f64 {
        let (min, max) = (self.config.recovery_delay_min, self.config.recovery_delay_max);
        if max > min {
            self.rng.random_range(min..=max)
        } else {
            min
        }
    }

    fn roll_damage(&mut self, min: f32, max: f32) -> f32 {
        if max > min {
            self.rng.random_range(min..=max)
        } else {
            min
        }
    }

    /// Cooldowns elapsed, target in range, and not mid animation
    pub(super) fn is_attack_ready(&self, ctx: &TickContext, entity: EcsEntity) -> bool {
        let now = ctx.now;
        let Ok((current, max_range, next, prev_magic)) = ctx.world.get::<&CombatState>(entity).map(|combat| {
            let next = combat.current.map(|kind| combat.next_attack_time(kind));
            (combat.current, combat.max_range, next, combat.prev_attack_time(AttackType::Magic))
        }) else {
            return false;
        };
        let (Some(current), Some(next)) = (current, next) else {
            return false;
        };
        if now < next {
            return false;
        }
        if current == AttackType::Magic {
            let cast_delay = ctx
                .world
                .get::<&AttackProfile>(entity)
                .map(|profile| profile.cast_delay)
                .unwrap_or(0.0);
            if now < prev_magic + cast_delay {
                return false;
            }
        }
        let busy = ctx
            .world
            .get::<&Monster>(entity)
            .map(|monster| monster.is_busy(now))
            .unwrap_or(true);
        !busy && in_range(self.distance_to_target(ctx, entity), max_range)
    }

    /// Fire the lined-up attack at the current target
    ///
    /// The hit is scheduled to land after the animation (plus travel time for
    /// projectiles). The lined-up attack is cleared whether or not anything
    /// was fired.
    #[tracing::instrument(skip(self, ctx), fields(monster = ?entity))]
    pub(super) fn attack(&mut self, ctx: &mut TickContext, entity: EcsEntity) -> AiResult<()> {
        let result = self.dispatch_attack(ctx, entity);
        if let Ok(mut combat) = ctx.world.get::<&mut CombatState>(entity) {
            combat.reset();
        }
        result
    }

    fn dispatch_attack(&mut self, ctx: &mut TickContext, entity: EcsEntity) -> AiResult<()> {
        let now = ctx.now;
        let Some(target) = monster_mut(ctx.world, entity)?.attack_target() else {
            return Ok(());
        };
        let (current, pending_spell) = match ctx.world.get::<&CombatState>(entity) {
            Ok(combat) => (combat.current, combat.pending_spell),
            Err(_) => return Ok(()),
        };
        let Some(attack_type) = current else {
            return Ok(());
        };
        let profile = ctx
            .world
            .get::<&AttackProfile>(entity)
            .map(|profile| profile.clone())
            .map_err(|_| AiError::EntityNotFound(entity))?;
        let creature_type = ctx
            .world
            .get::<&Creature>(entity)
            .map(|creature| creature.creature_type)
            .map_err(|_| AiError::EntityNotFound(entity))?;
        let distance = self.distance_to_target(ctx, entity);

        let mut height = None;
        let (amount, damage_type, interval, delay) = match attack_type {
            AttackType::Melee => {
                let weapon = profile.melee.unwrap_or(UNARMED);
                height = self.content.maneuvers(creature_type).choose(&mut self.rng).copied();
                let amount = self.roll_damage(weapon.damage_min, weapon.damage_max);
                (amount, weapon.damage_type, weapon.interval, profile.animation_time)
            }
            AttackType::Missile => {
                let Some(weapon) = profile.missile else {
                    return Ok(());
                };
                let travel = f64::from(distance / MISSILE_SPEED);
                let amount = self.roll_damage(weapon.damage_min, weapon.damage_max);
                (amount, weapon.damage_type, weapon.interval, profile.animation_time + travel)
            }
            AttackType::Magic => {
                let Some(spell) = pending_spell.and_then(|id| self.content.spell(id)) else {
                    tracing::debug!("Monster {:?} lost its spell before casting", entity);
                    return Ok(());
                };
                let travel = if spell.projectile && spell.projectile_speed > 0.0 {
                    f64::from(distance / spell.projectile_speed)
                } else {
                    0.0
                };
                let amount = self.roll_damage(spell.damage_min, spell.damage_max);
                (amount, spell.damage_type, profile.cast_delay, profile.animation_time + travel)
            }
        };

        ctx.scheduler.schedule(
            now + delay,
            ScheduledAction::LandAttack(PendingHit {
                attacker: entity,
                target,
                attack_type,
                damage_type,
                amount,
            }),
        );
        if let Ok(mut combat) = ctx.world.get::<&mut CombatState>(entity) {
            combat.record_attack(attack_type, now, interval);
        }
        monster_mut(ctx.world, entity)?.busy_until = now + profile.animation_time;

        tracing::debug!(
            "Monster {:?} launched {} attack at {:?} for {:.1}",
            entity,
            attack_type.as_str(),
            target,
            amount
        );
        self.metrics.attack_launched();
        self.event_bus.publish(GameEvent::AttackLaunched {
            attacker: entity,
            target,
            attack_type,
            height,
        });
        Ok(())
    }

    /// Resolve a hit that finished its flight
    pub fn land_attack(&mut self, ctx: &mut TickContext, hit: PendingHit) {
        if !is_alive(ctx, hit.target) || !ctx.world.contains(hit.attacker) {
            tracing::debug!("Dropping hit from {:?}, {:?} is gone", hit.attacker, hit.target);
            self.metrics.attack_dropped();
            self.event_bus.publish(GameEvent::AttackDropped {
                attacker: hit.attacker,
                target: hit.target,
            });
            return;
        }
        if let Err(e) = self.apply_damage(ctx, hit.target, Some(hit.attacker), hit.damage_type, hit.amount) {
            tracing::warn!("Failed to apply hit from {:?}: {}", hit.attacker, e);
        }
    }

    /// Apply damage to any creature and run the consequences
    ///
    /// Returns the damage actually taken. `source` is `None` for
    /// environmental damage.
    #[tracing::instrument(skip(self, ctx), fields(target = ?target))]
    pub fn apply_damage(
        &mut self,
        ctx: &mut TickContext,
        target: EcsEntity,
        source: Option<EcsEntity>,
        damage_type: DamageType,
        amount: f32,
    ) -> AiResult<f32> {
        let now = ctx.now;
        let (taken, alive, fraction) = {
            let mut vitals = ctx
                .world
                .get::<&mut Vitals>(target)
                .map_err(|_| AiError::EntityNotFound(target))?;
            if !vitals.is_alive() {
                return Ok(0.0);
            }
            let taken = vitals.take_damage(amount);
            (taken, vitals.is_alive(), vitals.health_fraction())
        };
        if let Ok(mut history) = ctx.world.get::<&mut DamageHistory>(target) {
            history.add(source, damage_type, taken, now);
        }
        mark_dirty(ctx.world, target, now);
        self.event_bus.publish(GameEvent::EntityAttacked {
            attacker: source,
            defender: target,
            damage_type,
            damage: taken,
        });

        if !alive {
            self.on_death(ctx, target, source);
            return Ok(taken);
        }

        if let Some(attacker) = source.filter(|attacker| *attacker != target) {
            self.provoke(ctx, target, attacker);
        }

        let trigger = ctx
            .world
            .get::<&Enrage>(target)
            .map(|enrage| enrage.should_trigger(fraction))
            .unwrap_or(false);
        if trigger {
            self.enrage(ctx, target)?;
        }
        Ok(taken)
    }

    fn on_death(&mut self, ctx: &mut TickContext, entity: EcsEntity, killer: Option<EcsEntity>) {
        tracing::info!("{:?} was killed by {:?}", entity, killer);
        self.event_bus.publish(GameEvent::EntityDied { entity, killer });

        ctx.physics.cancel_move(entity);
        if let Ok(mut nav) = ctx.world.get::<&mut Navigator>(entity) {
            nav.stop();
        }
        if let Ok(mut enrage) = ctx.world.get::<&mut Enrage>(entity) {
            enrage.cancel_loops();
        }
        if let Ok(mut monster) = ctx.world.get::<&mut Monster>(entity) {
            monster.disengage();
        }
        let cancelled = ctx.scheduler.cancel_involving(entity);
        if cancelled > 0 {
            tracing::debug!("Cancelled {} pending actions for {:?}", cancelled, entity);
        }

        let is_player = ctx
            .world
            .get::<&Creature>(entity)
            .map(|creature| creature.is_player())
            .unwrap_or(false);
        if !is_player {
            ctx.scheduler
                .schedule(ctx.now + self.config.corpse_delay, ScheduledAction::RemoveEntity(entity));
        }
    }

    /// A monster that was hit remembers the attacker and, if asleep, fights
    fn provoke(&mut self, ctx: &mut TickContext, victim: EcsEntity, attacker: EcsEntity) {
        let attacker_valid = is_valid_target(ctx, attacker);
        let next_find_target = ctx.now + self.config.retarget_interval;
        let woke = {
            let Ok(mut monster) = ctx.world.get::<&mut Monster>(victim) else {
                return;
            };
            monster.add_retaliate_target(attacker);
            let wakes = monster.state() == MonsterState::Idle
                && !monster.tolerance.contains(Tolerance::NoAttack)
                && attacker_valid;
            if wakes {
                monster.engage(attacker);
                monster.next_find_target = next_find_target;
            }
            wakes
        };
        if !woke {
            return;
        }

        tracing::debug!("Monster {:?} was provoked by {:?}", victim, attacker);
        self.metrics.target_acquired();
        self.event_bus.publish(GameEvent::MonsterAwoke { entity: victim });
        self.event_bus.publish(GameEvent::EngagedNewEnemy {
            entity: victim,
            target: attacker,
        });
        self.alert_friendly(ctx, victim, attacker);
    }
}
