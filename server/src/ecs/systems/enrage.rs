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

//! Enrage escalation
//!
//! Enrage fires once when a capable monster drops below its health threshold.
//! The grapple and hazard loops run as detached tokio tasks that never touch
//! the world; they send [`EnrageCommand`]s which the owning group applies on
//! its next tick, after checking the monster is still alive and enraged.

use super::monster_ai::{MonsterAiSystem, is_alive, is_valid_target};
use crate::config::EnrageConfig;
use crate::ecs::components::{
    Creature, Enrage, EnrageProfile, Hazard, HazardKind, Monster, Name, Position,
};
use crate::ecs::events::GameEvent;
use crate::ecs::scheduler::ScheduledAction;
use crate::ecs::{EcsEntity, Entity, TickContext};
use crate::error::{AiError, AiResult};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// What an enrage loop wants done
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrageAction {
    SeizeGrappleVictim,
    DragGrappleVictim,
    SpawnHazard(HazardKind),
}

/// Work requested by an enrage loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrageCommand {
    pub monster: EcsEntity,
    /// [`Enrage::generation`] of the loops that sent this
    pub generation: u64,
    pub action: EnrageAction,
}

impl EnrageCommand {
    pub fn new(monster: EcsEntity, generation: u64, action: EnrageAction) -> Self {
        Self {
            monster,
            generation,
            action,
        }
    }
}

/// Sleep for `seconds` unless cancelled first
async fn wait(token: &CancellationToken, seconds: f64) -> AiResult<()> {
    tokio::select! {
        _ = token.cancelled() => Err(AiError::Cancelled),
        _ = tokio::time::sleep(Duration::from_secs_f64(seconds.max(0.0))) => Ok(()),
    }
}

async fn send(
    tx: &mpsc::Sender<EnrageCommand>,
    token: &CancellationToken,
    command: EnrageCommand,
) -> AiResult<()> {
    tokio::select! {
        _ = token.cancelled() => Err(AiError::Cancelled),
        result = tx.send(command) => result.map_err(|_| AiError::EnrageChannelClosed(command.monster)),
    }
}

async fn grapple_loop(
    monster: EcsEntity,
    generation: u64,
    tx: mpsc::Sender<EnrageCommand>,
    token: CancellationToken,
    config: EnrageConfig,
) -> AiResult<()> {
    let command = |action| EnrageCommand::new(monster, generation, action);
    loop {
        wait(&token, config.grapple_interval).await?;
        send(&tx, &token, command(EnrageAction::SeizeGrappleVictim)).await?;
        wait(&token, config.drag_delay).await?;
        send(&tx, &token, command(EnrageAction::DragGrappleVictim)).await?;
    }
}

async fn hazard_loop(
    monster: EcsEntity,
    generation: u64,
    tx: mpsc::Sender<EnrageCommand>,
    token: CancellationToken,
    config: EnrageConfig,
    mut rng: StdRng,
) -> AiResult<()> {
    loop {
        let delay = if config.hazard_interval_max > config.hazard_interval_min {
            rng.random_range(config.hazard_interval_min..=config.hazard_interval_max)
        } else {
            config.hazard_interval_min
        };
        wait(&token, delay).await?;
        let kind = HazardKind::ALL
            .choose(&mut rng)
            .copied()
            .unwrap_or(HazardKind::Fire);
        let command = EnrageCommand::new(monster, generation, EnrageAction::SpawnHazard(kind));
        send(&tx, &token, command).await?;
    }
}

fn report_loop_exit(monster: EcsEntity, name: &str, result: AiResult<()>) {
    match result {
        Ok(()) => {}
        Err(AiError::Cancelled) => tracing::debug!("Enrage {} loop for {:?} stopped", name, monster),
        Err(e) => tracing::warn!("Enrage {} loop for {:?} failed: {}", name, monster, e),
    }
}

impl MonsterAiSystem {
    /// Enter the enraged state. Returns false if already enraged.
    #[tracing::instrument(skip(self, ctx), fields(monster = ?entity))]
    pub fn enrage(&mut self, ctx: &mut TickContext, entity: EcsEntity) -> AiResult<bool> {
        let (token, generation, profile) = {
            let mut enrage = ctx
                .world
                .get::<&mut Enrage>(entity)
                .map_err(|_| AiError::NotAMonster(entity))?;
            let Some(token) = enrage.arm() else {
                return Ok(false);
            };
            (token, enrage.generation(), enrage.profile.clone())
        };

        if let Ok(mut creature) = ctx.world.get::<&mut Creature>(entity) {
            if creature.reveal() {
                tracing::debug!("Monster {:?} revealed itself", entity);
            }
        }

        tracing::info!("Monster {:?} is enraged", entity);
        self.metrics.enraged();
        self.event_bus.publish(GameEvent::MonsterEnraged { entity });
        let scripts = [&profile.visual_script, &profile.fog_script, &profile.sound_script];
        for script in scripts.into_iter().flatten() {
            self.event_bus.publish(GameEvent::PlayScript {
                entity,
                script: script.clone(),
            });
        }
        if let Some(message) = &profile.warning {
            let origin = ctx
                .physics
                .position(entity)
                .or_else(|| ctx.world.get::<&Position>(entity).ok().map(|p| *p))
                .unwrap_or_default();
            self.event_bus.publish(GameEvent::SystemMessage {
                origin,
                radius: profile.broadcast_radius,
                message: message.clone(),
            });
        }

        self.spawn_enrage_loops(entity, generation, &profile, token);
        Ok(true)
    }

    /// Restart the loops of an enraged monster under a new entity handle
    pub fn rearm_enrage(&mut self, ctx: &mut TickContext, entity: EcsEntity) -> bool {
        let armed = match ctx.world.get::<&mut Enrage>(entity) {
            Ok(mut enrage) => enrage
                .rearm()
                .map(|token| (token, enrage.generation(), enrage.profile.clone())),
            Err(_) => None,
        };
        match armed {
            Some((token, generation, profile)) => {
                tracing::debug!("Re-armed enrage loops for {:?}", entity);
                self.spawn_enrage_loops(entity, generation, &profile, token);
                true
            }
            None => false,
        }
    }

    fn spawn_enrage_loops(
        &mut self,
        entity: EcsEntity,
        generation: u64,
        profile: &EnrageProfile,
        token: CancellationToken,
    ) {
        if !profile.grapple && !profile.hazards {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime, enrage loops for {:?} not started", entity);
            return;
        };

        if profile.grapple {
            let tx = self.enrage_tx.clone();
            let token = token.clone();
            let config = self.config.enrage.clone();
            handle.spawn(async move {
                report_loop_exit(entity, "grapple", grapple_loop(entity, generation, tx, token, config).await);
            });
        }
        if profile.hazards {
            let tx = self.enrage_tx.clone();
            let config = self.config.enrage.clone();
            let rng = StdRng::seed_from_u64(self.rng.random());
            handle.spawn(async move {
                report_loop_exit(entity, "hazard", hazard_loop(entity, generation, tx, token, config, rng).await);
            });
        }
    }

    /// Apply every command the enrage loops sent since the last tick
    pub fn drain_enrage_commands(&mut self, ctx: &mut TickContext) {
        while let Ok(command) = self.enrage_rx.try_recv() {
            let monster = command.monster;
            // Loops from an earlier enrage may still have a command in flight
            let active = is_alive(ctx, monster)
                && ctx
                    .world
                    .get::<&Enrage>(monster)
                    .map(|enrage| enrage.is_enraged() && enrage.generation() == command.generation)
                    .unwrap_or(false);
            if !active {
                tracing::debug!("Ignoring stale {:?}", command);
                continue;
            }
            match command.action {
                EnrageAction::SeizeGrappleVictim => self.seize_grapple_victim(ctx, monster),
                EnrageAction::DragGrappleVictim => self.drag_grapple_victim(ctx, monster),
                EnrageAction::SpawnHazard(kind) => self.spawn_hazard(ctx, monster, kind),
            }
        }
    }

    /// Attackable players within `radius` of `monster`
    fn players_near(&self, ctx: &TickContext, monster: EcsEntity, radius: f32) -> Vec<EcsEntity> {
        ctx.physics
            .visible_creatures(monster)
            .into_iter()
            .filter(|candidate| {
                ctx.world
                    .get::<&Creature>(*candidate)
                    .map(|creature| creature.is_player())
                    .unwrap_or(false)
            })
            .filter(|candidate| is_valid_target(ctx, *candidate))
            .filter(|candidate| {
                ctx.physics
                    .distance(monster, *candidate)
                    .is_some_and(|distance| distance <= radius)
            })
            .collect()
    }

    fn seize_grapple_victim(&mut self, ctx: &mut TickContext, monster: EcsEntity) {
        let (radius, last) = match ctx.world.get::<&Enrage>(monster) {
            Ok(enrage) => (enrage.profile.grapple_radius, enrage.last_grappled),
            Err(_) => return,
        };
        let candidates: Vec<EcsEntity> = self
            .players_near(ctx, monster, radius)
            .into_iter()
            .filter(|player| Some(*player) != last)
            .collect();
        let Some(&victim) = candidates.choose(&mut self.rng) else {
            tracing::debug!("Monster {:?} found nobody to grapple", monster);
            return;
        };

        if let Ok(mut enrage) = ctx.world.get::<&mut Enrage>(monster) {
            enrage.grapple_victim = Some(victim);
            enrage.last_grappled = Some(victim);
        }
        tracing::debug!("Monster {:?} seized {:?}", monster, victim);
        self.event_bus.publish(GameEvent::PlayerGrappled { monster, player: victim });
    }

    fn drag_grapple_victim(&mut self, ctx: &mut TickContext, monster: EcsEntity) {
        let victim = match ctx.world.get::<&mut Enrage>(monster) {
            Ok(mut enrage) => enrage.grapple_victim.take(),
            Err(_) => return,
        };
        let Some(victim) = victim.filter(|victim| is_valid_target(ctx, *victim)) else {
            return;
        };
        let Some(destination) = ctx.physics.position(monster) else {
            return;
        };
        if !ctx.physics.teleport(victim, destination) {
            return;
        }

        let previous = match ctx.world.get::<&mut Monster>(monster) {
            Ok(mut state) => {
                let previous = state.attack_target();
                state.engage(victim);
                previous
            }
            Err(_) => None,
        };
        tracing::debug!("Monster {:?} dragged {:?} to {:?}", monster, victim, destination);
        self.event_bus.publish(GameEvent::PlayerDragged {
            monster,
            player: victim,
            to: destination,
        });
        if previous != Some(victim) {
            self.event_bus.publish(GameEvent::EngagedNewEnemy {
                entity: monster,
                target: victim,
            });
        }
    }

    fn spawn_hazard(&mut self, ctx: &mut TickContext, monster: EcsEntity, kind: HazardKind) {
        let (radius, held) = match ctx.world.get::<&Enrage>(monster) {
            Ok(enrage) => (
                enrage.profile.hazard_radius,
                [enrage.grapple_victim, enrage.last_grappled],
            ),
            Err(_) => return,
        };
        // Spare whoever is or was just in the monster's grip while anyone else is near
        let mut players = self.players_near(ctx, monster, radius);
        if players.iter().any(|player| !held.contains(&Some(*player))) {
            players.retain(|player| !held.contains(&Some(*player)));
        }
        let Some(&player) = players.choose(&mut self.rng) else {
            return;
        };
        let Some(at) = ctx.physics.position(player) else {
            return;
        };

        let config = &self.config.enrage;
        let now = ctx.now;
        let hazard = Hazard {
            kind,
            owner: monster,
            expires_at: now + config.hazard_lifetime,
            radius: config.hazard_radius,
            pulse_damage: if kind.damage_type().is_some() {
                config.hazard_damage
            } else {
                0.0
            },
            next_pulse: now + config.hazard_pulse,
        };
        let expires_at = hazard.expires_at;
        let id = ctx
            .world
            .spawn((hazard, at, Name::new(format!("{:?} hazard", kind))));
        ctx.scheduler.schedule(expires_at, ScheduledAction::RemoveEntity(id));

        tracing::debug!("Monster {:?} dropped {:?} on {:?}", monster, kind, player);
        self.event_bus.publish(GameEvent::HazardSpawned {
            hazard: id,
            owner: monster,
            kind,
            at,
        });
    }

    /// Damage players standing in live hazards
    pub fn pulse_hazards(&mut self, ctx: &mut TickContext) {
        let now = ctx.now;
        let pulse = self.config.enrage.hazard_pulse;
        let mut pulses = Vec::new();
        for (_, hazard, position) in ctx.world.query_mut::<(Entity, &mut Hazard, &Position)>() {
            if hazard.is_expired(now) || now < hazard.next_pulse {
                continue;
            }
            hazard.next_pulse = now + pulse;
            if let Some(damage_type) = hazard.kind.damage_type() {
                pulses.push((*position, hazard.radius, damage_type, hazard.pulse_damage));
            }
        }
        if pulses.is_empty() {
            return;
        }

        for (center, radius, damage_type, damage) in pulses {
            let victims: Vec<EcsEntity> = ctx
                .world
                .query::<(Entity, &Creature, &Position)>()
                .iter()
                .filter(|(_, creature, position)| {
                    creature.is_player() && position.squared_planar_distance(&center) <= radius * radius
                })
                .map(|(entity, _, _)| entity)
                .collect();
            for victim in victims {
                if let Err(e) = self.apply_damage(ctx, victim, None, damage_type, damage) {
                    tracing::warn!("Hazard pulse on {:?} failed: {}", victim, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::*;
    use crate::ecs::spawner::MonsterTemplate;
    use crate::ecs::physics::PhysicsEngine;
    use crate::ecs::test_utils::TestGroup;

    fn enraged_template() -> MonsterTemplate {
        let mut template = MonsterTemplate::new("Olthoi Queen", CreatureType(40), 100.0);
        template.enrage = Some(
            EnrageProfile::default()
                .with_grapple()
                .with_hazards()
                .with_warning("The queen shrieks in fury!")
                .with_scripts("queen-glow", "queen-fog", "queen-shriek"),
        );
        template
    }

    /// Queue a command as the monster's current loops would send it
    fn send_command(group: &mut TestGroup, monster: EcsEntity, action: EnrageAction) {
        let generation = group
            .world
            .get::<&Enrage>(monster)
            .map(|enrage| enrage.generation())
            .unwrap_or(0);
        group
            .ai
            .enrage_tx
            .try_send(EnrageCommand::new(monster, generation, action))
            .unwrap();
    }

    #[test]
    fn test_enrage_fires_once() {
        let mut group = TestGroup::new();
        let queen = group.monster_from(&enraged_template(), Position::new(0.0, 0.0, 0.0));
        let rogue = group.player(Position::new(3.0, 0.0, 0.0));
        group.world.get::<&mut Vitals>(queen).unwrap().health_current = 25.0;

        group
            .with_ctx(|ai, ctx| ai.apply_damage(ctx, queen, Some(rogue), DamageType::Slashing, 10.0))
            .unwrap();
        assert!(group.world.get::<&Enrage>(queen).unwrap().is_enraged());
        group
            .with_ctx(|ai, ctx| ai.apply_damage(ctx, queen, Some(rogue), DamageType::Slashing, 5.0))
            .unwrap();

        let events = group.bus.drain();
        let enraged = events
            .iter()
            .filter(|event| matches!(event, GameEvent::MonsterEnraged { .. }))
            .count();
        let scripts = events
            .iter()
            .filter(|event| matches!(event, GameEvent::PlayScript { .. }))
            .count();
        let warnings = events
            .iter()
            .filter(|event| matches!(event, GameEvent::SystemMessage { .. }))
            .count();
        assert_eq!((enraged, scripts, warnings), (1, 3, 1));
        assert_eq!(group.ai.metrics().snapshot().enrages, 1);
    }

    #[test]
    fn test_enrage_above_threshold_does_nothing() {
        let mut group = TestGroup::new();
        let queen = group.monster_from(&enraged_template(), Position::new(0.0, 0.0, 0.0));
        group
            .with_ctx(|ai, ctx| ai.apply_damage(ctx, queen, None, DamageType::Fire, 50.0))
            .unwrap();
        assert!(!group.world.get::<&Enrage>(queen).unwrap().is_enraged());
    }

    #[test]
    fn test_enrage_reveals_hidden_monster() {
        let mut group = TestGroup::new();
        let mut template = enraged_template();
        template.hidden = true;
        let queen = group.monster_from(&template, Position::new(0.0, 0.0, 0.0));

        assert!(group.with_ctx(|ai, ctx| ai.enrage(ctx, queen)).unwrap());
        assert!(!group.world.get::<&Creature>(queen).unwrap().is_hidden());
        assert!(!group.with_ctx(|ai, ctx| ai.enrage(ctx, queen)).unwrap());
    }

    #[test]
    fn test_enrage_requires_capability() {
        let mut group = TestGroup::new();
        let wolf = group.monster(Position::new(0.0, 0.0, 0.0));
        let err = group.with_ctx(|ai, ctx| ai.enrage(ctx, wolf)).unwrap_err();
        assert!(matches!(err, AiError::NotAMonster(_)));
    }

    #[test]
    fn test_grapple_commands_seize_and_drag() {
        let mut group = TestGroup::new();
        let queen = group.monster_from(&enraged_template(), Position::new(0.0, 0.0, 0.0));
        let rogue = group.player(Position::new(20.0, 0.0, 0.0));
        group.with_ctx(|ai, ctx| ai.enrage(ctx, queen)).unwrap();
        group.bus.drain();

        send_command(&mut group, queen, EnrageAction::SeizeGrappleVictim);
        group.with_ctx(|ai, ctx| ai.drain_enrage_commands(ctx));
        assert_eq!(group.world.get::<&Enrage>(queen).unwrap().grapple_victim, Some(rogue));

        send_command(&mut group, queen, EnrageAction::DragGrappleVictim);
        group.with_ctx(|ai, ctx| ai.drain_enrage_commands(ctx));
        assert_eq!(group.physics.position(rogue), Some(Position::new(0.0, 0.0, 0.0)));
        assert_eq!(group.world.get::<&Monster>(queen).unwrap().attack_target(), Some(rogue));

        let events = group.bus.drain();
        assert!(events.contains(&GameEvent::PlayerGrappled { monster: queen, player: rogue }));
        assert!(events.iter().any(|event| matches!(event, GameEvent::PlayerDragged { .. })));

        // The last victim is skipped on the next seize
        send_command(&mut group, queen, EnrageAction::SeizeGrappleVictim);
        group.with_ctx(|ai, ctx| ai.drain_enrage_commands(ctx));
        assert!(group.world.get::<&Enrage>(queen).unwrap().grapple_victim.is_none());
    }

    #[test]
    fn test_stale_commands_are_ignored() {
        let mut group = TestGroup::new();
        let queen = group.monster_from(&enraged_template(), Position::new(0.0, 0.0, 0.0));
        group.player(Position::new(5.0, 0.0, 0.0));

        send_command(&mut group, queen, EnrageAction::SeizeGrappleVictim);
        group.with_ctx(|ai, ctx| ai.drain_enrage_commands(ctx));
        assert!(group.world.get::<&Enrage>(queen).unwrap().grapple_victim.is_none());
        assert!(group.bus.drain().is_empty());
    }

    #[test]
    fn test_commands_from_earlier_enrage_are_ignored() {
        let mut group = TestGroup::new();
        let queen = group.monster_from(&enraged_template(), Position::new(0.0, 0.0, 0.0));
        let rogue = group.player(Position::new(5.0, 0.0, 0.0));
        group.with_ctx(|ai, ctx| ai.enrage(ctx, queen)).unwrap();
        let earlier = group.world.get::<&Enrage>(queen).unwrap().generation();

        group.world.get::<&mut Enrage>(queen).unwrap().calm();
        assert!(group.with_ctx(|ai, ctx| ai.enrage(ctx, queen)).unwrap());
        group.bus.drain();

        group
            .ai
            .enrage_tx
            .try_send(EnrageCommand::new(queen, earlier, EnrageAction::SeizeGrappleVictim))
            .unwrap();
        group.with_ctx(|ai, ctx| ai.drain_enrage_commands(ctx));
        assert!(group.world.get::<&Enrage>(queen).unwrap().grapple_victim.is_none());
        assert!(group.bus.drain().is_empty());

        send_command(&mut group, queen, EnrageAction::SeizeGrappleVictim);
        group.with_ctx(|ai, ctx| ai.drain_enrage_commands(ctx));
        assert_eq!(group.world.get::<&Enrage>(queen).unwrap().grapple_victim, Some(rogue));
    }

    #[test]
    fn test_hazards_spare_the_dragged_player() {
        let mut group = TestGroup::new();
        let queen = group.monster_from(&enraged_template(), Position::new(0.0, 0.0, 0.0));
        let rogue = group.player(Position::new(20.0, 0.0, 0.0));
        group.with_ctx(|ai, ctx| ai.enrage(ctx, queen)).unwrap();

        send_command(&mut group, queen, EnrageAction::SeizeGrappleVictim);
        send_command(&mut group, queen, EnrageAction::DragGrappleVictim);
        group.with_ctx(|ai, ctx| ai.drain_enrage_commands(ctx));
        let dragged_to = group.physics.position(rogue).unwrap();
        assert_eq!(dragged_to, Position::new(0.0, 0.0, 0.0));

        let bystander = group.player(Position::new(3.0, 0.0, 0.0));
        for _ in 0..6 {
            send_command(&mut group, queen, EnrageAction::SpawnHazard(HazardKind::Acid));
        }
        group.with_ctx(|ai, ctx| ai.drain_enrage_commands(ctx));

        let spots: Vec<Position> = group
            .world
            .query::<(&Hazard, &Position)>()
            .iter()
            .map(|(_, position)| *position)
            .collect();
        assert_eq!(spots.len(), 6);
        let bystander_at = group.physics.position(bystander).unwrap();
        assert!(spots.iter().all(|spot| *spot == bystander_at));
        assert!(!spots.contains(&dragged_to));
    }

    #[test]
    fn test_hazard_falls_back_to_grappled_player_when_alone() {
        let mut group = TestGroup::new();
        let queen = group.monster_from(&enraged_template(), Position::new(0.0, 0.0, 0.0));
        let rogue = group.player(Position::new(8.0, 0.0, 0.0));
        group.with_ctx(|ai, ctx| ai.enrage(ctx, queen)).unwrap();

        send_command(&mut group, queen, EnrageAction::SeizeGrappleVictim);
        send_command(&mut group, queen, EnrageAction::SpawnHazard(HazardKind::Frost));
        group.with_ctx(|ai, ctx| ai.drain_enrage_commands(ctx));

        let spots: Vec<Position> = group
            .world
            .query::<(&Hazard, &Position)>()
            .iter()
            .map(|(_, position)| *position)
            .collect();
        assert_eq!(spots, vec![group.physics.position(rogue).unwrap()]);
    }

    #[test]
    fn test_hazard_spawns_pulses_and_expires() {
        let mut group = TestGroup::new();
        let queen = group.monster_from(&enraged_template(), Position::new(0.0, 0.0, 0.0));
        group.world.get::<&mut Monster>(queen).unwrap().tolerance = Tolerance::NoAttack.into();
        let rogue = group.player(Position::new(10.0, 0.0, 0.0));
        group.with_ctx(|ai, ctx| ai.enrage(ctx, queen)).unwrap();

        send_command(&mut group, queen, EnrageAction::SpawnHazard(HazardKind::Fire));
        group.with_ctx(|ai, ctx| ai.drain_enrage_commands(ctx));

        let hazards: Vec<(EcsEntity, Position)> = group
            .world
            .query::<(Entity, &Hazard, &Position)>()
            .iter()
            .map(|(entity, _, position)| (entity, *position))
            .collect();
        assert_eq!(hazards.len(), 1);
        assert_eq!(hazards[0].1, Position::new(10.0, 0.0, 0.0));

        for _ in 0..3 {
            group.tick(1.0);
        }
        let health = group.world.get::<&Vitals>(rogue).unwrap().health_current;
        assert!(health < 100.0, "player health {health}");
        assert!(group.world.get::<&DamageHistory>(rogue).unwrap().last_damager().is_none());

        for _ in 0..20 {
            group.tick(1.0);
        }
        assert!(!group.world.contains(hazards[0].0));
        assert!(group
            .bus
            .drain()
            .contains(&GameEvent::HazardExpired { hazard: hazards[0].0 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_grapple_loop_runs_once_and_stops_on_calm() {
        let mut group = TestGroup::new();
        let queen = group.monster_from(&enraged_template(), Position::new(0.0, 0.0, 0.0));
        let rogue = group.player(Position::new(5.0, 0.0, 0.0));

        assert!(group.with_ctx(|ai, ctx| ai.enrage(ctx, queen)).unwrap());
        assert!(!group.with_ctx(|ai, ctx| ai.enrage(ctx, queen)).unwrap());
        assert!(group.world.get::<&Enrage>(queen).unwrap().has_running_loops());

        tokio::time::sleep(Duration::from_secs_f64(30.5)).await;
        let mut seizes = 0;
        while let Ok(command) = group.ai.enrage_rx.try_recv() {
            if command.action == EnrageAction::SeizeGrappleVictim {
                seizes += 1;
            }
        }
        // One loop per enrage, however often it is triggered
        assert_eq!(seizes, 1);

        group.with_ctx(|ai, ctx| ai.sleep(ctx, queen)).unwrap();
        assert!(!group.world.get::<&Enrage>(queen).unwrap().has_running_loops());
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(group.ai.enrage_rx.try_recv().is_err());
        assert!(group.world.contains(rogue));
    }
}
