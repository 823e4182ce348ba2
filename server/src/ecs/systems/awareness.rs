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

//! Awareness: who can this monster see, and whom does it fight
//!
//! Candidate enumeration runs in two passes. A cheap planar pre-filter on
//! world positions discards anything clearly out of reach, then the exact
//! physics distance decides inclusion: chase range for the current target,
//! visual range for everyone else.

use super::monster_ai::{MonsterAiSystem, is_alive, is_valid_target, monster_mut};
use crate::ecs::components::{
    Creature, DamageHistory, Monster, Position, TargetingTactic, Tolerance, default_tactics,
};
use crate::ecs::events::GameEvent;
use crate::ecs::metrics::AiMetrics;
use crate::ecs::{EcsEntity, TickContext};
use crate::error::AiResult;
use rand::Rng;
use rand::seq::IndexedRandom;

/// A candidate and its distance from the monster evaluating it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetDistance {
    pub target: EcsEntity,
    pub distance: f32,
}

impl TargetDistance {
    pub fn new(target: EcsEntity, distance: f32) -> Self {
        Self { target, distance }
    }
}

/// Sort ascending by distance. Equal distances keep their order.
pub fn sort_by_distance(candidates: &mut [TargetDistance]) {
    candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
}

/// Pick a candidate with closer ones more likely
///
/// Each candidate is weighted `1 - d / S` where `S` is the sum of all
/// distances. The roll is drawn from `[0, N - 1)`, the sum of the weights.
/// A single candidate is returned without touching the generator.
pub fn select_weighted_distance<R: Rng + ?Sized>(
    candidates: &[TargetDistance],
    rng: &mut R,
    metrics: &AiMetrics,
) -> Option<EcsEntity> {
    match candidates {
        [] => return None,
        [only] => return Some(only.target),
        _ => {}
    }

    let total: f32 = candidates.iter().map(|candidate| candidate.distance).sum();
    let upper = (candidates.len() - 1) as f32;
    let roll = rng.random_range(0.0..upper);

    let mut accumulated = 0.0;
    for candidate in candidates {
        // All candidates standing on the monster weigh the same
        let weight = if total > 0.0 {
            1.0 - candidate.distance / total
        } else {
            1.0
        };
        accumulated += weight;
        if roll < accumulated {
            return Some(candidate.target);
        }
    }

    tracing::warn!(
        candidates = candidates.len(),
        roll,
        total,
        "Weighted target selection exhausted, falling back to the first candidate"
    );
    metrics.selection_anomaly();
    Some(candidates[0].target)
}

impl MonsterAiSystem {
    /// Attackable candidates this monster perceives, nearest first
    ///
    /// The candidate list is reused for the visible-target window; distances
    /// come from the distance map cache.
    pub fn visible_targets(&mut self, ctx: &TickContext, entity: EcsEntity) -> Vec<TargetDistance> {
        let now = ctx.now;
        let window = self.config.visible_targets_window;
        let cached = match ctx.world.get::<&Monster>(entity) {
            Ok(monster) => monster.cache().visible_targets(now, window, &self.metrics),
            Err(_) => return Vec::new(),
        };

        let candidates = match cached {
            Some(candidates) => candidates,
            None => {
                let candidates = self.enumerate_candidates(ctx, entity);
                if let Ok(mut monster) = ctx.world.get::<&mut Monster>(entity) {
                    monster.cache_mut().store_visible_targets(now, candidates.clone());
                }
                candidates
            }
        };

        let mut distances = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if !is_valid_target(ctx, candidate) {
                continue;
            }
            let squared = self.cached_distance(ctx, entity, candidate, true);
            if squared < f32::MAX {
                distances.push(TargetDistance::new(candidate, squared.sqrt()));
            }
        }
        sort_by_distance(&mut distances);
        distances
    }

    /// Distance through the monster's distance map cache, `f32::MAX` when
    /// either side has no physics body
    pub(super) fn cached_distance(
        &self,
        ctx: &TickContext,
        entity: EcsEntity,
        target: EcsEntity,
        squared: bool,
    ) -> f32 {
        let physics = &*ctx.physics;
        let Ok(mut monster) = ctx.world.get::<&mut Monster>(entity) else {
            return f32::MAX;
        };
        monster.cache_mut().distance(
            target,
            squared,
            ctx.now,
            self.config.distance_map_window,
            &self.metrics,
            || {
                let distance = if squared {
                    physics.squared_distance(entity, target)
                } else {
                    physics.distance(entity, target)
                };
                distance.unwrap_or(f32::MAX)
            },
        )
    }

    fn enumerate_candidates(&self, ctx: &TickContext, entity: EcsEntity) -> Vec<EcsEntity> {
        let (Ok(actor), Ok(position)) = (
            ctx.world.get::<&Creature>(entity).map(|c| c.clone()),
            ctx.world.get::<&Position>(entity).map(|p| *p),
        ) else {
            return Vec::new();
        };
        let (visual, chase, tolerance, current, retaliation) = match ctx.world.get::<&Monster>(entity) {
            Ok(monster) => (
                monster.visual_range,
                monster.chase_range,
                monster.tolerance,
                monster.attack_target(),
                monster.retaliate_targets().clone(),
            ),
            Err(_) => return Vec::new(),
        };

        let prefilter = visual.max(chase) * self.config.prefilter_margin;
        let prefilter_sq = prefilter * prefilter;

        let mut candidates = Vec::new();
        for candidate in ctx.physics.visible_creatures(entity) {
            if candidate == entity || !is_valid_target(ctx, candidate) {
                continue;
            }
            let (Ok(other), Ok(other_position)) = (
                ctx.world.get::<&Creature>(candidate).map(|c| c.clone()),
                ctx.world.get::<&Position>(candidate).map(|p| *p),
            ) else {
                continue;
            };
            if position.squared_planar_distance(&other_position) > prefilter_sq {
                continue;
            }

            let is_current = current == Some(candidate);
            let retaliating = retaliation.contains(&candidate);
            if tolerance.contains(Tolerance::Target) && !is_current {
                continue;
            }
            if tolerance.contains(Tolerance::Monster) && (other.is_player() || other.is_pet()) {
                continue;
            }
            if actor.same_faction(&other) && !retaliating {
                continue;
            }
            let hostile = other.is_player() || other.is_pet() || actor.potential_foe(&other) || retaliating;
            if !hostile {
                continue;
            }

            let range = if is_current { chase } else { visual };
            if self.cached_distance(ctx, entity, candidate, true) > range * range {
                continue;
            }
            candidates.push(candidate);
        }
        candidates
    }

    /// Choose or re-validate the attack target
    ///
    /// Draws a tactic, builds the candidate list and applies the tactic.
    /// With no candidates the monster gives up and heads home.
    #[tracing::instrument(skip(self, ctx), fields(monster = ?entity))]
    pub fn find_next_target(&mut self, ctx: &mut TickContext, entity: EcsEntity) -> AiResult<Option<EcsEntity>> {
        let (tactics, previous) = {
            let monster = monster_mut(ctx.world, entity)?;
            (monster.tactics, monster.attack_target())
        };
        let options: Vec<TargetingTactic> = if tactics.is_empty() {
            default_tactics().into_iter().collect()
        } else {
            tactics.into_iter().collect()
        };
        let tactic = options
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(TargetingTactic::Random);
        monster_mut(ctx.world, entity)?.current_tactic = Some(tactic);

        let candidates = self.visible_targets(ctx, entity);
        if candidates.is_empty() {
            tracing::debug!("Monster {:?} has no candidates, heading home", entity);
            self.move_to_home(ctx, entity)?;
            return Ok(None);
        }

        let chosen = self
            .apply_tactic(ctx, entity, tactic, &candidates, previous)
            .or_else(|| select_weighted_distance(&candidates, &mut self.rng, &self.metrics));
        let Some(target) = chosen else {
            return Ok(None);
        };

        let next_find_target = self.next_retarget_time(ctx.now);
        {
            let mut monster = monster_mut(ctx.world, entity)?;
            monster.engage(target);
            monster.next_find_target = next_find_target;
        }

        if previous != Some(target) {
            tracing::debug!("Monster {:?} engaged {:?} using {:?}", entity, target, tactic);
            self.metrics.target_acquired();
            self.event_bus.publish(GameEvent::EngagedNewEnemy { entity, target });
        }
        Ok(Some(target))
    }

    fn apply_tactic(
        &mut self,
        ctx: &TickContext,
        entity: EcsEntity,
        tactic: TargetingTactic,
        candidates: &[TargetDistance],
        previous: Option<EcsEntity>,
    ) -> Option<EcsEntity> {
        // Focus and grudges outlast perception; only death or departure ends them
        let present = |target: &EcsEntity| *target != entity && is_alive(ctx, *target);
        let level = |target: EcsEntity| {
            ctx.world
                .get::<&Creature>(target)
                .map(|creature| creature.level)
                .unwrap_or(0)
        };

        match tactic {
            TargetingTactic::Random => select_weighted_distance(candidates, &mut self.rng, &self.metrics),
            TargetingTactic::Focused => previous.filter(present),
            TargetingTactic::LastDamager => ctx
                .world
                .get::<&DamageHistory>(entity)
                .ok()
                .and_then(|history| history.last_damager())
                .filter(present),
            TargetingTactic::TopDamager => ctx
                .world
                .get::<&DamageHistory>(entity)
                .ok()
                .and_then(|history| history.top_damager())
                .filter(present),
            // Ties go to the nearer candidate
            TargetingTactic::Weakest => candidates
                .iter()
                .min_by_key(|c| level(c.target))
                .map(|c| c.target),
            TargetingTactic::Strongest => candidates
                .iter()
                .rev()
                .max_by_key(|c| level(c.target))
                .map(|c| c.target),
            TargetingTactic::Nearest => candidates.first().map(|c| c.target),
        }
    }

    fn next_retarget_time(&mut self, now: f64) -> f64 {
        let jitter = self.config.retarget_jitter;
        let offset = if jitter > 0.0 {
            self.rng.random_range(-jitter..=jitter)
        } else {
            0.0
        };
        now + (self.config.retarget_interval + offset).max(0.0)
    }

    /// Wake a monster and pick a target, optionally rallying its allies
    #[tracing::instrument(skip(self, ctx), fields(monster = ?entity))]
    pub fn wake_up(&mut self, ctx: &mut TickContext, entity: EcsEntity, alert_others: bool) -> AiResult<()> {
        let was_idle = {
            let mut monster = monster_mut(ctx.world, entity)?;
            let was_idle = !monster.is_awake();
            monster.wake();
            was_idle
        };
        if was_idle {
            tracing::debug!("Monster {:?} woke up", entity);
            self.event_bus.publish(GameEvent::MonsterAwoke { entity });
        }

        if let Some(target) = self.find_next_target(ctx, entity)? {
            if alert_others {
                self.alert_friendly(ctx, entity, target);
            }
        }
        Ok(())
    }
}
