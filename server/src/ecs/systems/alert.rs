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

//! Alert propagation between allied monsters

use super::monster_ai::{MonsterAiSystem, is_alive};
use crate::ecs::components::{Creature, Monster, Tolerance};
use crate::ecs::events::GameEvent;
use crate::ecs::{EcsEntity, TickContext};

impl MonsterAiSystem {
    /// Rally sleeping allies of `actor` against `target`
    ///
    /// Returns the number of allies that answered. A target that was
    /// successfully alerted on is not alerted on again until the suppression
    /// window passes.
    #[tracing::instrument(skip(self, ctx), fields(monster = ?actor))]
    pub fn alert_friendly(&self, ctx: &TickContext, actor: EcsEntity, target: EcsEntity) -> usize {
        let now = ctx.now;
        let suppression = self.config.alert_suppression;
        let recently_alerted = match ctx.world.get::<&Monster>(actor) {
            Ok(monster) => monster.alerts().recently_alerted(target, now, suppression),
            Err(_) => return 0,
        };
        if recently_alerted {
            tracing::debug!("Monster {:?} already alerted allies to {:?}", actor, target);
            return 0;
        }

        let (Ok(actor_creature), Ok(target_creature)) = (
            ctx.world.get::<&Creature>(actor).map(|c| c.clone()),
            ctx.world.get::<&Creature>(target).map(|c| c.clone()),
        ) else {
            return 0;
        };
        let target_is_player = target_creature.is_player() || target_creature.is_pet();
        let foe_of_actor = actor_creature.potential_foe(&target_creature);

        let mut allies = Vec::new();
        for ally in ctx.physics.visible_creatures(actor) {
            if ally == actor || ally == target || !is_alive(ctx, ally) {
                continue;
            }
            let Ok(ally_creature) = ctx.world.get::<&Creature>(ally).map(|c| c.clone()) else {
                continue;
            };
            let kin = ally_creature.creature_type == actor_creature.creature_type
                || ally_creature.friend_type == Some(actor_creature.creature_type);
            if !kin {
                continue;
            }

            let (awake, tolerance, aural_range) = match ctx.world.get::<&Monster>(ally) {
                Ok(monster) => (monster.is_awake(), monster.tolerance, monster.aural_range),
                Err(_) => continue,
            };
            if awake || tolerance.contains(Tolerance::NoAttack) {
                continue;
            }
            if tolerance.contains(Tolerance::Monster) && target_is_player {
                continue;
            }

            let retaliate = if foe_of_actor {
                // Only allies that hunt the same kind answer
                if !ally_creature.potential_foe(&target_creature) {
                    continue;
                }
                true
            } else {
                actor_creature.same_faction(&ally_creature) && ally_creature.same_faction(&target_creature)
            };

            let hearing = self.cached_distance(ctx, ally, target, true);
            if hearing > aural_range * aural_range {
                continue;
            }

            if let Ok(mut monster) = ctx.world.get::<&mut Monster>(ally) {
                if retaliate {
                    monster.add_retaliate_target(target);
                }
                monster.engage(target);
                // Hold the rallied target until the next retarget window
                monster.next_find_target = now + self.config.retarget_interval;
            }
            tracing::debug!("Monster {:?} answered {:?} against {:?}", ally, actor, target);
            self.event_bus.publish(GameEvent::MonsterAwoke { entity: ally });
            self.event_bus.publish(GameEvent::EngagedNewEnemy { entity: ally, target });
            allies.push(ally);
        }

        if allies.is_empty() {
            return 0;
        }
        if let Ok(mut monster) = ctx.world.get::<&mut Monster>(actor) {
            monster.alerts_mut().record(target, now, suppression);
        }
        self.metrics.allies_alerted(allies.len());
        let count = allies.len();
        self.event_bus.publish(GameEvent::AlliesAlerted {
            entity: actor,
            target,
            allies,
        });
        count
    }
}
