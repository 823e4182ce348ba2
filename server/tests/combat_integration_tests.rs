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

//! Combat scheduler and enrage integration tests

mod common;

use bestiary_server::ecs::EcsEntity;
use bestiary_server::ecs::components::*;
use bestiary_server::ecs::events::GameEvent;
use bestiary_server::ecs::spawner::MonsterTemplate;
use common::{Harness, at};
use std::time::Duration;

fn ogre(profile: EnrageProfile) -> MonsterTemplate {
    let mut template = MonsterTemplate::new("Ogre", CreatureType(12), 100.0);
    template.tolerance = Tolerance::Provoke.into();
    template.enrage = Some(profile);
    template
}

fn count(events: &[GameEvent], matches: impl Fn(&GameEvent) -> bool) -> usize {
    events.iter().filter(|event| matches(event)).count()
}

fn hit(harness: &mut Harness, target: EcsEntity, source: Option<EcsEntity>, amount: f32) -> f32 {
    harness
        .with_ctx(|ai, ctx| ai.apply_damage(ctx, target, source, DamageType::Slashing, amount))
        .unwrap()
}

#[test]
fn test_enrage_fires_once_below_threshold() {
    let mut harness = Harness::new();
    let profile = EnrageProfile::default().with_warning("The ogre bellows!");
    let ogre = harness.spawn(&ogre(profile), at(0.0, 0.0));
    let rogue = harness.player(at(3.0, 0.0));
    harness.world.get::<&mut Vitals>(ogre).unwrap().health_current = 25.0;

    hit(&mut harness, ogre, Some(rogue), 10.0);
    assert!(harness.world.get::<&Enrage>(ogre).unwrap().is_enraged());
    hit(&mut harness, ogre, Some(rogue), 5.0);
    hit(&mut harness, ogre, Some(rogue), 1.0);

    let events = harness.events();
    assert_eq!(count(&events, |e| matches!(e, GameEvent::MonsterEnraged { .. })), 1);
    assert_eq!(count(&events, |e| matches!(e, GameEvent::SystemMessage { .. })), 1);
    assert_eq!(harness.ai.metrics().snapshot().enrages, 1);
    assert_eq!(harness.world.get::<&Vitals>(ogre).unwrap().health_current, 9.0);
}

#[test]
fn test_damage_above_threshold_does_not_enrage() {
    let mut harness = Harness::new();
    let ogre = harness.spawn(&ogre(EnrageProfile::default()), at(0.0, 0.0));
    hit(&mut harness, ogre, None, 50.0);
    assert!(!harness.world.get::<&Enrage>(ogre).unwrap().is_enraged());
}

#[test]
fn test_repeated_enrage_is_a_no_op() {
    let mut harness = Harness::new();
    let profile = EnrageProfile::default()
        .with_warning("The ogre bellows!")
        .with_scripts("glow", "fog", "roar");
    let ogre = harness.spawn(&ogre(profile), at(0.0, 0.0));

    assert!(harness.with_ctx(|ai, ctx| ai.enrage(ctx, ogre)).unwrap());
    assert!(!harness.with_ctx(|ai, ctx| ai.enrage(ctx, ogre)).unwrap());

    let events = harness.events();
    assert_eq!(count(&events, |e| matches!(e, GameEvent::PlayScript { .. })), 3);
    assert_eq!(count(&events, |e| matches!(e, GameEvent::SystemMessage { .. })), 1);
}

#[tokio::test(start_paused = true)]
async fn test_enrage_starts_a_single_grapple_loop() {
    let mut harness = Harness::new();
    let ogre = harness.spawn(&ogre(EnrageProfile::default().with_grapple()), at(0.0, 0.0));
    let rogue = harness.player(at(5.0, 0.0));

    harness.with_ctx(|ai, ctx| ai.enrage(ctx, ogre)).unwrap();
    harness.with_ctx(|ai, ctx| ai.enrage(ctx, ogre)).unwrap();
    tokio::time::sleep(Duration::from_secs_f64(30.5)).await;
    harness.tick(0.1);

    let events = harness.events();
    assert_eq!(
        count(&events, |e| matches!(e, GameEvent::PlayerGrappled { player, .. } if *player == rogue)),
        1
    );

    // Three seconds later the victim is dragged to the ogre
    tokio::time::sleep(Duration::from_secs_f64(3.0)).await;
    harness.tick(0.1);
    let events = harness.events();
    assert_eq!(count(&events, |e| matches!(e, GameEvent::PlayerDragged { .. })), 1);
    assert_eq!(
        harness.world.get::<&Monster>(ogre).unwrap().attack_target(),
        Some(rogue)
    );
}

#[tokio::test(start_paused = true)]
async fn test_death_stops_enrage_loops() {
    let mut harness = Harness::new();
    let ogre = harness.spawn(&ogre(EnrageProfile::default().with_grapple().with_hazards()), at(0.0, 0.0));
    harness.player(at(5.0, 0.0));

    harness.with_ctx(|ai, ctx| ai.enrage(ctx, ogre)).unwrap();
    assert!(harness.world.get::<&Enrage>(ogre).unwrap().has_running_loops());
    hit(&mut harness, ogre, None, 1000.0);
    assert!(!harness.world.get::<&Enrage>(ogre).unwrap().has_running_loops());

    tokio::time::sleep(Duration::from_secs(60)).await;
    harness.tick(0.1);
    let events = harness.events();
    assert_eq!(count(&events, |e| matches!(e, GameEvent::PlayerGrappled { .. })), 0);
    assert_eq!(count(&events, |e| matches!(e, GameEvent::HazardSpawned { .. })), 0);
}

#[test]
fn test_fight_to_the_death() {
    let mut harness = Harness::new();
    let wolf = harness.wolf(at(0.0, 0.0));
    let rogue = spawn_weak_player(&mut harness);

    let mut died = false;
    for _ in 0..400 {
        harness.tick(0.1);
        if harness
            .events()
            .iter()
            .any(|event| matches!(event, GameEvent::EntityDied { entity, .. } if *entity == rogue))
        {
            died = true;
            break;
        }
    }
    assert!(died, "the wolf never finished its prey");
    assert!(harness.world.contains(rogue));
    assert!(harness.ai.metrics().snapshot().attacks_launched >= 2);

    // With nothing left to fight the wolf heads home and goes back to sleep
    for _ in 0..100 {
        harness.tick(0.1);
    }
    assert_eq!(harness.world.get::<&Monster>(wolf).unwrap().state(), MonsterState::Idle);
}

fn spawn_weak_player(harness: &mut Harness) -> EcsEntity {
    let rogue = harness.player(at(6.0, 0.0));
    harness.world.get::<&mut Vitals>(rogue).unwrap().health_current = 12.0;
    rogue
}

#[test]
fn test_hit_on_vanished_target_is_dropped() {
    let mut harness = Harness::new();
    let wolf = harness.wolf(at(0.0, 0.0));
    let rogue = harness.player(at(1.5, 0.0));

    for _ in 0..30 {
        harness.tick(0.1);
        if harness.scheduler.len() > 0 {
            break;
        }
    }
    assert!(harness.scheduler.len() > 0, "no hit was scheduled");
    harness.world.despawn(rogue).unwrap();
    for _ in 0..30 {
        harness.tick(0.1);
    }

    assert!(harness.ai.metrics().snapshot().attacks_dropped >= 1);
    assert!(harness.events().iter().any(|event| matches!(
        event,
        GameEvent::AttackDropped { attacker, target } if *attacker == wolf && *target == rogue
    )));
}
