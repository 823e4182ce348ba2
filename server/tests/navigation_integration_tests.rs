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

//! Leash, return and stuck recovery integration tests

mod common;

use bestiary_server::ecs::components::*;
use bestiary_server::ecs::events::GameEvent;
use bestiary_server::ecs::physics::PhysicsEngine;
use bestiary_server::ecs::spawner::MonsterTemplate;
use common::{Harness, at};
use proptest::prelude::*;

const DT: f64 = 0.1;

/// A monster that never picks fights on its own, so the only target is the
/// one the test hands it
fn guard(harness: &mut Harness, home_radius: f32) -> bestiary_server::ecs::EcsEntity {
    let mut template = MonsterTemplate::new("Guard", CreatureType(4), 100.0);
    template.tolerance = Tolerance::Provoke.into();
    template.home_radius = Some(home_radius);
    harness.spawn(&template, at(0.0, 0.0))
}

fn state(harness: &Harness, entity: bestiary_server::ecs::EcsEntity) -> MonsterState {
    harness.world.get::<&Monster>(entity).unwrap().state()
}

#[test]
fn test_chase_closes_distance() {
    let mut harness = Harness::new();
    let wolf = harness.wolf(at(0.0, 0.0));
    let rogue = harness.player(at(15.0, 0.0));

    for _ in 0..50 {
        harness.tick(DT);
    }
    let distance = harness.physics.distance(wolf, rogue).unwrap();
    assert!(distance <= 2.0 + 0.05, "still {distance} away");
}

#[test]
fn test_stuck_recovery_runs_one_tick_after_window() {
    let mut harness = Harness::new();
    let wolf = harness.wolf(at(0.0, 0.0));
    harness.player(at(15.0, 0.0));
    harness.physics.set_obstructed(wolf, true);

    let mut started = None;
    for _ in 0..10 {
        harness.tick(DT);
        if harness.physics.is_moving(wolf) {
            started = Some(harness.now);
            break;
        }
    }
    let started = started.expect("monster never started chasing");

    let window = harness.config.stuck_window;
    let mut recovered = None;
    for _ in 0..40 {
        harness.tick(DT);
        if harness.ai.metrics().snapshot().stuck_recoveries > 0 {
            recovered = Some(harness.now);
            break;
        }
    }
    let recovered = recovered.expect("monster never recovered");
    assert!(recovered - started >= window - 1e-6);
    assert!(recovered - started <= window + DT + 1e-6);
    assert_eq!(state(&harness, wolf), MonsterState::Awake);
}

#[test]
fn test_leashed_monster_walks_home_and_sleeps() {
    let mut harness = Harness::new();
    let guard = guard(&mut harness, 20.0);
    let rogue = harness.player(at(60.0, 0.0));
    harness.world.get::<&mut Monster>(guard).unwrap().engage(rogue);
    harness.physics.teleport(guard, at(25.0, 0.0));

    harness.tick(DT);
    assert_eq!(state(&harness, guard), MonsterState::Return);
    assert!(harness.events().iter().any(|event| matches!(
        event,
        GameEvent::MonsterReturning { entity, .. } if *entity == guard
    )));

    for _ in 0..100 {
        harness.tick(DT);
    }
    assert_eq!(state(&harness, guard), MonsterState::Idle);
    let position = harness.physics.position(guard).unwrap();
    assert!(position.distance(&at(0.0, 0.0)) <= harness.config.home_arrival + 1e-3);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_leash_returns_then_sleeps(
        radius in 10.0f32..40.0,
        overshoot in 1.0f32..20.0,
        angle in 0.0f32..std::f32::consts::TAU,
    ) {
        let mut harness = Harness::new();
        let guard = guard(&mut harness, radius);
        let distance = radius + overshoot;
        let stray = at(distance * angle.cos(), distance * angle.sin());
        let rogue = harness.player(at(stray.x * 3.0, stray.y * 3.0));
        harness.world.get::<&mut Monster>(guard).unwrap().engage(rogue);
        harness.physics.teleport(guard, stray);

        harness.tick(DT);
        prop_assert_eq!(state(&harness, guard), MonsterState::Return);
        prop_assert!(harness.world.get::<&Monster>(guard).unwrap().attack_target().is_none());

        // Run speed is 4 units per second
        let budget = (distance / 4.0 / DT as f32) as usize + 20;
        for _ in 0..budget {
            harness.tick(DT);
            if state(&harness, guard) == MonsterState::Idle {
                break;
            }
        }
        prop_assert_eq!(state(&harness, guard), MonsterState::Idle);
        let home = harness.physics.position(guard).unwrap();
        prop_assert!(home.distance(&at(0.0, 0.0)) <= harness.config.home_arrival + 1e-3);
    }
}
