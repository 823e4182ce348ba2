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

//! Awareness, targeting and cache integration tests

mod common;

use bestiary_server::ecs::GameWorld;
use bestiary_server::ecs::cache::TargetCache;
use bestiary_server::ecs::components::*;
use bestiary_server::ecs::events::GameEvent;
use bestiary_server::ecs::metrics::AiMetrics;
use bestiary_server::ecs::spawner::MonsterTemplate;
use bestiary_server::ecs::systems::{TargetDistance, select_weighted_distance};
use common::{Harness, at};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn test_weighted_selection_distribution() {
    let mut world = GameWorld::new();
    let candidates: Vec<TargetDistance> = [1.0, 2.0, 3.0]
        .into_iter()
        .map(|distance| TargetDistance::new(world.spawn(()), distance))
        .collect();
    let metrics = AiMetrics::new();
    let mut rng = StdRng::seed_from_u64(2024);

    let draws = 30_000;
    let mut counts = [0usize; 3];
    for _ in 0..draws {
        let picked = select_weighted_distance(&candidates, &mut rng, &metrics).unwrap();
        let index = candidates.iter().position(|c| c.target == picked).unwrap();
        counts[index] += 1;
    }

    // Weights 5/6, 4/6 and 3/6 over a roll in [0, 2)
    let expected = [5.0 / 12.0, 4.0 / 12.0, 3.0 / 12.0];
    for (count, expected) in counts.iter().zip(expected) {
        let observed = *count as f64 / draws as f64;
        assert!((observed - expected).abs() < 0.02, "observed {observed}, expected {expected}");
    }
    assert_eq!(metrics.snapshot().selection_anomalies, 0);
}

#[test]
fn test_single_candidate_consumes_no_randomness() {
    let mut world = GameWorld::new();
    let only = world.spawn(());
    let metrics = AiMetrics::new();
    let mut rng = StdRng::seed_from_u64(5);
    let mut untouched = rng.clone();

    let picked = select_weighted_distance(&[TargetDistance::new(only, 12.0)], &mut rng, &metrics);
    assert_eq!(picked, Some(only));
    assert_eq!(rng.random::<u64>(), untouched.random::<u64>());
}

#[test]
fn test_hidden_candidate_is_excluded() {
    let mut harness = Harness::new();
    let wolf = harness.wolf(at(0.0, 0.0));
    let rogue = harness.player(at(5.0, 0.0));
    harness
        .world
        .get::<&mut Creature>(rogue)
        .unwrap()
        .flags |= CreatureFlag::Hidden;

    let visible = harness.with_ctx(|ai, ctx| ai.visible_targets(ctx, wolf));
    assert!(visible.is_empty());

    for _ in 0..20 {
        harness.tick(0.1);
    }
    assert_eq!(harness.world.get::<&Monster>(wolf).unwrap().state(), MonsterState::Idle);
}

#[test]
fn test_candidates_sorted_and_limited_to_visual_range() {
    let mut harness = Harness::new();
    let wolf = harness.wolf(at(0.0, 0.0));
    let far = harness.player(at(12.0, 0.0));
    let near = harness.player(at(0.0, 4.0));
    harness.player(at(35.0, 0.0));

    let visible = harness.with_ctx(|ai, ctx| ai.visible_targets(ctx, wolf));
    let targets: Vec<_> = visible.iter().map(|candidate| candidate.target).collect();
    assert_eq!(targets, vec![near, far]);
    assert!(visible[0].distance <= visible[1].distance);
}

#[test]
fn test_nearest_tactic_picks_closest() {
    let mut harness = Harness::new();
    let mut template = MonsterTemplate::new("Hound", CreatureType(7), 100.0);
    template.tactics = TargetingTactic::Nearest.into();
    let hound = harness.spawn(&template, at(0.0, 0.0));
    harness.player(at(9.0, 0.0));
    let near = harness.player(at(3.0, 0.0));

    let target = harness
        .with_ctx(|ai, ctx| ai.find_next_target(ctx, hound))
        .unwrap();
    assert_eq!(target, Some(near));
    let monster = harness.world.get::<&Monster>(hound).unwrap();
    assert_eq!(monster.attack_target(), Some(near));
    assert_eq!(monster.state(), MonsterState::Awake);
}

#[test]
fn test_pack_wakes_together() {
    let mut harness = Harness::new();
    let scout = harness.wolf(at(0.0, 0.0));
    let packmate = harness.wolf(at(-25.0, 0.0));
    let stranger = harness.spawn(&MonsterTemplate::new("Bear", CreatureType(9), 100.0), at(-20.0, 5.0));
    let rogue = harness.player(at(10.0, 0.0));

    harness.with_ctx(|ai, ctx| ai.wake_up(ctx, scout, true)).unwrap();

    let packmate_target = harness.world.get::<&Monster>(packmate).unwrap().attack_target();
    assert_eq!(packmate_target, Some(rogue));
    assert!(!harness.world.get::<&Monster>(stranger).unwrap().is_awake());
    assert!(harness.events().iter().any(|event| matches!(
        event,
        GameEvent::AlliesAlerted { entity, allies, .. } if *entity == scout && allies.contains(&packmate)
    )));
}

#[test]
fn test_retarget_invalidates_cached_distance() {
    let mut harness = Harness::new();
    let wolf = harness.wolf(at(0.0, 0.0));
    let near = harness.player(at(3.0, 0.0));
    let far = harness.player(at(0.0, 15.0));
    let metrics = AiMetrics::new();

    let mut monster = harness.world.get::<&mut Monster>(wolf).unwrap();
    monster.engage(near);
    let first = monster.cache_mut().target_distance(0.0, 0.25, &metrics, || 3.0);
    monster.engage(far);
    let second = monster.cache_mut().target_distance(0.1, 0.25, &metrics, || 15.0);
    assert_eq!((first, second), (3.0, 15.0));
    assert_eq!(metrics.snapshot().cache_misses, 2);
}

#[test]
fn test_cache_windows() {
    let metrics = AiMetrics::new();
    let mut cache = TargetCache::new();
    let mut computed = 0;

    for now in [0.0, 0.1, 0.24] {
        cache.target_distance(now, 0.25, &metrics, || {
            computed += 1;
            7.0
        });
    }
    assert_eq!(computed, 1);
    cache.target_distance(0.25, 0.25, &metrics, || {
        computed += 1;
        8.0
    });
    assert_eq!(computed, 2);
    assert_eq!(metrics.snapshot().cache_hits, 2);
}

proptest! {
    #[test]
    fn prop_cache_never_outlives_target(
        steps in prop::collection::vec((0usize..3, 0.0f64..0.4), 1..40)
    ) {
        let mut world = GameWorld::new();
        let targets = [world.spawn(()), world.spawn(()), world.spawn(())];
        let distances = [4.0f32, 11.0, 27.0];
        let metrics = AiMetrics::new();
        let mut monster = Monster::new();
        let mut now = 0.0;

        for (index, dt) in steps {
            now += dt;
            monster.engage(targets[index]);
            let linear = monster
                .cache_mut()
                .target_distance(now, 0.25, &metrics, || distances[index]);
            let squared = monster
                .cache_mut()
                .distance(targets[index], true, now, 0.3, &metrics, || distances[index] * distances[index]);
            prop_assert_eq!(linear, distances[index]);
            prop_assert_eq!(squared, distances[index] * distances[index]);
        }
    }
}
