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

//! Physics collaborator
//!
//! The decision loop never computes a distance, a sight line, or a path on
//! its own. Every spatial question goes through [`PhysicsEngine`], which owns
//! the authoritative position of every body. [`PlanarPhysics`] is the small
//! reference engine used by the simulation binary and the tests: straight
//! line motion on the plane, circular sight blockers, and a switch that
//! makes a body fail to make progress.

use crate::ecs::EcsEntity;
use crate::ecs::components::Position;
use std::collections::HashMap;

/// Parameters for a move command
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveParams {
    /// World units per second
    pub speed: f32,
    /// Stop once within this distance of the destination
    pub distance_to_object: f32,
}

/// Outcome of a motion reported by [`PhysicsEngine::step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionEvent {
    /// Arrived or finished turning
    Completed(EcsEntity),
    /// The destination object disappeared
    Aborted(EcsEntity),
}

/// Spatial queries and motion execution
#[cfg_attr(test, mockall::automock)]
pub trait PhysicsEngine: Send {
    fn add_body(&mut self, entity: EcsEntity, position: Position);

    /// Remove a body, returning its last position
    fn remove_body(&mut self, entity: EcsEntity) -> Option<Position>;

    fn position(&self, entity: EcsEntity) -> Option<Position>;

    /// `None` when either side has no body
    fn distance(&self, from: EcsEntity, to: EcsEntity) -> Option<f32>;

    /// `None` when either side has no body
    fn squared_distance(&self, from: EcsEntity, to: EcsEntity) -> Option<f32>;

    fn line_of_sight(&self, from: EcsEntity, to: EcsEntity) -> bool;

    /// Bodies `entity` can currently see, in a stable order
    fn visible_creatures(&self, entity: EcsEntity) -> Vec<EcsEntity>;

    fn move_to_object(&mut self, entity: EcsEntity, target: EcsEntity, params: MoveParams) -> bool;

    fn move_to_position(&mut self, entity: EcsEntity, destination: Position, params: MoveParams) -> bool;

    fn turn_to_object(&mut self, entity: EcsEntity, target: EcsEntity) -> bool;

    fn cancel_move(&mut self, entity: EcsEntity);

    /// Consecutive steps in which the current move made no progress
    fn failed_progress_count(&self, entity: EcsEntity) -> u32;

    fn teleport(&mut self, entity: EcsEntity, destination: Position) -> bool;

    /// Advance every motion by `dt` seconds
    fn step(&mut self, dt: f32) -> Vec<MotionEvent>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Motion {
    ToObject { target: EcsEntity, params: MoveParams },
    ToPosition { destination: Position, params: MoveParams },
    Turn { target: EcsEntity },
}

#[derive(Debug, Clone)]
struct Body {
    position: Position,
    heading: f32,
    motion: Option<Motion>,
    failed_progress: u32,
    obstructed: bool,
}

/// A round obstacle that blocks sight lines
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Occluder {
    pub center: Position,
    pub radius: f32,
}

/// Straight-line planar physics
#[derive(Debug, Clone)]
pub struct PlanarPhysics {
    bodies: HashMap<EcsEntity, Body>,
    occluders: Vec<Occluder>,
    view_distance: f32,
}

impl PlanarPhysics {
    pub fn new(view_distance: f32) -> Self {
        Self {
            bodies: HashMap::new(),
            occluders: Vec::new(),
            view_distance,
        }
    }

    pub fn add_occluder(&mut self, center: Position, radius: f32) {
        self.occluders.push(Occluder { center, radius });
    }

    /// While obstructed a body stays put and counts failed progress
    pub fn set_obstructed(&mut self, entity: EcsEntity, obstructed: bool) {
        if let Some(body) = self.bodies.get_mut(&entity) {
            body.obstructed = obstructed;
        }
    }

    pub fn heading(&self, entity: EcsEntity) -> Option<f32> {
        self.bodies.get(&entity).map(|body| body.heading)
    }

    pub fn is_moving(&self, entity: EcsEntity) -> bool {
        self.bodies
            .get(&entity)
            .is_some_and(|body| body.motion.is_some())
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn segment_blocked(&self, from: &Position, to: &Position) -> bool {
        let (dx, dy) = (to.x - from.x, to.y - from.y);
        let length_sq = dx * dx + dy * dy;
        self.occluders.iter().any(|occluder| {
            let t = if length_sq <= f32::EPSILON {
                0.0
            } else {
                (((occluder.center.x - from.x) * dx + (occluder.center.y - from.y) * dy) / length_sq)
                    .clamp(0.0, 1.0)
            };
            let closest = Position::new(from.x + dx * t, from.y + dy * t, occluder.center.z);
            closest.squared_planar_distance(&occluder.center) < occluder.radius * occluder.radius
        })
    }

    fn begin(&mut self, entity: EcsEntity, motion: Motion) -> bool {
        match self.bodies.get_mut(&entity) {
            Some(body) => {
                body.motion = Some(motion);
                body.failed_progress = 0;
                true
            }
            None => false,
        }
    }
}

impl Default for PlanarPhysics {
    fn default() -> Self {
        Self::new(100.0)
    }
}

impl PhysicsEngine for PlanarPhysics {
    fn add_body(&mut self, entity: EcsEntity, position: Position) {
        self.bodies.insert(
            entity,
            Body {
                position,
                heading: 0.0,
                motion: None,
                failed_progress: 0,
                obstructed: false,
            },
        );
    }

    fn remove_body(&mut self, entity: EcsEntity) -> Option<Position> {
        self.bodies.remove(&entity).map(|body| body.position)
    }

    fn position(&self, entity: EcsEntity) -> Option<Position> {
        self.bodies.get(&entity).map(|body| body.position)
    }

    fn distance(&self, from: EcsEntity, to: EcsEntity) -> Option<f32> {
        self.squared_distance(from, to).map(f32::sqrt)
    }

    fn squared_distance(&self, from: EcsEntity, to: EcsEntity) -> Option<f32> {
        let from = self.bodies.get(&from)?;
        let to = self.bodies.get(&to)?;
        Some(from.position.squared_distance(&to.position))
    }

    fn line_of_sight(&self, from: EcsEntity, to: EcsEntity) -> bool {
        match (self.bodies.get(&from), self.bodies.get(&to)) {
            (Some(from), Some(to)) => !self.segment_blocked(&from.position, &to.position),
            _ => false,
        }
    }

    fn visible_creatures(&self, entity: EcsEntity) -> Vec<EcsEntity> {
        let Some(viewer) = self.bodies.get(&entity) else {
            return Vec::new();
        };
        let range_sq = self.view_distance * self.view_distance;
        let mut visible: Vec<EcsEntity> = self
            .bodies
            .iter()
            .filter(|(other, body)| {
                **other != entity
                    && viewer.position.squared_distance(&body.position) <= range_sq
                    && !self.segment_blocked(&viewer.position, &body.position)
            })
            .map(|(other, _)| *other)
            .collect();
        visible.sort_by_key(|other| other.to_bits());
        visible
    }

    fn move_to_object(&mut self, entity: EcsEntity, target: EcsEntity, params: MoveParams) -> bool {
        if !self.bodies.contains_key(&target) {
            return false;
        }
        self.begin(entity, Motion::ToObject { target, params })
    }

    fn move_to_position(&mut self, entity: EcsEntity, destination: Position, params: MoveParams) -> bool {
        self.begin(entity, Motion::ToPosition { destination, params })
    }

    fn turn_to_object(&mut self, entity: EcsEntity, target: EcsEntity) -> bool {
        if !self.bodies.contains_key(&target) {
            return false;
        }
        self.begin(entity, Motion::Turn { target })
    }

    fn cancel_move(&mut self, entity: EcsEntity) {
        if let Some(body) = self.bodies.get_mut(&entity) {
            body.motion = None;
            body.failed_progress = 0;
        }
    }

    fn failed_progress_count(&self, entity: EcsEntity) -> u32 {
        self.bodies
            .get(&entity)
            .map(|body| body.failed_progress)
            .unwrap_or(0)
    }

    fn teleport(&mut self, entity: EcsEntity, destination: Position) -> bool {
        match self.bodies.get_mut(&entity) {
            Some(body) => {
                body.position = destination;
                body.motion = None;
                body.failed_progress = 0;
                true
            }
            None => false,
        }
    }

    fn step(&mut self, dt: f32) -> Vec<MotionEvent> {
        let positions: HashMap<EcsEntity, Position> = self
            .bodies
            .iter()
            .map(|(entity, body)| (*entity, body.position))
            .collect();

        let mut moving: Vec<EcsEntity> = self
            .bodies
            .iter()
            .filter(|(_, body)| body.motion.is_some())
            .map(|(entity, _)| *entity)
            .collect();
        moving.sort_by_key(|entity| entity.to_bits());

        let mut events = Vec::new();
        for entity in moving {
            let Some(body) = self.bodies.get_mut(&entity) else {
                continue;
            };
            let Some(motion) = body.motion else {
                continue;
            };

            let (destination, params) = match motion {
                Motion::Turn { target } => {
                    if let Some(target) = positions.get(&target) {
                        body.heading = body.position.heading_to(target);
                        events.push(MotionEvent::Completed(entity));
                    } else {
                        events.push(MotionEvent::Aborted(entity));
                    }
                    body.motion = None;
                    continue;
                }
                Motion::ToObject { target, params } => match positions.get(&target) {
                    Some(destination) => (*destination, params),
                    None => {
                        body.motion = None;
                        events.push(MotionEvent::Aborted(entity));
                        continue;
                    }
                },
                Motion::ToPosition { destination, params } => (destination, params),
            };

            if body.obstructed {
                body.failed_progress += 1;
                continue;
            }

            let remaining = body.position.distance(&destination) - params.distance_to_object;
            if remaining > 0.0 {
                let advance = (params.speed * dt).min(remaining);
                body.heading = body.position.heading_to(&destination);
                body.position = body.position.advance_toward(&destination, advance);
                body.failed_progress = 0;
            }
            if remaining - params.speed * dt <= f32::EPSILON {
                body.motion = None;
                events.push(MotionEvent::Completed(entity));
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entities(count: usize) -> Vec<EcsEntity> {
        let mut world = hecs::World::new();
        (0..count).map(|_| world.spawn(())).collect()
    }

    #[test]
    fn test_move_to_object_arrives() {
        let ids = entities(2);
        let mut physics = PlanarPhysics::default();
        physics.add_body(ids[0], Position::new(0.0, 0.0, 0.0));
        physics.add_body(ids[1], Position::new(10.0, 0.0, 0.0));

        let params = MoveParams {
            speed: 4.0,
            distance_to_object: 2.0,
        };
        assert!(physics.move_to_object(ids[0], ids[1], params));

        assert!(physics.step(1.0).is_empty());
        assert_eq!(physics.step(1.0), vec![MotionEvent::Completed(ids[0])]);
        let distance = physics.distance(ids[0], ids[1]).unwrap();
        assert!((distance - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_obstructed_body_counts_failures() {
        let ids = entities(2);
        let mut physics = PlanarPhysics::default();
        physics.add_body(ids[0], Position::new(0.0, 0.0, 0.0));
        physics.add_body(ids[1], Position::new(50.0, 0.0, 0.0));
        physics.set_obstructed(ids[0], true);
        physics.move_to_object(
            ids[0],
            ids[1],
            MoveParams {
                speed: 4.0,
                distance_to_object: 1.0,
            },
        );

        for _ in 0..3 {
            physics.step(0.5);
        }
        assert_eq!(physics.failed_progress_count(ids[0]), 3);
        assert_eq!(physics.position(ids[0]), Some(Position::new(0.0, 0.0, 0.0)));

        physics.cancel_move(ids[0]);
        assert_eq!(physics.failed_progress_count(ids[0]), 0);
        assert!(!physics.is_moving(ids[0]));
    }

    #[test]
    fn test_occluder_blocks_sight() {
        let ids = entities(3);
        let mut physics = PlanarPhysics::default();
        physics.add_body(ids[0], Position::new(0.0, 0.0, 0.0));
        physics.add_body(ids[1], Position::new(20.0, 0.0, 0.0));
        physics.add_body(ids[2], Position::new(0.0, 20.0, 0.0));
        physics.add_occluder(Position::new(10.0, 0.0, 0.0), 2.0);

        assert!(!physics.line_of_sight(ids[0], ids[1]));
        assert!(physics.line_of_sight(ids[0], ids[2]));
        assert_eq!(physics.visible_creatures(ids[0]), vec![ids[2]]);
    }

    #[test]
    fn test_view_distance() {
        let ids = entities(2);
        let mut physics = PlanarPhysics::new(10.0);
        physics.add_body(ids[0], Position::new(0.0, 0.0, 0.0));
        physics.add_body(ids[1], Position::new(11.0, 0.0, 0.0));
        assert!(physics.visible_creatures(ids[0]).is_empty());
        assert_eq!(physics.squared_distance(ids[0], ids[1]), Some(121.0));
    }

    #[test]
    fn test_missing_body() {
        let ids = entities(2);
        let mut physics = PlanarPhysics::default();
        physics.add_body(ids[0], Position::default());
        assert!(physics.distance(ids[0], ids[1]).is_none());
        assert!(!physics.line_of_sight(ids[0], ids[1]));
        assert!(!physics.teleport(ids[1], Position::default()));
    }

    #[test]
    fn test_vanished_target_aborts() {
        let ids = entities(2);
        let mut physics = PlanarPhysics::default();
        physics.add_body(ids[0], Position::default());
        physics.add_body(ids[1], Position::new(30.0, 0.0, 0.0));
        physics.move_to_object(
            ids[0],
            ids[1],
            MoveParams {
                speed: 1.0,
                distance_to_object: 1.0,
            },
        );
        physics.remove_body(ids[1]);
        assert_eq!(physics.step(0.1), vec![MotionEvent::Aborted(ids[0])]);
    }
}
