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

//! Entity Component System (ECS) module
//!
//! This module provides the core ECS infrastructure for a landblock group:
//! components, the collaborators the decision loop talks to, and the systems
//! that drive monsters.

pub use hecs::{Entity, World};

/// Type alias for hecs runtime entity handles (non-persistent, memory-only)
///
/// Handles are only valid inside the landblock group that issued them. The
/// persistent identity of a creature is its [`components::EntityUuid`].
pub type EcsEntity = Entity;

/// Type alias for the game world
pub type GameWorld = World;

pub mod cache;
pub mod components;
pub mod content;
pub mod events;
pub mod metrics;
pub mod physics;
pub mod scheduler;
pub mod spawner;
pub mod systems;

#[cfg(test)]
pub mod test_utils;

/// Mutable state of one landblock group handed to the systems for a tick
pub struct TickContext<'a> {
    pub world: &'a mut GameWorld,
    pub physics: &'a mut dyn physics::PhysicsEngine,
    pub scheduler: &'a mut scheduler::Scheduler,
    /// Simulated time in seconds
    pub now: f64,
}

impl<'a> TickContext<'a> {
    pub fn new(
        world: &'a mut GameWorld,
        physics: &'a mut dyn physics::PhysicsEngine,
        scheduler: &'a mut scheduler::Scheduler,
        now: f64,
    ) -> Self {
        Self {
            world,
            physics,
            scheduler,
            now,
        }
    }
}
