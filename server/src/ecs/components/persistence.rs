//
// Copyright 2025 Hans W. Uhlig. All Rights Reserved.
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

//! Persistence markers
//!
//! The AI never writes to storage. It only flags records that changed so an
//! external save scheduler can pick them up with `take_dirty`.

use crate::ecs::{EcsEntity, GameWorld};
use serde::{Deserialize, Serialize};

/// Marks creatures whose records outlive the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persistent;

/// Marks a record modified since the last save
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dirty {
    /// Simulated time of the first change since the last save
    pub since: f64,
}

/// Flag a persistent entity as modified. Transient entities are ignored and
/// an existing mark keeps its original timestamp.
pub fn mark_dirty(world: &mut GameWorld, entity: EcsEntity, now: f64) {
    if !world.satisfies::<&Persistent>(entity) {
        return;
    }
    if world.satisfies::<&Dirty>(entity) {
        return;
    }
    let _ = world.insert_one(entity, Dirty { since: now });
}
