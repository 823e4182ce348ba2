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

//! Registry mapping persistent UUIDs to their current group and handle
//!
//! A creature's hecs handle changes every time it crosses into another
//! landblock group. The registry is how anything outside the groups follows
//! it across those moves.

use crate::ecs::EcsEntity;
use crate::ecs::components::EntityUuid;
use crate::engine::GroupId;
use std::collections::HashMap;

/// Where a creature currently lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    pub group: GroupId,
    pub entity: EcsEntity,
}

/// Bidirectional map between UUIDs and group-local handles
#[derive(Debug, Default)]
pub struct EntityRegistry {
    locations: HashMap<EntityUuid, Location>,
    uuids: HashMap<Location, EntityUuid>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly spawned creature
    ///
    /// # Returns
    /// * `Err(String)` if the UUID or the location is already registered
    pub fn register(&mut self, uuid: EntityUuid, location: Location) -> Result<(), String> {
        if self.locations.contains_key(&uuid) {
            return Err(format!("UUID {} is already registered", uuid.0));
        }
        if self.uuids.contains_key(&location) {
            return Err(format!("{:?} in group {} is already registered", location.entity, location.group));
        }
        self.locations.insert(uuid, location);
        self.uuids.insert(location, uuid);
        Ok(())
    }

    /// Point a UUID at its new home after a transfer. Returns the old location.
    pub fn relocate(&mut self, uuid: EntityUuid, location: Location) -> Option<Location> {
        let previous = self.locations.insert(uuid, location);
        if let Some(previous) = previous {
            self.uuids.remove(&previous);
        }
        self.uuids.insert(location, uuid);
        previous
    }

    pub fn unregister(&mut self, uuid: EntityUuid) -> Option<Location> {
        let location = self.locations.remove(&uuid)?;
        self.uuids.remove(&location);
        Some(location)
    }

    pub fn locate(&self, uuid: EntityUuid) -> Option<Location> {
        self.locations.get(&uuid).copied()
    }

    pub fn uuid_at(&self, location: Location) -> Option<EntityUuid> {
        self.uuids.get(&location).copied()
    }

    /// Drop every entry the predicate rejects, typically despawned corpses
    pub fn retain(&mut self, mut keep: impl FnMut(&Location) -> bool) {
        self.locations.retain(|_, location| keep(location));
        let locations = &self.locations;
        self.uuids.retain(|_, uuid| locations.contains_key(uuid));
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}
