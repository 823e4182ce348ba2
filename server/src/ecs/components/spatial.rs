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

//! Spatial components for positioning and landblock partitioning

use serde::{Deserialize, Serialize};

/// Edge length of a landblock in world units
pub const LANDBLOCK_SIZE: f32 = 192.0;

/// Number of landblocks along each world axis
pub const LANDBLOCKS_PER_AXIS: u16 = 256;

/// Identifier of a landblock, the unit of spatial partitioning
///
/// Packs the x block into the high byte and the y block into the low byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandblockId(pub u16);

impl LandblockId {
    pub fn new(block_x: u8, block_y: u8) -> Self {
        Self(((block_x as u16) << 8) | block_y as u16)
    }

    pub fn block_x(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn block_y(&self) -> u8 {
        (self.0 & 0xFF) as u8
    }
}

impl std::fmt::Display for LandblockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

/// Position of a creature in world coordinates
///
/// The world model copy of this is kept in sync with the physics engine's
/// authoritative position after every physics step.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// The landblock containing this position, clamped to the world edge
    pub fn landblock(&self) -> LandblockId {
        let max = (LANDBLOCKS_PER_AXIS - 1) as f32;
        let block_x = (self.x / LANDBLOCK_SIZE).floor().clamp(0.0, max) as u8;
        let block_y = (self.y / LANDBLOCK_SIZE).floor().clamp(0.0, max) as u8;
        LandblockId::new(block_x, block_y)
    }

    /// Squared distance ignoring height
    pub fn squared_planar_distance(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn squared_distance(&self, other: &Position) -> f32 {
        let dz = self.z - other.z;
        self.squared_planar_distance(other) + dz * dz
    }

    pub fn distance(&self, other: &Position) -> f32 {
        self.squared_distance(other).sqrt()
    }

    /// Step toward `other` by at most `amount` units
    pub fn advance_toward(&self, other: &Position, amount: f32) -> Position {
        let distance = self.distance(other);
        if distance <= amount || distance <= f32::EPSILON {
            return *other;
        }
        let ratio = amount / distance;
        Position {
            x: self.x + (other.x - self.x) * ratio,
            y: self.y + (other.y - self.y) * ratio,
            z: self.z + (other.z - self.z) * ratio,
        }
    }

    /// Heading in degrees from this position toward `other`, 0 is north
    pub fn heading_to(&self, other: &Position) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx.atan2(dy).to_degrees().rem_euclid(360.0)
    }
}

/// Locomotion phase of a creature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotionState {
    Idle,
    /// Turning in place to face the target
    Turning,
    /// Executing a move-to-object or move-to-position
    Moving,
}

/// Movement bookkeeping for creatures that walk on their own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Navigator {
    pub motion: MotionState,
    /// Where the creature returns to when it gives up a fight
    pub home: Option<Position>,
    /// Leash radius around `home`
    pub home_radius: f32,
    /// Earliest time a new move may be issued
    pub next_move_time: f64,
    /// When the next stuck check runs while moving
    pub next_stuck_check: f64,
}

impl Navigator {
    pub fn new(home: Position, home_radius: f32) -> Self {
        Self {
            motion: MotionState::Idle,
            home: Some(home),
            home_radius,
            next_move_time: 0.0,
            next_stuck_check: 0.0,
        }
    }

    pub fn is_moving(&self) -> bool {
        self.motion == MotionState::Moving
    }

    pub fn is_turning(&self) -> bool {
        self.motion == MotionState::Turning
    }

    /// Whether `position` is outside the leash. A creature without a home
    /// is never leashed.
    pub fn is_outside_leash(&self, position: &Position) -> bool {
        self.home.is_some_and(|home| {
            position.squared_planar_distance(&home) > self.home_radius * self.home_radius
        })
    }

    /// Begin a motion and arm the stuck window
    pub fn begin(&mut self, motion: MotionState, now: f64, stuck_window: f64) {
        self.motion = motion;
        self.next_stuck_check = now + stuck_window;
    }

    pub fn stop(&mut self) {
        self.motion = MotionState::Idle;
    }
}
