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

//! Identity components for creature identification and classification

use flagset::{FlagSet, flags};
use serde::{Deserialize, Serialize};

/// Unique identifier for creatures whose records are persisted
///
/// The hecs handle changes whenever a creature moves between landblock groups,
/// this UUID does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityUuid(pub uuid::Uuid);

impl EntityUuid {
    /// Create a new random UUID
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for EntityUuid {
    fn default() -> Self {
        Self::new()
    }
}

/// Display name for a creature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    /// Primary display name
    pub display: String,
}

impl Name {
    pub fn new(display: impl Into<String>) -> Self {
        Self {
            display: display.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.display
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display)
    }
}

/// Who controls a creature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CreatureKind {
    /// Human controlled
    Player,
    /// Summoned or tamed companion fighting for a player
    Pet,
    /// Autonomous hostile actor driven by the monster AI
    Monster,
}

/// Species classification used for ally and foe rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CreatureType(pub u32);

flags! {
    /// Faction membership. Creatures sharing any faction bit are at peace
    /// unless provoked.
    pub enum Faction: u32 {
        Wardens = 0x0001,
        Reavers = 0x0002,
        Hollow = 0x0004,
        Wildkin = 0x0008,
    }

    /// Per-creature state flags consulted by target enumeration
    pub enum CreatureFlag: u32 {
        /// May be attacked at all
        Attackable = 0x0001,
        /// Stealthed or invisible to monsters
        Hidden = 0x0002,
        /// In the middle of a portal or recall
        Teleporting = 0x0004,
        /// Cannot move, only turn
        Immobile = 0x0008,
    }
}

/// Classification data shared by players, pets, and monsters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Creature {
    pub kind: CreatureKind,
    pub creature_type: CreatureType,
    /// Species this creature defends when alerted
    pub friend_type: Option<CreatureType>,
    /// Species this creature hunts regardless of faction
    pub foe_type: Option<CreatureType>,
    pub faction: FlagSet<Faction>,
    pub level: u32,
    pub flags: FlagSet<CreatureFlag>,
}

impl Creature {
    /// Create a new attackable creature with no faction
    pub fn new(kind: CreatureKind, creature_type: CreatureType, level: u32) -> Self {
        Self {
            kind,
            creature_type,
            friend_type: None,
            foe_type: None,
            faction: FlagSet::default(),
            level,
            flags: CreatureFlag::Attackable.into(),
        }
    }

    /// Create a player creature
    pub fn player(level: u32) -> Self {
        Self::new(CreatureKind::Player, CreatureType(0), level)
    }

    pub fn with_faction(mut self, faction: impl Into<FlagSet<Faction>>) -> Self {
        self.faction = faction.into();
        self
    }

    pub fn with_friend_type(mut self, friend_type: CreatureType) -> Self {
        self.friend_type = Some(friend_type);
        self
    }

    pub fn with_foe_type(mut self, foe_type: CreatureType) -> Self {
        self.foe_type = Some(foe_type);
        self
    }

    pub fn with_flags(mut self, flags: impl Into<FlagSet<CreatureFlag>>) -> Self {
        self.flags = flags.into();
        self
    }

    pub fn is_player(&self) -> bool {
        self.kind == CreatureKind::Player
    }

    pub fn is_pet(&self) -> bool {
        self.kind == CreatureKind::Pet
    }

    pub fn is_attackable(&self) -> bool {
        self.flags.contains(CreatureFlag::Attackable)
    }

    pub fn is_hidden(&self) -> bool {
        self.flags.contains(CreatureFlag::Hidden)
    }

    pub fn is_teleporting(&self) -> bool {
        self.flags.contains(CreatureFlag::Teleporting)
    }

    pub fn is_immobile(&self) -> bool {
        self.flags.contains(CreatureFlag::Immobile)
    }

    /// Clear the hidden flag, returning true if it was set
    pub fn reveal(&mut self) -> bool {
        let was_hidden = self.is_hidden();
        self.flags -= CreatureFlag::Hidden;
        was_hidden
    }

    /// Whether both creatures share at least one faction
    pub fn same_faction(&self, other: &Creature) -> bool {
        !(self.faction & other.faction).is_empty()
    }

    /// Whether this creature hunts the other regardless of faction peace
    pub fn potential_foe(&self, other: &Creature) -> bool {
        self.foe_type == Some(other.creature_type)
    }
}
