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

//! ECS Systems
//!
//! This module contains the monster decision loop. [`MonsterAiSystem`] is a
//! single system whose behavior is split across one file per concern.

mod alert;
pub mod awareness;
mod combat;
pub mod enrage;
mod monster_ai;
pub mod navigation;

// Re-export all systems
pub use awareness::{TargetDistance, select_weighted_distance, sort_by_distance};
pub use enrage::{EnrageAction, EnrageCommand};
pub use monster_ai::MonsterAiSystem;
pub use navigation::{Relocation, sync_positions};
