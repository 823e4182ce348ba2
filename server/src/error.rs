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

//! Error types shared by the creature AI systems and the simulation engine.

use crate::ecs::EcsEntity;
use crate::ecs::components::LandblockId;
use thiserror::Error;

/// Errors that can occur while driving the creature decision loop.
///
/// Nothing here is fatal to the process. Most tick-level failures degrade to
/// a safe default instead of surfacing as an error at all; these variants
/// cover the externally invoked entry points and setup paths.
#[derive(Debug, Error)]
pub enum AiError {
    /// The entity no longer exists in this landblock group.
    #[error("Entity not found: {0:?}")]
    EntityNotFound(EcsEntity),

    /// The entity exists but carries no monster AI state.
    #[error("Entity {0:?} is not a monster")]
    NotAMonster(EcsEntity),

    /// The configuration file could not be opened.
    #[error("Failed to open config file: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// The configuration file could not be parsed.
    #[error("Failed to parse config file: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// A content table entry is malformed.
    #[error("Invalid content definition: {0}")]
    ContentParse(String),

    /// An entity could not be handed over to another landblock group.
    #[error("Transfer to landblock {landblock} failed: {reason}")]
    Transfer { landblock: LandblockId, reason: String },

    /// The owning group stopped listening for enrage commands.
    #[error("Enrage command channel closed for {0:?}")]
    EnrageChannelClosed(EcsEntity),

    /// An enrage loop was cancelled while waiting.
    #[error("Enrage loop cancelled")]
    Cancelled,
}

/// Result type for creature AI operations.
pub type AiResult<T> = Result<T, AiError>;
