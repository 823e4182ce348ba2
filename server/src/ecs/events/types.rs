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

//! Event type definitions

use crate::ecs::EcsEntity;
use crate::ecs::components::{AttackHeight, AttackType, DamageType, HazardKind, LandblockId, Position};
use serde::{Deserialize, Serialize};

/// Everything the decision loop reports to the outside world
///
/// Events carry hecs handles, which are only meaningful inside the landblock
/// group that published them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    // Entity lifecycle
    EntitySpawned {
        entity: EcsEntity,
        name: String,
        landblock: LandblockId,
    },
    EntityDespawned {
        entity: EcsEntity,
    },
    EntityTransferred {
        entity: EcsEntity,
        from: LandblockId,
        to: LandblockId,
    },

    // Monster state
    MonsterAwoke {
        entity: EcsEntity,
    },
    MonsterSlept {
        entity: EcsEntity,
    },
    MonsterReturning {
        entity: EcsEntity,
        home: Position,
    },
    EngagedNewEnemy {
        entity: EcsEntity,
        target: EcsEntity,
    },
    AlliesAlerted {
        entity: EcsEntity,
        target: EcsEntity,
        allies: Vec<EcsEntity>,
    },

    // Combat
    AttackLaunched {
        attacker: EcsEntity,
        target: EcsEntity,
        attack_type: AttackType,
        height: Option<AttackHeight>,
    },
    EntityAttacked {
        attacker: Option<EcsEntity>,
        defender: EcsEntity,
        damage_type: DamageType,
        damage: f32,
    },
    AttackDropped {
        attacker: EcsEntity,
        target: EcsEntity,
    },
    EntityDied {
        entity: EcsEntity,
        killer: Option<EcsEntity>,
    },

    // Enrage
    MonsterEnraged {
        entity: EcsEntity,
    },
    PlayScript {
        entity: EcsEntity,
        script: String,
    },
    SystemMessage {
        origin: Position,
        radius: f32,
        message: String,
    },
    PlayerGrappled {
        monster: EcsEntity,
        player: EcsEntity,
    },
    PlayerDragged {
        monster: EcsEntity,
        player: EcsEntity,
        to: Position,
    },
    HazardSpawned {
        hazard: EcsEntity,
        owner: EcsEntity,
        kind: HazardKind,
        at: Position,
    },
    HazardExpired {
        hazard: EcsEntity,
    },
}
