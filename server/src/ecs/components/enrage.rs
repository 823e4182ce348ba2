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

//! Enrage escalation components

use crate::ecs::EcsEntity;
use crate::ecs::components::DamageType;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// How a creature behaves once badly hurt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrageProfile {
    /// Health fraction at or below which enrage fires
    #[serde(default = "EnrageProfile::default_threshold")]
    pub threshold: f32,
    #[serde(default)]
    pub visual_script: Option<String>,
    #[serde(default)]
    pub fog_script: Option<String>,
    #[serde(default)]
    pub sound_script: Option<String>,
    /// Broadcast to nearby players when enrage fires
    #[serde(default)]
    pub warning: Option<String>,
    /// Range of the warning broadcast
    #[serde(default = "EnrageProfile::default_broadcast_radius")]
    pub broadcast_radius: f32,
    /// Seize and drag players periodically
    #[serde(default)]
    pub grapple: bool,
    #[serde(default = "EnrageProfile::default_grapple_radius")]
    pub grapple_radius: f32,
    /// Drop hazards under players periodically
    #[serde(default)]
    pub hazards: bool,
    #[serde(default = "EnrageProfile::default_hazard_radius")]
    pub hazard_radius: f32,
}

impl EnrageProfile {
    fn default_threshold() -> f32 {
        0.2
    }

    fn default_broadcast_radius() -> f32 {
        60.0
    }

    fn default_grapple_radius() -> f32 {
        40.0
    }

    fn default_hazard_radius() -> f32 {
        40.0
    }

    pub fn with_grapple(mut self) -> Self {
        self.grapple = true;
        self
    }

    pub fn with_hazards(mut self) -> Self {
        self.hazards = true;
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }

    pub fn with_scripts(
        mut self,
        visual: impl Into<String>,
        fog: impl Into<String>,
        sound: impl Into<String>,
    ) -> Self {
        self.visual_script = Some(visual.into());
        self.fog_script = Some(fog.into());
        self.sound_script = Some(sound.into());
        self
    }
}

impl Default for EnrageProfile {
    fn default() -> Self {
        Self {
            threshold: Self::default_threshold(),
            visual_script: None,
            fog_script: None,
            sound_script: None,
            warning: None,
            broadcast_radius: Self::default_broadcast_radius(),
            grapple: false,
            grapple_radius: Self::default_grapple_radius(),
            hazards: false,
            hazard_radius: Self::default_hazard_radius(),
        }
    }
}

/// Enrage state of a creature capable of it
#[derive(Debug, Clone, Default)]
pub struct Enrage {
    pub profile: EnrageProfile,
    enraged: bool,
    /// Cancels the grapple and hazard loops
    token: Option<CancellationToken>,
    pub last_grappled: Option<EcsEntity>,
    /// Seized player waiting to be dragged
    pub grapple_victim: Option<EcsEntity>,
    /// Bumped whenever a fresh set of loops is armed
    generation: u64,
}

impl Enrage {
    pub fn new(profile: EnrageProfile) -> Self {
        Self {
            profile,
            ..Default::default()
        }
    }

    pub fn is_enraged(&self) -> bool {
        self.enraged
    }

    /// Whether damage bringing health to `fraction` should fire enrage
    pub fn should_trigger(&self, fraction: f32) -> bool {
        !self.enraged && fraction <= self.profile.threshold
    }

    /// Mark enraged and hand out the token the loops watch. Returns `None`
    /// when already enraged.
    pub fn arm(&mut self) -> Option<CancellationToken> {
        if self.enraged {
            return None;
        }
        self.enraged = true;
        self.generation = self.generation.wrapping_add(1);
        let token = CancellationToken::new();
        self.token = Some(token.clone());
        Some(token)
    }

    /// Replace the loop token after a transfer, keeping the enraged flag
    pub fn rearm(&mut self) -> Option<CancellationToken> {
        if !self.enraged {
            return None;
        }
        self.cancel_loops();
        self.generation = self.generation.wrapping_add(1);
        let token = CancellationToken::new();
        self.token = Some(token.clone());
        Some(token)
    }

    /// Stop any running loops without leaving the enraged state
    pub fn cancel_loops(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }

    /// Leave the enraged state entirely
    pub fn calm(&mut self) {
        self.cancel_loops();
        self.enraged = false;
        self.grapple_victim = None;
        self.last_grappled = None;
    }

    /// Loops armed under an older generation have been replaced
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_running_loops(&self) -> bool {
        self.token.as_ref().is_some_and(|token| !token.is_cancelled())
    }
}

/// Hazard palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HazardKind {
    Fire,
    Frost,
    Acid,
    Lightning,
    /// Holds players in place, deals no damage
    Cage,
}

impl HazardKind {
    pub const ALL: [HazardKind; 5] = [
        HazardKind::Fire,
        HazardKind::Frost,
        HazardKind::Acid,
        HazardKind::Lightning,
        HazardKind::Cage,
    ];

    pub fn damage_type(&self) -> Option<DamageType> {
        match self {
            HazardKind::Fire => Some(DamageType::Fire),
            HazardKind::Frost => Some(DamageType::Cold),
            HazardKind::Acid => Some(DamageType::Acid),
            HazardKind::Lightning => Some(DamageType::Electric),
            HazardKind::Cage => None,
        }
    }
}

/// A ground effect left by an enraged creature
#[derive(Debug, Clone, PartialEq)]
pub struct Hazard {
    pub kind: HazardKind,
    pub owner: EcsEntity,
    pub expires_at: f64,
    pub radius: f32,
    /// Damage dealt to each player inside per pulse
    pub pulse_damage: f32,
    pub next_pulse: f64,
}

impl Hazard {
    pub fn is_expired(&self, now: f64) -> bool {
        now >= self.expires_at
    }
}
