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

use crate::ecs::cache::CacheWindows;
use crate::ecs::content::StaticContent;
use crate::ecs::spawner::SpawnGroup;
use crate::error::AiResult;
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_env_field::EnvField;

/// Command line of the simulation binary
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Arguments {
    #[arg(
        short = 'c',
        long = "config",
        help = "Path to the simulation configuration file",
        default_value = "server/config.yaml"
    )]
    pub config_file: String,

    #[arg(
        short = 'e',
        long = "env",
        help = "Path to environment file",
        default_value = "server/.env"
    )]
    pub env_file: Option<String>,

    #[arg(short = 's', long = "seed", help = "Override the configured random seed")]
    pub seed: Option<u64>,

    #[arg(short = 'd', long = "duration", help = "Override the simulated seconds to run")]
    pub duration: Option<f64>,
}

impl Arguments {
    /// Apply command line overrides on top of the loaded file
    pub fn apply(&self, simulation: &mut SimulationConfig) {
        if let Some(seed) = self.seed {
            simulation.seed = seed.into();
        }
        if let Some(duration) = self.duration {
            simulation.duration = duration.into();
        }
    }
}

impl Default for Arguments {
    fn default() -> Self {
        Self {
            config_file: "config.yaml".to_string(),
            env_file: Some(".env".to_string()),
            seed: None,
            duration: None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub content: StaticContent,
    #[serde(default)]
    pub spawns: Vec<SpawnGroup>,
}

impl Configuration {
    pub fn load(path: &str) -> AiResult<Configuration> {
        let conf = serde_yaml::from_reader(std::fs::File::open(path)?)?;
        Ok(conf)
    }
}

/// Fixed-rate loop settings for the simulation binary
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Ticks per second
    pub tick_rate: EnvField<u32>,
    /// Seed for every random number generator in the run
    pub seed: EnvField<u64>,
    /// Simulated seconds to run for
    pub duration: EnvField<f64>,
    /// Landblocks per axis owned by one landblock group
    pub group_size: EnvField<u8>,
    /// How far physics lets a creature see
    pub view_distance: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate: 10.into(),
            seed: 1.into(),
            duration: 60.0.into(),
            group_size: 4.into(),
            view_distance: 100.0,
        }
    }
}

/// Decision loop tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub target_distance_window: f64,
    pub distance_map_window: f64,
    pub visible_targets_window: f64,
    /// Seconds between target re-evaluations
    pub retarget_interval: f64,
    /// Random spread added to the re-evaluation interval, plus or minus
    pub retarget_jitter: f64,
    /// Seconds between scans by idle monsters
    pub scan_interval: f64,
    /// Multiplier on perception range for the cheap planar pre-filter
    pub prefilter_margin: f32,
    pub stuck_window: f64,
    pub stuck_threshold: u32,
    /// Seconds before the same target may rally allies again
    pub alert_suppression: f64,
    pub home_radius: f32,
    /// Close enough to home to count as arrived
    pub home_arrival: f32,
    pub move_cooldown: f64,
    pub max_attack_rerolls: u32,
    pub recovery_delay_min: f64,
    pub recovery_delay_max: f64,
    pub corpse_delay: f64,
    pub enrage: EnrageConfig,
}

impl AiConfig {
    pub fn cache_windows(&self) -> CacheWindows {
        CacheWindows {
            target_distance: self.target_distance_window,
            distance_map: self.distance_map_window,
            visible_targets: self.visible_targets_window,
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        let windows = CacheWindows::default();
        Self {
            target_distance_window: windows.target_distance,
            distance_map_window: windows.distance_map,
            visible_targets_window: windows.visible_targets,
            retarget_interval: 5.0,
            retarget_jitter: 0.0,
            scan_interval: 1.0,
            prefilter_margin: 1.5,
            stuck_window: 2.0,
            stuck_threshold: 3,
            alert_suppression: 120.0,
            home_radius: 192.0,
            home_arrival: 1.0,
            move_cooldown: 0.5,
            max_attack_rerolls: 10,
            recovery_delay_min: 1.0,
            recovery_delay_max: 3.0,
            corpse_delay: 10.0,
            enrage: EnrageConfig::default(),
        }
    }
}

/// Timing of the enrage grapple and hazard loops
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrageConfig {
    pub grapple_interval: f64,
    /// Wait between seizing a player and dragging them
    pub drag_delay: f64,
    pub hazard_interval_min: f64,
    pub hazard_interval_max: f64,
    pub hazard_lifetime: f64,
    pub hazard_pulse: f64,
    pub hazard_radius: f32,
    pub hazard_damage: f32,
}

impl Default for EnrageConfig {
    fn default() -> Self {
        Self {
            grapple_interval: 30.0,
            drag_delay: 3.0,
            hazard_interval_min: 10.0,
            hazard_interval_max: 15.0,
            hazard_lifetime: 20.0,
            hazard_pulse: 1.0,
            hazard_radius: 4.0,
            hazard_damage: 5.0,
        }
    }
}
