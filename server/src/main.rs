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

use bestiary_server::config::{Arguments, Configuration};
use bestiary_server::ecs::events::{EventBus, GameEvent};
use bestiary_server::engine::WorldEngine;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load arguments from the command line
    let arguments: Arguments = Parser::parse();

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .with_ansi(true)
        .init();

    // Load environment variables from .env file if specified
    if let Some(ref env_file) = arguments.env_file {
        if std::path::Path::new(env_file).exists() {
            tracing::debug!("Loading environment variables from file: {}", env_file);
            dotenv::from_filename(env_file).ok();
        }
    } else {
        // Try default .env file
        tracing::debug!("Loading environment variables from default file");
        dotenv::dotenv().ok();
    }

    // Load configuration from a file with environment variable substitution
    let config: Configuration =
        Configuration::load(&arguments.config_file).expect("Unable to load configuration file");

    tracing::debug!("Configuration loaded: {:?}", config);
    tracing::info!("Starting Bestiary Simulation Server...");

    let Configuration {
        mut simulation,
        ai,
        content,
        spawns,
    } = config;
    arguments.apply(&mut simulation);

    // Every group publishes here; the harness just logs what happens
    let event_bus = EventBus::new();
    event_bus.subscribe(|event| match event {
        GameEvent::SystemMessage { message, .. } => tracing::info!("Broadcast: {}", message),
        GameEvent::EntityDied { entity, killer } => tracing::info!("{:?} killed by {:?}", entity, killer),
        GameEvent::MonsterEnraged { entity } => tracing::info!("{:?} is enraged", entity),
        event => tracing::debug!("Event: {:?}", event),
    });

    let mut engine = WorldEngine::new(&simulation, ai, Arc::new(content), event_bus.clone());
    for spawn in &spawns {
        let locations = engine.spawn_group(spawn);
        tracing::info!("Spawned {} creatures from template {:?}", locations.len(), spawn.template);
    }
    event_bus.dispatch();

    let tick_rate = (*simulation.tick_rate).max(1);
    let dt = 1.0 / tick_rate as f64;
    let duration = *simulation.duration;
    let mut interval = tokio::time::interval(Duration::from_secs_f64(dt));
    tracing::info!("Running {:.1}s of simulation at {} ticks per second", duration, tick_rate);

    let mut last_save = 0.0;
    while engine.now() < duration {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping simulation");
                break;
            }
        }

        let transferred = engine.tick(dt).await;
        if transferred > 0 {
            tracing::debug!("Transferred {} creatures between groups", transferred);
        }
        event_bus.dispatch();

        // Stand-in for the save scheduler
        if engine.now() - last_save >= 1.0 {
            last_save = engine.now();
            let dirty = engine.take_dirty();
            if !dirty.is_empty() {
                tracing::debug!("{} records ready to save", dirty.len());
            }
            engine.publish_metrics();
        }
    }

    engine.publish_metrics();
    tracing::info!(
        "Simulation finished at {:.1}s across {} groups: {:?}",
        engine.now(),
        engine.groups().count(),
        engine.metrics()
    );
    Ok(())
}
