use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use kestrel_runner::{LoggingConsumer, ServerRunner, init_logging};
use kestrel_scripting_host::MemoryActor;
use kestrel_world::config::{ConfigLoadError, KestrelConfig};
use kestrel_world::{EntityId, Position};
use tracing::{info, warn};

mod sandbox;

use sandbox::{Sentry, Villager};

#[derive(Parser)]
#[command(version, about = "Run a small kestrel sandbox world", long_about = None)]
pub struct Cli {
    /// Log every request and notice on the event bus
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    /// How long to run before shutting down
    #[arg(short, long, default_value = "20")]
    seconds: u64,

    /// Fixed seed for all behavior randomness (overrides the config file)
    #[arg(long)]
    seed: Option<u64>,

    /// Number of villagers to spawn
    #[arg(short, long, default_value = "3")]
    villagers: u32,
}

fn load_or_create_config() -> Result<KestrelConfig, Box<dyn Error>> {
    match KestrelConfig::load() {
        Ok(config) => Ok(config),
        Err(ConfigLoadError::NotFound) => {
            let config = KestrelConfig::default();
            config.save()?;
            eprintln!(
                "Config file created at: {}",
                KestrelConfig::config_path()?.display()
            );
            Ok(config)
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let mut config = load_or_create_config()?;
    if let Some(seed) = cli.seed {
        config.scheduler.seed = seed;
    }

    let _guard = init_logging("sandbox", config.logging.file)?;
    info!("Starting kestrel sandbox for {}s", cli.seconds);

    let server = ServerRunner::builder()
        .with_config(config)
        .with_consumer(LoggingConsumer::from_factory(cli.debug > 0))
        .with_npc(sandbox::innkeeper())
        .with_hook("innkeeper", "greet", sandbox::greet)
        .build()?;

    let mut actors = Vec::new();
    for i in 0..cli.villagers {
        let offset = i32::try_from(i).unwrap_or(i32::MAX).saturating_mul(400);
        let actor = Arc::new(MemoryActor::new(100 + u64::from(i), Position::new(offset, 0)));
        server
            .behaviors()
            .register(actor.clone(), Box::new(Villager))
            .activate();
        actors.push(actor);
    }

    let sentry = Arc::new(MemoryActor::new(200, Position::new(0, 800)));
    server
        .behaviors()
        .register(sentry.clone(), Box::new(Sentry { patience_ms: 8000 }))
        .activate();
    actors.push(sentry);

    // Stand-in for the world layer moving actors towards their destinations
    let walker = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(100));
        loop {
            interval.tick().await;
            for actor in &actors {
                actor.walk(40.0);
            }
        }
    });

    let player = server.spawn_connection(EntityId(1000), Position::new(0, 100), 0);
    let player_task = tokio::spawn(sandbox::scripted_player(player));

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(cli.seconds)) => {}
        _ = tokio::signal::ctrl_c() => warn!("Interrupted"),
    }

    info!(
        "{} of {} behaviors still active",
        server.behaviors().active_count(),
        server.behaviors().len()
    );

    walker.abort();
    player_task.abort();
    server.shutdown().await;
    Ok(())
}
