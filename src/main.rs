use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mars_colony::{
    engine::{ColonyControls, Engine, LaunchContext},
    scenario::{Scenario, ScenarioLoader},
    transport::FileSaveStore,
    web::{self, WebServerConfig},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Mars colony simulation runner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Advance a colony headlessly and print a summary
    Run(RunArgs),
    /// Serve the colony over HTTP with a live event stream
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
struct SessionArgs {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/mars.yaml")]
    scenario: PathBuf,

    /// Directory holding per-colony saves
    #[arg(long, default_value = "saves")]
    save_dir: PathBuf,

    /// Ignore any existing save and generate a new map
    #[arg(long)]
    new_game: bool,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[command(flatten)]
    session: SessionArgs,

    /// Simulated seconds to advance
    #[arg(long, default_value_t = 120.0)]
    seconds: f64,

    /// Seconds per tick
    #[arg(long, default_value_t = 1.0)]
    step: f64,

    /// Explore one frontier cell every N ticks (0 disables)
    #[arg(long, default_value_t = 0)]
    explore_every: u64,
}

#[derive(Debug, Args)]
struct ServeArgs {
    #[command(flatten)]
    session: SessionArgs,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Milliseconds between host ticks
    #[arg(long, default_value_t = 250)]
    tick_ms: u64,
}

fn load_scenario(path: &Path) -> Result<Scenario> {
    ScenarioLoader::new(".").load(path)
}

fn launch(scenario: &Scenario, store: &FileSaveStore, new_game: bool) -> Result<Engine> {
    let save_record = if new_game {
        None
    } else {
        store
            .read(&scenario.name)
            .with_context(|| format!("Failed to load save for '{}'", scenario.name))?
    };
    let engine = scenario.engine_builder()?.build(LaunchContext {
        new_game,
        save_record,
    })?;
    Ok(engine)
}

fn flush_save(engine: &mut Engine, store: &FileSaveStore) {
    let Some(record) = engine.take_pending_save() else {
        return;
    };
    let outcome = store.write(engine.colony_name(), &record);
    if let Err(err) = &outcome {
        warn!(error = %err, "save write failed");
    }
    engine.complete_save(outcome.is_ok());
}

fn run(args: RunArgs) -> Result<()> {
    let scenario = load_scenario(&args.session.scenario)?;
    let store = FileSaveStore::new(&args.session.save_dir);
    let mut engine = launch(&scenario, &store, args.session.new_game)?;

    let step = if args.step > 0.0 { args.step } else { 1.0 };
    let ticks = (args.seconds.max(0.0) / step).ceil() as u64;
    let mut explored = 0u64;
    for _ in 0..ticks {
        let report = engine.advance(step)?;
        if args.explore_every > 0 && report.tick % args.explore_every == 0 && engine.can_explore() {
            if let Some(target) = engine.frontier().into_iter().next() {
                engine.explore(target)?;
                explored += 1;
            }
        }
        engine.drain_changes();
        flush_save(&mut engine, &store);
    }

    engine.request_save();
    flush_save(&mut engine, &store);

    info!(ticks, explored, "run finished");
    println!(
        "Colony '{}' advanced {:.1}s over {} ticks. Tiles: {}, explored: {}, explore cost: {}",
        scenario.name,
        ticks as f64 * step,
        ticks,
        engine.colony().grid.len(),
        explored,
        engine.explore_cost()
    );
    for (resource, amount) in engine.resource_amounts() {
        let capacity = engine.colony().ledger.capacity(resource);
        let rate = engine.colony().ledger.rate(resource);
        let name = resource.name();
        println!("  {name:<10} {amount:>5} / {capacity:<5} (+{rate})");
    }
    println!("Saved to {}", store.path_for(&scenario.name).display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => tokio::task::block_in_place(|| run(args)),
        Command::Serve(args) => {
            let scenario = load_scenario(&args.session.scenario)?;
            web::run(WebServerConfig {
                scenario,
                save_dir: args.session.save_dir,
                new_game: args.session.new_game,
                tick_interval: Duration::from_millis(args.tick_ms.max(1)),
                host: args.host,
                port: args.port,
            })
            .await
        }
    }
}
