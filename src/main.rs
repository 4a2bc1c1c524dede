//! skirmish - run an encounter file to completion

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use skirmish::combat::{Collaborators, CombatMachine};
use skirmish::output::{LogSink, Orchestrator};
use skirmish::providers::DefaultNpc;
use skirmish::{CombatConfig, Encounter};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Resolve a turn-based encounter with automatic combatants
#[derive(Parser, Debug)]
#[command(name = "skirmish", version, about)]
struct Args {
    /// Encounter TOML file
    encounter: PathBuf,

    /// Engine configuration TOML file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// RNG seed for a reproducible fight
    #[arg(short, long)]
    seed: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "skirmish=info".into());
    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let mut config = CombatConfig::load(args.config.as_deref()).context("loading configuration")?;
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let encounter = Encounter::load(&args.encounter)
        .with_context(|| format!("loading encounter {}", args.encounter.display()))?;
    let (ledger, catalog, surprise) = encounter.into_parts();

    let output = Arc::new(Orchestrator::from_config(&config).with_fallback(Arc::new(LogSink)));
    // Nobody at the keyboard: player characters fight on their own
    let collaborators = Collaborators::new(&config, Arc::new(DefaultNpc), output);

    let mut machine = CombatMachine::start(ledger, catalog, config, collaborators, surprise)?;
    let outcome = machine.run().await?;

    info!("{} after {} rounds", outcome, machine.state().round);
    println!("{}", outcome);
    Ok(())
}
