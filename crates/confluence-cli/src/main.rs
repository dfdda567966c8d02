//! confluence CLI
//!
//! Replays recorded scorer outputs through the convergence engine and
//! inspects the learning state it leaves behind.
//!
//! Usage:
//!   confluence run <scenario.json>
//!   confluence matrix
//!   confluence families
//!   confluence config

mod scenario;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use confluence_consensus::{Decision, Engine, EngineConfig};
use confluence_learning::FamilyClusterer;
use confluence_store::{JsonFileStore, Persistence};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scenario::Scenario;

fn print_usage() {
    eprintln!("confluence - Multi-source signal convergence engine");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  confluence run <scenario.json>   Replay a scenario and print each decision");
    eprintln!("  confluence matrix                Print the learned co-activation matrix");
    eprintln!("  confluence families              Print decision families and their maturity");
    eprintln!("  confluence config                Print the effective configuration");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  CONFLUENCE_DATA_DIR  Learning state directory (default: ./confluence-data)");
    eprintln!("  CONFLUENCE_CONFIG    Engine configuration JSON (default: built-in defaults)");
    eprintln!("  RUST_LOG             Log filter (default: confluence=info)");
}

/// Settings taken from the environment.
struct CliConfig {
    data_dir: PathBuf,
    config_path: Option<PathBuf>,
}

impl CliConfig {
    fn from_env() -> Self {
        Self {
            data_dir: std::env::var("CONFLUENCE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./confluence-data")),
            config_path: std::env::var("CONFLUENCE_CONFIG").ok().map(PathBuf::from),
        }
    }

    fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let config = match &self.config_path {
            Some(path) => EngineConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => EngineConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn store(&self) -> anyhow::Result<JsonFileStore> {
        JsonFileStore::open(&self.data_dir)
            .with_context(|| format!("Failed to open data dir {}", self.data_dir.display()))
    }
}

async fn run_scenario(cli: &CliConfig, path: &str) -> anyhow::Result<()> {
    let scenario = Scenario::load(path)?;
    let store: Arc<dyn Persistence> = Arc::new(cli.store()?);
    let engine = Arc::new(Engine::new(cli.engine_config()?, scenario.scorers(), store)?);
    info!(
        inputs = scenario.inputs.len(),
        chained = scenario.chain,
        data_dir = %cli.data_dir.display(),
        "Replaying scenario"
    );

    let decisions: Vec<Decision> = if scenario.chain {
        let mut decisions: Vec<Decision> = Vec::with_capacity(scenario.inputs.len());
        for input in &scenario.inputs {
            let decision = match decisions.last() {
                Some(prior) => engine.converge_chained(input, prior).await?,
                None => engine.converge(input).await?,
            };
            decisions.push(decision);
        }
        decisions
    } else {
        engine
            .converge_batch(scenario.inputs.clone())
            .await
            .into_iter()
            .collect::<Result<_, _>>()?
    };

    for (input, decision) in scenario.inputs.iter().zip(&decisions) {
        let line = json!({ "input": input, "decision": decision });
        println!("{}", serde_json::to_string(&line)?);
    }
    Ok(())
}

fn show_matrix(cli: &CliConfig) -> anyhow::Result<()> {
    let matrix = cli.store()?.load_matrix()?;
    println!("{}", serde_json::to_string_pretty(&matrix)?);
    Ok(())
}

fn show_families(cli: &CliConfig) -> anyhow::Result<()> {
    let config = cli.engine_config()?;
    let clusterer = FamilyClusterer::from_families(
        cli.store()?.load_families()?,
        config.family_thresholds,
        config.ema_alpha_family,
    );

    let families: Vec<_> = clusterer
        .families()
        .map(|f| {
            json!({
                "id": f.id,
                "label": f.label,
                "members": f.member_count,
                "maturity": f.maturity().to_string(),
                "centroid": f.centroid,
            })
        })
        .collect();
    let report = json!({
        "census": clusterer.census(),
        "next_threshold": clusterer.thresholds().threshold_for(clusterer.len()),
        "families": families,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn show_config(cli: &CliConfig) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&cli.engine_config()?)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "confluence=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let cli = CliConfig::from_env();
    let result = match args[1].as_str() {
        "run" => {
            if args.len() < 3 {
                eprintln!("Error: run requires a scenario file argument");
                std::process::exit(1);
            }
            run_scenario(&cli, &args[2]).await
        }
        "matrix" => show_matrix(&cli),
        "families" => show_families(&cli),
        "config" => show_config(&cli),
        "-h" | "--help" | "help" => {
            print_usage();
            std::process::exit(0);
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
