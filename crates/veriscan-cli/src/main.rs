//! VeriScan CLI
//!
//! Offline tools over recorded model responses:
//!
//! - `reconcile` - run a recorded response through the full pipeline
//! - `sanitize` - strip JSON debris from text
//! - `extract` - pull the structured object out of raw model text
//!
//! Every command reads stdin when no file is given.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use veriscan_core::{extract, sanitize, GroundingMetadata, ModelOutput};
use veriscan_runtime::{AnalysisOrchestrator, AnalysisRequest, ReplayModel, RuntimeConfig};

/// VeriScan - grounded fact-check reconciliation
#[derive(Parser, Debug)]
#[command(name = "veriscan")]
#[command(about = "Reconcile grounded model output into a citable fact-check result", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile a recorded model response
    Reconcile {
        /// Raw model text
        #[arg(long)]
        raw: Option<PathBuf>,

        /// Grounding metadata as recorded from the search tool (JSON)
        #[arg(long)]
        grounding: Option<PathBuf>,

        /// Runtime configuration (YAML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Pretty-print the result
        #[arg(long)]
        pretty: bool,
    },

    /// Strip JSON debris from text
    Sanitize {
        file: Option<PathBuf>,
    },

    /// Extract the structured object from raw model text
    Extract {
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Reconcile {
            raw,
            grounding,
            config,
            pretty,
        } => reconcile(raw.as_deref(), grounding.as_deref(), config.as_deref(), pretty).await,
        Commands::Sanitize { file } => {
            let text = read_input(file.as_deref())?;
            println!("{}", sanitize(&text));
            Ok(())
        }
        Commands::Extract { file } => {
            let text = read_input(file.as_deref())?;
            let structured = extract(&text).context("Extraction failed")?;
            println!("{}", serde_json::to_string_pretty(&structured)?);
            Ok(())
        }
    }
}

async fn reconcile(
    raw: Option<&Path>,
    grounding: Option<&Path>,
    config: Option<&Path>,
    pretty: bool,
) -> Result<()> {
    let config = match config {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RuntimeConfig::default(),
    };

    let text = read_input(raw)?;
    let grounding: GroundingMetadata = match grounding {
        Some(path) => {
            let body = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&body)
                .with_context(|| format!("Invalid grounding metadata in {}", path.display()))?
        }
        None => GroundingMetadata::default(),
    };
    debug!(
        chunks = grounding.chunks().len(),
        supports = grounding.supports().len(),
        "Loaded recorded response"
    );

    let model = ReplayModel::new(ModelOutput::text(text).with_grounding(grounding));
    let orchestrator = AnalysisOrchestrator::builder()
        .model(Arc::new(model))
        .config(config)
        .build()
        .context("Failed to build orchestrator")?;

    let request_id = raw
        .and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "stdin".to_string());
    let result = orchestrator
        .analyze(&AnalysisRequest::new(request_id, Vec::new()))
        .await;

    let rendered = if pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{}", rendered);
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}
