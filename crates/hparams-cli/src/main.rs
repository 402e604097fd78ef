//! `hparams` - query hyperparameter tuning sessions from a snapshot file.
//!
//! ## Commands
//!
//! - `groups`: list session groups for a request file
//! - `metric-evals`: print one session's metric time series
//! - `infer`: print the experiment info inferred from the sessions

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::Level;

use hparams_cli::{experiment_name, read_json_file, FileSessionSource, SnapshotFile};
use hparams_core::{
    infer_experiment_info, CancellationToken, EngineConfig, ListMetricEvalsRequest,
    ListSessionGroupsRequest, MetricName, QueryEngine, SessionGroupService, METRICS,
};

#[derive(Parser)]
#[command(name = "hparams")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Hyperparameter tuning session-group queries", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List session groups matching a request
    Groups {
        /// Snapshot file (JSON)
        #[arg(short, long)]
        snapshot: PathBuf,

        /// ListSessionGroupsRequest file (JSON)
        #[arg(short, long)]
        request: PathBuf,

        /// Abort the query after this many milliseconds
        #[arg(long)]
        deadline_ms: Option<u64>,
    },

    /// Print the metric time series of one session
    MetricEvals {
        /// Snapshot file (JSON)
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Session name
        #[arg(long)]
        session: String,

        /// Metric tag
        #[arg(long)]
        tag: String,

        /// Metric group
        #[arg(long, default_value = "")]
        group: String,
    },

    /// Print experiment info inferred from the sessions
    Infer {
        /// Snapshot file (JSON)
        #[arg(short, long)]
        snapshot: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    hparams_core::init_tracing(cli.json, level);

    let result = match cli.command {
        Commands::Groups {
            snapshot,
            request,
            deadline_ms,
        } => cmd_groups(snapshot, &request, deadline_ms).await,
        Commands::MetricEvals {
            snapshot,
            session,
            tag,
            group,
        } => cmd_metric_evals(snapshot, session, MetricName::new(group, tag)).await,
        Commands::Infer { snapshot } => cmd_infer(&snapshot),
    };

    METRICS.flush();
    result
}

fn service(snapshot: PathBuf) -> SessionGroupService {
    let engine = QueryEngine::new(EngineConfig::from_env());
    SessionGroupService::new(
        Arc::new(FileSessionSource::new(snapshot)),
        Arc::new(engine),
    )
}

async fn cmd_groups(snapshot: PathBuf, request: &Path, deadline_ms: Option<u64>) -> Result<()> {
    let request: ListSessionGroupsRequest = read_json_file(request)?;
    let cancel = match deadline_ms {
        Some(ms) => CancellationToken::with_timeout(Duration::from_millis(ms)),
        None => CancellationToken::new(),
    };

    let response = service(snapshot.clone())
        .list_session_groups(request, cancel)
        .await
        .with_context(|| format!("Query against {:?} failed", snapshot))?;
    print_json(&response)
}

async fn cmd_metric_evals(snapshot: PathBuf, session: String, metric_name: MetricName) -> Result<()> {
    let evals = service(snapshot.clone())
        .list_metric_evals(&ListMetricEvalsRequest {
            session_name: session,
            metric_name,
        })
        .await
        .with_context(|| format!("Metric lookup in {:?} failed", snapshot))?;
    print_json(&evals)
}

fn cmd_infer(snapshot: &Path) -> Result<()> {
    let file: SnapshotFile = read_json_file(snapshot)?;
    let name = match &file.experiment {
        Some(experiment) => experiment.name.clone(),
        None => experiment_name(snapshot),
    };
    print_json(&infer_experiment_info(name, &file.sessions))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
