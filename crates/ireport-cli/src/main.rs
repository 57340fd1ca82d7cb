//! iReport CLI - operational interface for the sync engines
//!
//! Runs console sync passes, replays the offline capture queue, and
//! inspects queue state from the terminal.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use thiserror::Error;

use ireport_console::{MirrorService, SyncManager};
use ireport_core::cloud::{CloudBackend, CloudConfig, RestBackend};
use ireport_core::db::IncidentFilter;
use ireport_core::models::{AgencyType, IncidentStatus};
use ireport_core::services::DatabaseService;
use ireport_core::storage::{BlobStorage, RestStorage, DEFAULT_MEDIA_BUCKET};
use ireport_reporter::{NoopObserver, OfflineQueue};

const ENV_MEDIA_BUCKET: &str = "IREPORT_MEDIA_BUCKET";

#[derive(Parser)]
#[command(name = "ireport")]
#[command(about = "Offline-tolerant incident report synchronization")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Optional path to the local database file
    #[arg(long, value_name = "PATH")]
    db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one console sync pass (pull, push, history reconciliation)
    Sync,
    /// Replay the offline capture queue
    Replay {
        /// Reset retry counters on exhausted items before replaying
        #[arg(long)]
        reset_retries: bool,
    },
    /// Show queue and mirror counts
    Status,
    /// List mirrored incidents
    Incidents {
        /// Filter by agency (pnp, bfp, pdrrmo)
        #[arg(long)]
        agency: Option<String>,
        /// Filter by status (pending, assigned, responding, resolved)
        #[arg(long)]
        status: Option<String>,
        /// Number of incidents to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] ireport_core::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Unknown agency: {0}")]
    UnknownAgency(String),
    #[error("Unknown status: {0}")]
    UnknownStatus(String),
    #[error(
        "Cloud is not configured. Set IREPORT_API_URL and IREPORT_API_KEY to enable sync commands."
    )]
    CloudNotConfigured,
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ireport=info".parse().expect("valid directive")),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let db = DatabaseService::open_path(&db_path)?;

    match cli.command {
        Commands::Sync => run_sync(db).await?,
        Commands::Replay { reset_retries } => run_replay(db, reset_retries).await?,
        Commands::Status => run_status(db).await?,
        Commands::Incidents {
            agency,
            status,
            limit,
            json,
        } => run_incidents(db, agency.as_deref(), status.as_deref(), limit, json).await?,
    }

    Ok(())
}

async fn run_sync(db: DatabaseService) -> Result<(), CliError> {
    let backend = cloud_backend()?;
    let manager = Arc::new(SyncManager::new(db, backend));

    manager.sync_now().await?;
    let status = manager.status();
    println!(
        "Sync complete. pending: {}, dead-letter: {}",
        status.pending, status.dead_letter
    );
    Ok(())
}

async fn run_replay(db: DatabaseService, reset_retries: bool) -> Result<(), CliError> {
    let backend = cloud_backend()?;
    let storage = blob_storage()?;
    let queue = OfflineQueue::new(db, backend, storage);

    if reset_retries {
        let reset = queue.reset_retries().await?;
        if reset > 0 {
            println!("Reset retry counters on {reset} exhausted submission(s)");
        }
    }

    match queue.replay_all(&NoopObserver).await? {
        Some(report) => println!(
            "Replay complete. successful: {}, failed: {}",
            report.successful, report.failed
        ),
        None => println!("Replay already running"),
    }

    let exhausted = queue.exhausted().await?;
    if !exhausted.is_empty() {
        println!(
            "{} submission(s) exhausted retries; run with --reset-retries to try again",
            exhausted.len()
        );
    }
    Ok(())
}

async fn run_status(db: DatabaseService) -> Result<(), CliError> {
    let mirror = MirrorService::new(db.clone());
    let stats = mirror.stats().await?;
    let pending_changes = mirror.pending_changes().await?;

    let guard = db.lock().await;
    let offline = {
        use ireport_core::db::{OfflineQueueRepository, SqliteOfflineQueueRepository};
        let repo = SqliteOfflineQueueRepository::new(guard.connection());
        (repo.count()?, repo.exhausted()?.len())
    };
    let dead_letter = {
        use ireport_core::db::{OutboundChangeRepository, SqliteOutboundChangeRepository};
        SqliteOutboundChangeRepository::new(guard.connection()).dead_letter_count()?
    };
    drop(guard);

    println!("Mirror:        {} incident(s)", stats.total);
    println!(
        "               pending {}, assigned {}, responding {}, resolved {}",
        stats.pending, stats.assigned, stats.responding, stats.resolved
    );
    println!("Push queue:    {pending_changes} change(s), {dead_letter} dead-lettered");
    println!(
        "Offline queue: {} submission(s), {} exhausted",
        offline.0, offline.1
    );
    Ok(())
}

async fn run_incidents(
    db: DatabaseService,
    agency: Option<&str>,
    status: Option<&str>,
    limit: usize,
    json: bool,
) -> Result<(), CliError> {
    let filter = IncidentFilter {
        agency: agency
            .map(|value| {
                AgencyType::from_str(value).map_err(|_| CliError::UnknownAgency(value.to_string()))
            })
            .transpose()?,
        status: status
            .map(|value| {
                IncidentStatus::from_str(value)
                    .map_err(|_| CliError::UnknownStatus(value.to_string()))
            })
            .transpose()?,
        limit: Some(limit),
    };

    let incidents = MirrorService::new(db).incidents(&filter).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&incidents)?);
        return Ok(());
    }

    if incidents.is_empty() {
        println!("No incidents");
        return Ok(());
    }
    for incident in incidents {
        let marker = if incident.synced { ' ' } else { '*' };
        println!(
            "{marker} {}  {:10} {:8} {}",
            incident.id, incident.status, incident.agency_type, incident.address
        );
    }
    Ok(())
}

fn cloud_backend() -> Result<Arc<dyn CloudBackend>, CliError> {
    let config = CloudConfig::from_env()?.ok_or(CliError::CloudNotConfigured)?;
    Ok(Arc::new(RestBackend::new(config)?))
}

fn blob_storage() -> Result<Arc<dyn BlobStorage>, CliError> {
    let config = CloudConfig::from_env()?.ok_or(CliError::CloudNotConfigured)?;
    let bucket = std::env::var(ENV_MEDIA_BUCKET).unwrap_or_else(|_| DEFAULT_MEDIA_BUCKET.to_string());
    Ok(Arc::new(RestStorage::new(
        config.base_url,
        bucket,
        config.api_key,
    )?))
}

fn resolve_db_path(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ireport")
        .join("ireport.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_db_path_prefers_explicit() {
        let explicit = PathBuf::from("/tmp/custom.db");
        assert_eq!(resolve_db_path(Some(explicit.clone())), explicit);
    }

    #[test]
    fn test_resolve_db_path_defaults_under_data_dir() {
        let path = resolve_db_path(None);
        assert!(path.ends_with("ireport/ireport.db"));
    }
}
