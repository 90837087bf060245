//! ssot: VLAN single-source-of-truth sync
//!
//! Reconciles the VLAN groups and VLANs of the local SQLite store with a
//! Netbox/Nautobot style IPAM API, in either direction.
//!
//! Usage:
//!   ssot --remote-url https://netbox.example.com --remote-token $TOKEN --dry-run
//!   ssot --direction from-remote --include vlan
//!
//! Exit status is 0 for a clean run, 2 when records failed or the run was
//! cancelled, 1 when the run could not start or a snapshot failed to load.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use ssot_model::schemas;
use ssot_storage::vlan as vlan_store;
use ssot_sync::remote::{self, RemoteAdapter, RemoteClient};
use ssot_sync::{
    cancellation, AuthScheme, LocalAdapter, RemoteConfig, RetryConfig, SyncConfig, SyncJob,
    SyncReport,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Direction {
    /// Local store is the source, the remote API the target
    ToRemote,
    /// Remote API is the source, the local store the target
    FromRemote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scheme {
    Bearer,
    Token,
}

impl From<Scheme> for AuthScheme {
    fn from(scheme: Scheme) -> Self {
        match scheme {
            Scheme::Bearer => AuthScheme::Bearer,
            Scheme::Token => AuthScheme::Token,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "ssot")]
#[command(about = "Reconcile VLANs between the local store and a remote IPAM")]
struct Args {
    /// Path to the SQLite store
    #[arg(long, env = "SSOT_DATABASE", default_value = "ssot.db")]
    database: PathBuf,

    /// Remote API base URL
    #[arg(long, env = "SSOT_REMOTE_URL")]
    remote_url: String,

    /// Remote API token
    #[arg(long, env = "SSOT_REMOTE_TOKEN", hide_env_values = true)]
    remote_token: String,

    /// Authorization header scheme
    #[arg(long, env = "SSOT_AUTH_SCHEME", value_enum, default_value_t = Scheme::Token)]
    auth_scheme: Scheme,

    /// Which side is authoritative
    #[arg(long, env = "SSOT_DIRECTION", value_enum, default_value_t = Direction::ToRemote)]
    direction: Direction,

    /// Report changes without applying them
    #[arg(long, env = "SSOT_DRY_RUN")]
    dry_run: bool,

    /// Record type to sync (repeatable); every type when omitted
    #[arg(long = "include", value_name = "TYPE")]
    include: Vec<String>,

    /// Concurrent operations per change bucket
    #[arg(long, env = "SSOT_WORKERS", default_value_t = 4)]
    workers: usize,

    /// Attempts per operation for transient failures
    #[arg(long, env = "SSOT_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,

    /// Skip TLS certificate verification (lab systems only)
    #[arg(long, env = "SSOT_INSECURE")]
    insecure: bool,

    /// Per-request timeout
    #[arg(long, env = "SSOT_HTTP_TIMEOUT_SECS", default_value_t = 60)]
    http_timeout_secs: u64,

    /// Concurrent requests to the remote API
    #[arg(long, env = "SSOT_MAX_IN_FLIGHT", default_value_t = 8)]
    max_in_flight: usize,

    /// Items per page when reading remote collections; server default when omitted
    #[arg(long, env = "SSOT_PAGE_SIZE")]
    page_size: Option<u32>,

    /// Stop issuing new operations after this many seconds
    #[arg(long, env = "SSOT_RUN_TIMEOUT_SECS")]
    run_timeout_secs: Option<u64>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let report = run(&args).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }

    if report.has_failures() || report.cancelled() {
        warn!(
            failures = report.failures().len(),
            cancelled = report.cancelled(),
            "sync incomplete"
        );
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

async fn run(args: &Args) -> Result<SyncReport> {
    let registry = schemas::vlan_registry().context("built-in record types are invalid")?;

    let store = vlan_store::open(&args.database)
        .with_context(|| format!("failed to open store at {}", args.database.display()))?;
    let local = LocalAdapter::new("local", registry.clone(), store)?;

    let client = Arc::new(
        RemoteClient::new(&remote_config(args)).context("invalid remote configuration")?,
    );
    let remote = RemoteAdapter::new("remote", registry.clone(), client, remote::vlan_collections())?;

    let mut config = SyncConfig::default()
        .with_dry_run(args.dry_run)
        .with_workers(args.workers)
        .with_retry(RetryConfig::default().with_max_attempts(args.max_attempts));
    if !args.include.is_empty() {
        config = config.with_include(args.include.iter().cloned());
    }

    let (handle, signal) = cancellation();
    if let Some(secs) = args.run_timeout_secs {
        handle.cancel_after(Duration::from_secs(secs));
    }

    info!(direction = ?args.direction, database = %args.database.display(), "ssot starting");
    let report = match args.direction {
        Direction::ToRemote => {
            SyncJob::new(registry, local, remote, config)
                .with_cancel(signal)
                .execute()
                .await?
        }
        Direction::FromRemote => {
            SyncJob::new(registry, remote, local, config)
                .with_cancel(signal)
                .execute()
                .await?
        }
    };
    Ok(report)
}

fn remote_config(args: &Args) -> RemoteConfig {
    let config = RemoteConfig::new(&args.remote_url, &args.remote_token)
        .with_auth_scheme(args.auth_scheme.into())
        .with_verify_tls(!args.insecure)
        .with_timeout_secs(args.http_timeout_secs)
        .with_max_in_flight(args.max_in_flight);
    match args.page_size {
        Some(size) => config.with_page_size(size),
        None => config,
    }
}
