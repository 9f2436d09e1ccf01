mod config;
mod registry;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use thiserror::Error;
use uuid::Uuid;

use clinicseed_core::mask_secret;
use clinicseed_engine::{
    DEFAULT_BATCH_SIZE, FsFixtures, Orchestrator, OrchestratorError, RunOptions, get_variant,
    variant_names,
};
use clinicseed_report::{ModeParseError, RunMode, print_report};
use clinicseed_store::{PgStore, RestStore, Store, StoreError};

use config::{
    ConfigError, DEFAULT_DATA_DIR, DEFAULT_RUN_DIR, DEFAULT_VARIANT, Settings, StoreEnv, StoreKind,
    load_env_files, resolve_tenants,
};
use registry::{RunInfo, init_run_logging, start_run, write_report};

#[derive(Debug, Error)]
enum CliError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    #[error(transparent)]
    Mode(#[from] ModeParseError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Parser, Debug)]
#[command(name = "clinicseed", version, about = "Seed veterinary clinic tenants with fixture data")]
struct Cli {
    /// Variant to run (see --list-variants).
    #[arg(short = 'v', long)]
    variant: Option<String>,
    /// Tenant to seed; repeat for several.
    #[arg(short = 't', long = "tenant", value_name = "ID")]
    tenant: Vec<String>,
    /// Comma-separated tenants, added after any --tenant.
    #[arg(long, value_name = "IDS")]
    tenants: Option<String>,
    /// Delete the tenants' data before seeding.
    #[arg(long, default_value_t = false)]
    clear: bool,
    /// Validate and plan without writing.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
    /// Log per-record warnings and debug events.
    #[arg(long, default_value_t = false)]
    verbose: bool,
    /// `seed`, or `test` to track created rows for teardown.
    #[arg(long, default_value = "seed")]
    mode: String,
    /// Fixture root.
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Output directory for run artifacts.
    #[arg(long)]
    run_dir: Option<PathBuf>,
    /// Defaults file (clinicseed.toml in the working directory otherwise).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print the available variants and exit.
    #[arg(long, default_value_t = false)]
    list_variants: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.list_variants {
        list_variants();
        return ExitCode::SUCCESS;
    }

    match run_seed(cli).await {
        Ok(0) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            tracing::error!(event = "run_failed", error = %err);
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn list_variants() {
    for name in variant_names() {
        if let Some(variant) = get_variant(name) {
            println!("{:<12} {}", variant.name, variant.description);
        }
    }
}

async fn run_seed(cli: Cli) -> Result<i32, CliError> {
    let settings = Settings::load(cli.config.as_deref())?;
    load_env_files();

    let variant = cli
        .variant
        .clone()
        .or_else(|| settings.variant.clone())
        .unwrap_or_else(|| DEFAULT_VARIANT.to_string());
    if get_variant(&variant).is_none() {
        return Err(OrchestratorError::UnknownVariant {
            name: variant,
            available: variant_names().iter().map(|name| name.to_string()).collect(),
        }
        .into());
    }
    let mode: RunMode = cli.mode.parse()?;
    let tenants = resolve_tenants(&cli.tenant, cli.tenants.as_deref(), &settings);

    let env = StoreEnv::from_env()?;

    let data_dir = cli
        .data_dir
        .clone()
        .or_else(|| settings.data_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    if !data_dir.is_dir() {
        return Err(CliError::InvalidConfig(format!(
            "data directory {} does not exist",
            data_dir.display()
        )));
    }
    let run_dir = cli
        .run_dir
        .clone()
        .or_else(|| settings.run_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RUN_DIR));
    let batch_size = settings.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);

    let run_id = Uuid::new_v4().to_string();
    let info = RunInfo {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        run_dir,
        variant: variant.clone(),
        tenants: tenants.clone(),
        mode,
        dry_run: cli.dry_run,
        clear: cli.clear,
        data_dir: data_dir.clone(),
        batch_size,
        backend: backend_name(env.kind).to_string(),
        endpoint: env.redacted(),
        service_key: mask_secret(&env.service_key),
    };
    let paths = start_run(&info)?;
    init_run_logging(&paths.logs_path, cli.verbose)?;

    tracing::info!(
        event = "run_started",
        run_id = %run_id,
        backend = backend_name(env.kind),
        endpoint = %info.endpoint.redacted,
    );
    let timer = Instant::now();

    let store = open_store(&env, &settings).await?;
    let fixtures = FsFixtures::new(data_dir);
    let options = RunOptions {
        variant,
        tenants,
        mode,
        dry_run: cli.dry_run,
        verbose: cli.verbose,
        clear: cli.clear,
        reference_date: settings.reference_date,
        batch_size,
    };

    let mut orchestrator = Orchestrator::new(store.as_ref(), &fixtures);
    let report = orchestrator.run(&options).await?;

    print_report(&report);
    write_report(&paths, &report)?;
    tracing::info!(event = "report_written", path = %paths.report_path.display());
    tracing::info!(
        event = "run_finished",
        status = if report.is_success() { "success" } else { "failed" },
        duration_ms = timer.elapsed().as_millis() as u64,
    );

    Ok(report.exit_code())
}

fn backend_name(kind: StoreKind) -> &'static str {
    match kind {
        StoreKind::Rest => "rest",
        StoreKind::Postgres => "postgres",
    }
}

async fn open_store(env: &StoreEnv, settings: &Settings) -> Result<Box<dyn Store>, CliError> {
    let store: Box<dyn Store> = match env.kind {
        StoreKind::Rest => Box::new(RestStore::with_timeout(
            &env.url,
            env.service_key.clone(),
            settings.http_timeout(),
        )?),
        StoreKind::Postgres => Box::new(PgStore::connect(&env.url, &env.service_key).await?),
    };
    tracing::info!(event = "store_opened", backend = store.backend());
    Ok(store)
}
