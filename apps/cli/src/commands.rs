//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use modulsync_core::{
    ProgressReporter, RunResult, UpdateOutcome, UpdateSummary, load_dataset, update_report,
};
use modulsync_extractor::{ExtractSummary, extract_to_file};
use modulsync_fetcher::Fetcher;
use modulsync_shared::{
    AppConfig, FetchIndex, INDEX_FILE_NAME, init_config, load_config, load_config_from,
};
use modulsync_validator::{Check, Rating, ValidationReport};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// modulsync: sync the IT module catalog into a versioned dataset.
#[derive(Parser)]
#[command(
    name = "modulsync",
    version,
    about = "Fetch, extract, validate and diff the IT module catalog.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file to use instead of ~/.modulsync/modulsync.toml.
    #[arg(long, env = "MODULSYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Overrides for the `[fetch]` section.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct FetchArgs {
    /// Number of concurrent downloads.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Catalog base URL.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Keep documents already on disk and only fetch the missing ones.
    #[arg(long)]
    pub resume: bool,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Download every module page listed in the catalog.
    Fetch {
        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Parse the downloaded pages into the master dataset.
    Extract,

    /// Check the master dataset for completeness and write the validation report.
    Validate,

    /// Compare the master dataset with the last backup and write the update report.
    Report,

    /// Run fetch, extract, validate and report in one go.
    Run {
        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "modulsync=info",
        1 => "modulsync=debug",
        _ => "modulsync=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(resolve_config(&cli)?),
        };
    }

    let mut config = resolve_config(&cli)?;
    match cli.command {
        Command::Fetch { fetch } => {
            apply_fetch_args(&mut config, fetch)?;
            cmd_fetch(&config).await
        }
        Command::Extract => cmd_extract(&config),
        Command::Validate => cmd_validate(&config),
        Command::Report => cmd_report(&config),
        Command::Run { fetch } => {
            apply_fetch_args(&mut config, fetch)?;
            cmd_run(&config).await
        }
        Command::Config { .. } => Ok(()),
    }
}

fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

fn apply_fetch_args(config: &mut AppConfig, args: FetchArgs) -> Result<()> {
    if let Some(workers) = args.workers {
        config.fetch.workers = workers;
    }
    if let Some(base_url) = args.base_url {
        config.fetch.base_url = base_url;
    }
    if args.resume {
        config.fetch.skip_existing = true;
    }
    config.fetch.validate()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_fetch(config: &AppConfig) -> Result<()> {
    info!(base_url = %config.fetch.base_url, "fetching catalog");

    let spinner = spinner();
    spinner.set_message("Listing catalog");
    let fetcher = Fetcher::new(config.fetch.clone())?;
    let refs = fetcher.fetch_catalog().await?;

    spinner.set_message(format!("Fetching {} module pages", refs.len()));
    let index = fetcher.fetch_all(&refs, &config.paths.raw_dir).await?;
    spinner.finish_and_clear();

    print_fetch(&index);
    let index_path = config.paths.raw_dir.join(INDEX_FILE_NAME);
    println!("  Index:     {}", index_path.display());
    println!();
    Ok(())
}

fn cmd_extract(config: &AppConfig) -> Result<()> {
    let paths = &config.paths;
    let (_, summary) =
        extract_to_file(&paths.raw_dir, &paths.dataset_path, &config.fetch.base_url)?;

    print_extract(&summary);
    println!("  Dataset:   {}", paths.dataset_path.display());
    println!();
    Ok(())
}

fn cmd_validate(config: &AppConfig) -> Result<()> {
    let paths = &config.paths;
    let dataset = load_dataset(&paths.dataset_path)?;
    let report = modulsync_validator::write_report(&dataset, &paths.validation_report)?;

    print_validation(&report);
    println!("  Report:    {}", paths.validation_report.display());
    println!();
    Ok(())
}

fn cmd_report(config: &AppConfig) -> Result<()> {
    let outcome = update_report(&config.paths)?;
    print_update(&outcome);
    Ok(())
}

async fn cmd_run(config: &AppConfig) -> Result<()> {
    info!(base_url = %config.fetch.base_url, "running full sync");

    let reporter = CliProgress::new();
    let result = modulsync_core::run(config, &reporter).await?;

    print_fetch(&result.index);
    print_extract(&result.extract);
    print_validation(&result.validation);
    print_update(&result.update);
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    println!();
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_fetch(index: &FetchIndex) {
    let s = index.summary;
    println!();
    println!("  Fetch finished");
    println!("  Stored:    {}", s.succeeded);
    println!("  Skipped:   {}", s.skipped);
    println!("  Failed:    {}", s.failed);
    for failure in &index.errors {
        println!("    - {}-V{}: {}", failure.nummer, failure.version, failure.reason);
    }
    println!("  Time:      {:.1}s", s.elapsed_ms as f64 / 1000.0);
}

fn print_extract(summary: &ExtractSummary) {
    println!();
    println!("  Extraction finished");
    println!("  Documents: {}", summary.documents);
    println!("  Parsed:    {}", summary.parsed);
    println!("  Errors:    {}", summary.failures.len());
    for failure in &summary.failures {
        let key = failure.key.as_deref().unwrap_or(&failure.source);
        println!("    - {key}: {}", failure.reason);
    }
    if !summary.stale.is_empty() {
        println!("  Stale:     {}", summary.stale.len());
        for entry in &summary.stale {
            let key = entry.key.as_deref().unwrap_or(&entry.source);
            println!("    - {key}: {}", entry.reason);
        }
    }
}

fn print_validation(report: &ValidationReport) {
    let rating = match report.rating() {
        Rating::SehrGut => "SEHR GUT",
        Rating::Gut => "GUT",
        Rating::Verbesserungswuerdig => "VERBESSERUNGSWÜRDIG",
    };
    println!();
    println!("  Validation finished");
    println!(
        "  Complete:  {}/{} ({:.1}%) {rating}",
        report.complete_versions,
        report.total_versions,
        report.completeness_percent()
    );
    for check in Check::ALL {
        let failing = report.failing(check).len();
        if failing > 0 {
            println!("    - {check:?}: {failing} missing");
        }
    }
    for (name, stored, live) in &report.meta_mismatches {
        println!("    - meta {name}: stored {stored}, actual {live}");
    }
}

fn print_update(outcome: &UpdateOutcome) {
    println!();
    match outcome {
        UpdateOutcome::FirstVersion { run_date, backup } => {
            println!("  No earlier backup, stored first version ({run_date})");
            println!("  Backup:    {}", backup.display());
        }
        UpdateOutcome::Updated(UpdateSummary {
            run_date,
            previous_date,
            report_path,
            backup,
            backup_written,
            diff,
            ..
        }) => {
            println!("  Update report {previous_date} → {run_date}");
            if diff.is_unchanged() {
                println!("  No changes");
            } else {
                println!("  Added:     {}", diff.added.len());
                println!("  Changed:   {}", diff.changed.len());
                println!("  Removed:   {}", diff.removed.len());
            }
            println!("  New Berufe: {}", diff.new_berufe.len());
            println!("  Report:    {}", report_path.display());
            if *backup_written {
                println!("  Backup:    {}", backup.display());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

fn spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(
            style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
    }
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        Self { spinner: spinner() }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn catalog_listed(&self, modules: usize) {
        self.spinner.set_message(format!("Fetching {modules} module pages"));
    }

    fn fetched(&self, index: &FetchIndex) {
        self.spinner.println(format!(
            "  fetched {} pages ({} skipped, {} failed)",
            index.summary.succeeded, index.summary.skipped, index.summary.failed
        ));
    }

    fn extracted(&self, summary: &ExtractSummary) {
        self.spinner.println(format!(
            "  parsed {} versions from {} documents",
            summary.parsed, summary.documents
        ));
    }

    fn validated(&self, report: &ValidationReport) {
        self.spinner.println(format!(
            "  dataset {:.1}% complete",
            report.completeness_percent()
        ));
    }

    fn done(&self, _result: &RunResult) {
        self.spinner.finish_and_clear();
    }
}
