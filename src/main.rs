use anyhow::{Context, Result};
use clap::Parser;
use indicatif::ProgressBar;
use std::path::PathBuf;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use acsi_uploader::cli_style::{self, get_styles};
use acsi_uploader::config::{self, StoreBackend};
use acsi_uploader::pipeline::ProgressEvent;
use acsi_uploader::{open_store, BatchDriver, BatchReport, FileOutcome, SkipKind, ValidationMode};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(styles = get_styles(), version, about = "Upload call analysis archives to the document store")]
struct CliArgs {
    /// Zip archive of per-call analysis JSON files. Can also be specified in config file.
    #[clap(value_parser = parse_path)]
    pub archive: Option<PathBuf>,

    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Document store backend.
    #[clap(long = "store", value_enum)]
    pub store_backend: Option<StoreBackend>,

    /// Path to the SQLite database file, for the sqlite store.
    #[clap(long, value_parser = parse_path)]
    pub sqlite_path: Option<PathBuf>,

    /// Service account key file, for the firestore store.
    #[clap(long, value_parser = parse_path)]
    pub credentials: Option<PathBuf>,

    /// Firestore project id. Defaults to the one in the service account key.
    #[clap(long)]
    pub project_id: Option<String>,

    /// Firestore emulator host, e.g. localhost:8080.
    #[clap(long)]
    pub endpoint: Option<String>,

    /// Collection the records are written to.
    #[clap(long)]
    pub collection: Option<String>,

    /// Where to write the list of skipped files.
    #[clap(long, value_parser = parse_path)]
    pub skip_log: Option<PathBuf>,

    /// Directory under which the archive is extracted. Defaults to the system temp dir.
    #[clap(long, value_parser = parse_path)]
    pub scratch_dir: Option<PathBuf>,

    /// Store every decodable record, filling missing fields with defaults.
    #[clap(long)]
    pub no_validate: bool,

    /// Run the whole pipeline without writing to the store.
    #[clap(long)]
    pub dry_run: bool,

    /// Do not draw a progress bar.
    #[clap(long, short)]
    pub quiet: bool,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            archive_path: args.archive.clone(),
            collection: args.collection.clone(),
            skip_log_path: args.skip_log.clone(),
            scratch_dir: args.scratch_dir.clone(),
            validation: args.no_validate.then_some(ValidationMode::Lenient),
            dry_run: args.dry_run,
            store_backend: args.store_backend,
            sqlite_path: args.sqlite_path.clone(),
            credentials_path: args.credentials.clone(),
            project_id: args.project_id.clone(),
            endpoint: args.endpoint.clone(),
        }
    }
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    if let Err(e) = run(&cli_args) {
        cli_style::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}

fn run(cli_args: &CliArgs) -> Result<()> {
    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = cli_args.into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;
    let archive = app_config.require_archive()?.to_path_buf();

    info!("Configuration loaded:");
    info!("  archive: {:?}", archive);
    info!("  store: {:?}", app_config.store.backend);
    info!("  collection: {}", app_config.collection);
    info!("  validation: {:?}", app_config.validation);
    if app_config.dry_run {
        info!("  dry run: nothing will be written");
    }

    let store = open_store(&app_config.store).context("Could not open the document store")?;
    let driver = BatchDriver::from_config(&app_config, &*store);

    let mut progress: Option<ProgressBar> = None;
    let report = driver
        .run_with_progress(&archive, |event| match event {
            ProgressEvent::Discovered(total) => {
                progress = Some(cli_style::file_progress_bar(total, cli_args.quiet));
            }
            ProgressEvent::Processed(outcome) => {
                if let Some(pb) = &progress {
                    if let FileOutcome::Skipped(entry) = outcome {
                        pb.set_message(format!("skipped {}", entry.filename));
                    }
                    pb.inc(1);
                }
            }
        })
        .with_context(|| format!("Upload of {:?} failed", archive))?;
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    print_summary(&report, &store.describe(), &app_config.collection);
    Ok(())
}

fn print_summary(report: &BatchReport, store: &str, collection: &str) {
    cli_style::print_section_header("Upload summary");
    cli_style::print_key_value("Store", &format!("{} / {}", store, collection));
    cli_style::print_key_value("Files found", &report.discovered.to_string());
    let uploaded_label = if report.dry_run {
        "Would upload"
    } else {
        "Uploaded"
    };
    cli_style::print_key_value(uploaded_label, &report.uploaded.to_string());
    cli_style::print_key_value("Skipped", &report.skipped.len().to_string());
    for kind in [SkipKind::Decode, SkipKind::Rejected, SkipKind::Store] {
        let count = report.skipped_count(kind);
        if count > 0 {
            cli_style::print_list_item(&format!("{}: {}", kind, count));
        }
    }
    cli_style::print_section_footer();

    match &report.skip_log {
        Some(path) => cli_style::print_warning(&format!(
            "{} files skipped, see {}",
            report.skipped.len(),
            path.display()
        )),
        None if report.skipped.is_empty() => cli_style::print_success("No files skipped"),
        None => {}
    }
}
