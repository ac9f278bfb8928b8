use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use acsi_uploader::archive::DEFAULT_SUFFIX;
use acsi_uploader::audit::{self, ArchiveCheck, DEFAULT_REQUIRED_FIELDS};
use acsi_uploader::cli_style::{self, get_styles};
use acsi_uploader::config::{self, StoreBackend};
use acsi_uploader::{open_store, ArchiveExtractor, DocumentStore};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(styles = get_styles(), version, about = "Check uploaded call records against the store and the source archive")]
struct CliArgs {
    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: AuditCommand,
}

#[derive(Args, Debug)]
struct StoreArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, global = true, value_parser = parse_path)]
    config: Option<PathBuf>,

    /// Document store backend.
    #[clap(long = "store", global = true, value_enum)]
    store_backend: Option<StoreBackend>,

    /// Path to the SQLite database file, for the sqlite store.
    #[clap(long, global = true, value_parser = parse_path)]
    sqlite_path: Option<PathBuf>,

    /// Service account key file, for the firestore store.
    #[clap(long, global = true, value_parser = parse_path)]
    credentials: Option<PathBuf>,

    /// Firestore project id.
    #[clap(long, global = true)]
    project_id: Option<String>,

    /// Firestore emulator host.
    #[clap(long, global = true)]
    endpoint: Option<String>,

    /// Collection to inspect.
    #[clap(long, global = true)]
    collection: Option<String>,
}

#[derive(Subcommand, Debug)]
enum AuditCommand {
    /// Shows the number of documents in the collection.
    Count,

    /// Lists documents whose call_date is missing or null.
    MissingDates {
        /// Show at most this many documents.
        #[clap(long)]
        limit: Option<usize>,
    },

    /// Lists archive files that have no document in the collection.
    MissingFiles {
        #[clap(value_parser = parse_path)]
        archive: PathBuf,
    },

    /// Checks that every file in the archive decodes as a call analysis.
    CheckJson {
        #[clap(value_parser = parse_path)]
        archive: PathBuf,
    },

    /// Checks that every file in the archive has the given top level fields.
    CheckFields {
        #[clap(value_parser = parse_path)]
        archive: PathBuf,

        /// Required top level field, can be repeated. Defaults to metadata and emotion_graph.
        #[clap(long = "field")]
        fields: Vec<String>,
    },
}

impl From<&StoreArgs> for config::CliConfig {
    fn from(args: &StoreArgs) -> Self {
        config::CliConfig {
            collection: args.collection.clone(),
            store_backend: args.store_backend,
            sqlite_path: args.sqlite_path.clone(),
            credentials_path: args.credentials.clone(),
            project_id: args.project_id.clone(),
            endpoint: args.endpoint.clone(),
            ..Default::default()
        }
    }
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    match run(cli_args) {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(2),
        Err(e) => {
            cli_style::print_error(&format!("{:#}", e));
            std::process::exit(1);
        }
    }
}

/// Returns false when a check found problems.
fn run(cli_args: CliArgs) -> Result<bool> {
    let file_config = match &cli_args.store.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };
    let suffix = file_config
        .as_ref()
        .and_then(|f| f.suffix.clone())
        .unwrap_or_else(|| DEFAULT_SUFFIX.to_string());
    let extractor = ArchiveExtractor::new(suffix);

    match cli_args.command {
        AuditCommand::Count => {
            let (store, collection) = open_collection(&cli_args.store, file_config)?;
            let count = audit::count_documents(&*store, &collection)?;
            print_store_header("Document count", &*store, &collection);
            cli_style::print_key_value("Documents", &count.to_string());
            cli_style::print_section_footer();
            Ok(true)
        }
        AuditCommand::MissingDates { limit } => {
            let (store, collection) = open_collection(&cli_args.store, file_config)?;
            let missing = audit::documents_missing_date(&*store, &collection, limit)?;
            print_store_header("Documents without call_date", &*store, &collection);
            if missing.is_empty() {
                cli_style::print_empty_list("every document has a call_date");
            }
            for doc in &missing {
                let raw = doc.date_raw.as_deref().unwrap_or("<none>");
                cli_style::print_list_item(&format!("{} (date_raw: {})", doc.id, raw));
            }
            cli_style::print_section_footer();
            Ok(missing.is_empty())
        }
        AuditCommand::MissingFiles { archive } => {
            let (store, collection) = open_collection(&cli_args.store, file_config)?;
            let missing =
                audit::files_missing_from_store(&*store, &collection, &extractor, &archive)?;
            print_store_header("Archive files missing from the store", &*store, &collection);
            if missing.is_empty() {
                cli_style::print_empty_list("every file has a document");
            }
            for entry in &missing {
                cli_style::print_list_item(&format!("{}: {}", entry.entry, entry.problem));
            }
            cli_style::print_section_footer();
            Ok(missing.is_empty())
        }
        AuditCommand::CheckJson { archive } => {
            let check = audit::check_json(&extractor, &archive)?;
            Ok(print_archive_check("JSON check", &check))
        }
        AuditCommand::CheckFields { archive, fields } => {
            let check = if fields.is_empty() {
                audit::check_fields(&extractor, &archive, &DEFAULT_REQUIRED_FIELDS[..])?
            } else {
                audit::check_fields(&extractor, &archive, fields.as_slice())?
            };
            Ok(print_archive_check("Required fields check", &check))
        }
    }
}

/// Resolve the store settings and open the store. Only the commands that
/// read the store need a fully configured backend.
fn open_collection(
    args: &StoreArgs,
    file_config: Option<config::FileConfig>,
) -> Result<(Box<dyn DocumentStore>, String)> {
    let cli_config: config::CliConfig = args.into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;
    let store = open_store(&app_config.store).context("Could not open the document store")?;
    Ok((store, app_config.collection))
}

fn print_store_header(title: &str, store: &dyn DocumentStore, collection: &str) {
    cli_style::print_section_header(title);
    cli_style::print_key_value("Store", &format!("{} / {}", store.describe(), collection));
}

fn print_archive_check(title: &str, check: &ArchiveCheck) -> bool {
    cli_style::print_section_header(title);
    cli_style::print_key_value("Files checked", &check.checked.to_string());
    cli_style::print_key_value("Problems", &check.problems.len().to_string());
    for problem in &check.problems {
        cli_style::print_list_item(&format!("{}: {}", problem.entry, problem.problem));
    }
    cli_style::print_section_footer();
    if check.is_clean() {
        cli_style::print_success("All files passed");
    }
    check.is_clean()
}
