//! cardiorisk: cardiovascular risk assessment CLI.
//!
//! ## Commands
//!
//! - `assess`: score one clinical record (JSON on stdin or from a file)
//! - `status`: load the artifacts and report what is present
//! - `put` / `list`: seed and inspect a SQLite artifact store
//! - `pack`: build a model archive from a descriptor and JSON weights

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cardiorisk::adapters::archive::pack_model;
use cardiorisk::adapters::sanitize::SanitizingMakeWriter;
use cardiorisk::adapters::SqliteBlobStore;
use cardiorisk::config::{
    ServiceConfig, ENV_ARTIFACT_DB, ENV_ARTIFACT_DIR, ENV_MODEL_KEY, ENV_MODEL_SHA256,
    ENV_PREPROCESSOR_KEY, ENV_PREPROCESSOR_SHA256,
};
use cardiorisk::{Artifacts, CardioriskError, ClinicalRecord, RiskAssessmentService};

#[derive(Parser)]
#[command(name = "cardiorisk")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cardiovascular risk assessment engine", long_about = None)]
struct Cli {
    /// Directory holding the artifacts
    #[arg(long, global = true, env = ENV_ARTIFACT_DIR)]
    artifact_dir: Option<PathBuf>,

    /// SQLite database holding the artifacts
    #[arg(long, global = true, env = ENV_ARTIFACT_DB, conflicts_with = "artifact_dir")]
    artifact_db: Option<PathBuf>,

    /// Blob key of the fitted preprocessor
    #[arg(long, global = true, env = ENV_PREPROCESSOR_KEY)]
    preprocessor_key: Option<String>,

    /// Blob key of the model archive
    #[arg(long, global = true, env = ENV_MODEL_KEY)]
    model_key: Option<String>,

    /// Expected SHA-256 of the preprocessor blob
    #[arg(long, global = true, env = ENV_PREPROCESSOR_SHA256)]
    preprocessor_sha256: Option<String>,

    /// Expected SHA-256 of the model archive
    #[arg(long, global = true, env = ENV_MODEL_SHA256)]
    model_sha256: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assess one clinical record and print the result as JSON
    Assess {
        /// Record file (JSON); reads stdin when omitted
        #[arg(short, long)]
        record: Option<PathBuf>,
    },

    /// Load the artifacts and print their status as JSON
    Status,

    /// Store a blob in a SQLite artifact database
    Put {
        /// Database path
        #[arg(long)]
        db: PathBuf,

        /// Blob key
        key: String,

        /// File to store
        file: PathBuf,
    },

    /// List blobs in a SQLite artifact database
    List {
        /// Database path
        #[arg(long)]
        db: PathBuf,
    },

    /// Build a model archive from an architecture descriptor and JSON weights
    Pack {
        /// Architecture descriptor (JSON)
        #[arg(long)]
        architecture: PathBuf,

        /// Layer weights (JSON, `{"layers": [{"kernel": [...], "bias": [...]}]}`)
        #[arg(long)]
        weights: PathBuf,

        /// Output archive path
        #[arg(short, long)]
        output: PathBuf,
    },
}

impl Cli {
    fn service_config(&self) -> Result<ServiceConfig, CardioriskError> {
        let path = |p: &Option<PathBuf>| p.as_ref().map(|p| p.display().to_string());
        ServiceConfig::from_lookup(|name| match name {
            ENV_ARTIFACT_DIR => path(&self.artifact_dir),
            ENV_ARTIFACT_DB => path(&self.artifact_db),
            ENV_PREPROCESSOR_KEY => self.preprocessor_key.clone(),
            ENV_MODEL_KEY => self.model_key.clone(),
            ENV_PREPROCESSOR_SHA256 => self.preprocessor_sha256.clone(),
            ENV_MODEL_SHA256 => self.model_sha256.clone(),
            _ => None,
        })
    }
}

fn init_logging() -> Result<tracing_appender::non_blocking::WorkerGuard> {
    // stdout carries command output; logs go to stderr unless sent to a file.
    let log_mode = std::env::var("CARDIORISK_LOG_MODE").unwrap_or_else(|_| "stderr".to_string());

    let (writer, guard) = if log_mode == "file" {
        let log_file = std::env::var("CARDIORISK_LOG_FILE")
            .unwrap_or_else(|_| "cardiorisk.log".to_string());

        if let Some(parent) = Path::new(&log_file).parent() {
            // Best-effort: a missing directory surfaces as the open error below.
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .with_context(|| format!("Failed to open log file {log_file}"))?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stderr())
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("CARDIORISK_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(SanitizingMakeWriter::new(writer)),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
            .init();
    }

    Ok(guard)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging()?;

    match &cli.command {
        Commands::Assess { record } => cmd_assess(&cli, record.as_deref()),
        Commands::Status => cmd_status(&cli),
        Commands::Put { db, key, file } => cmd_put(db, key, file),
        Commands::List { db } => cmd_list(db),
        Commands::Pack {
            architecture,
            weights,
            output,
        } => cmd_pack(architecture, weights, output),
    }
}

fn load_service(cli: &Cli) -> Result<RiskAssessmentService> {
    let config = cli.service_config()?;
    let store = config
        .open_store()
        .context("Failed to open artifact store")?;
    let artifacts = Artifacts::load(store.as_ref(), &config.keys);
    Ok(RiskAssessmentService::new(artifacts))
}

fn read_record(path: Option<&Path>) -> Result<ClinicalRecord> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read record from stdin")?;
            buf
        }
    };
    let record: ClinicalRecord =
        serde_json::from_str(&raw).map_err(CardioriskError::Serialization)?;
    record.validate().map_err(CardioriskError::Validation)?;
    Ok(record)
}

fn cmd_assess(cli: &Cli, record: Option<&Path>) -> Result<()> {
    let record = read_record(record)?;
    let service = load_service(cli)?;

    let result = service.assess(&record).map_err(CardioriskError::Assessment)?;
    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

fn cmd_status(cli: &Cli) -> Result<()> {
    let service = load_service(cli)?;
    println!("{}", serde_json::to_string_pretty(service.status())?);
    if !service.is_ready() {
        bail!("Artifacts incomplete");
    }
    Ok(())
}

fn store_blob(db: &Path, key: &str, file: &Path) -> cardiorisk::Result<String> {
    let data = std::fs::read(file)?;
    let store = SqliteBlobStore::new(db)?;
    Ok(store.put(key, &data)?)
}

fn cmd_put(db: &Path, key: &str, file: &Path) -> Result<()> {
    let digest = store_blob(db, key, file)
        .with_context(|| format!("Failed to store {} in {}", file.display(), db.display()))?;
    println!("{digest}  {key}");
    Ok(())
}

fn cmd_list(db: &Path) -> Result<()> {
    let store = SqliteBlobStore::new(db)
        .with_context(|| format!("Failed to open {}", db.display()))?;
    for blob in store.list()? {
        println!("{}  {:>10}  {}  {}", blob.sha256, blob.size, blob.created_at, blob.key);
    }
    Ok(())
}

fn cmd_pack(architecture: &Path, weights: &Path, output: &Path) -> Result<()> {
    let descriptor = std::fs::read(architecture)
        .with_context(|| format!("Failed to read {}", architecture.display()))?;
    let weights_json = std::fs::read(weights)
        .with_context(|| format!("Failed to read {}", weights.display()))?;

    let packed = pack_model(&descriptor, &weights_json).context("Failed to pack model")?;
    std::fs::write(output, &packed.archive)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    tracing::info!(
        "Packed {} parameters into {}",
        packed.parameter_count,
        output.display()
    );
    println!("{}", cardiorisk::domain::digest::sha256_hex(&packed.archive));
    Ok(())
}
