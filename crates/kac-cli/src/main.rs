//! kac: key-aggregate class encryption CLI
//!
//! Issuer commands:
//!   setup                  - bootstrap system parameters
//!   issue <device> <cls>.. - derive and write a device aggregate key
//!
//! Device commands:
//!   encrypt <file> <class> - seal, upload, write audit report + sidecar
//!   decrypt <name|sidecar> - gate, fetch, authorize, decrypt, verify
//!   tags enroll|remove|list
//!   config show
//!   status

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use kac_core::config::{KacConfig, StorageBackend};
use kac_crypto::params::PARAMS_FILE;
use kac_crypto::{ClassSet, Issuer, KeyAggregateEngine, SystemParameters};
use kac_device::{
    Attestor, ConsoleGate, EnvironmentSensor, ExportViewer, NoSensor, SnapshotFileSensor,
    SoftwareAttestor, TagAllowList,
};
use kac_pipeline::{DecryptPipeline, EncryptPipeline};
use kac_storage::{open_store, BlobStore, S3Credentials};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "kac",
    version,
    about = "Key-aggregate class encryption",
    long_about = "kac: encrypt files under access classes and decrypt them on devices whose aggregate key grants the class"
)]
struct Cli {
    /// Path to kac.toml configuration file
    #[arg(long, short = 'c', env = "KAC_CONFIG", default_value = "/etc/kac/config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides [logging].level
    #[arg(long, env = "KAC_LOG")]
    log: Option<String>,

    /// Log format; overrides [logging].format
    #[arg(long, env = "KAC_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate system parameters (system id + master secret)
    Setup {
        /// Keys directory (overrides [issuer].keys_dir)
        #[arg(long)]
        keys_dir: Option<PathBuf>,
        /// Supported classes, comma-separated (overrides [issuer].supported_classes)
        #[arg(long, value_delimiter = ',')]
        classes: Option<Vec<String>>,
        /// Overwrite existing parameters; previously issued keys stop working
        #[arg(long)]
        force: bool,
    },

    /// Issue an aggregate key for a device
    Issue {
        /// Device name; the key is written to <keys_dir>/<device>_agg.json
        device: String,
        /// Classes the key grants
        #[arg(required = true)]
        classes: Vec<String>,
        /// Keys directory (overrides [issuer].keys_dir)
        #[arg(long)]
        keys_dir: Option<PathBuf>,
    },

    /// Encrypt a file under a class and upload it
    ///
    /// S3 credentials are read from AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY.
    Encrypt {
        /// Local file
        path: PathBuf,
        /// Access class
        class: String,
    },

    /// Fetch and decrypt an object after presenting a token
    ///
    /// TARGET is an object name, or a `<file>.sha256` sidecar whose digest
    /// is verified against the recovered plaintext.
    Decrypt {
        target: String,
    },

    /// Token allow-list management
    Tags {
        #[command(subcommand)]
        action: TagsAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show device key, storage, and collaborator status
    Status,
}

#[derive(Subcommand, Debug)]
enum TagsAction {
    /// Bind a token UID to a principal name
    Enroll {
        /// Token UID (prompted for when omitted)
        #[arg(long)]
        uid: Option<String>,
        /// Principal name (prompted for when omitted)
        #[arg(long)]
        name: Option<String>,
        /// Replace an existing binding
        #[arg(long)]
        force: bool,
    },
    /// Remove a token UID
    Remove { uid: String },
    /// List enrolled tokens
    List,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = KacConfig::load(&cli.config)?;

    let level = cli.log.clone().unwrap_or_else(|| config.logging.level.clone());
    let format = cli
        .log_format
        .clone()
        .or_else(|| LogFormat::from_str(&config.logging.format, true).ok())
        .unwrap_or(LogFormat::Text);
    init_logging(&level, &format);

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "kac starting"
    );

    match cli.command {
        Commands::Setup { keys_dir, classes, force } => {
            cmd_setup(&config, keys_dir.as_deref(), classes, force)
        }
        Commands::Issue { device, classes, keys_dir } => {
            cmd_issue(&config, &device, classes, keys_dir.as_deref())
        }
        Commands::Encrypt { path, class } => cmd_encrypt(&config, &path, &class).await,
        Commands::Decrypt { target } => cmd_decrypt(&config, &target).await,
        Commands::Tags { action } => cmd_tags(&config, action),
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &cli.config),
        Commands::Status => cmd_status(&config).await,
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr; stdout carries command output
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Component wiring ──────────────────────────────────────────────────────────

fn open_storage(config: &KacConfig) -> Result<Arc<dyn BlobStore>> {
    let credentials = match config.storage.backend {
        StorageBackend::S3 => Some(S3Credentials::from_env()?),
        _ => None,
    };
    open_store(&config.storage, credentials.as_ref()).context("opening storage")
}

fn load_engine(config: &KacConfig) -> Result<Arc<KeyAggregateEngine>> {
    let engine = KeyAggregateEngine::load(&config.device.aggregate_key)?;
    if let Some(name) = &config.device.name {
        if name != engine.device_name() {
            tracing::warn!(
                configured = %name,
                key = %engine.device_name(),
                "device name in config differs from the aggregate key"
            );
        }
    }
    Ok(Arc::new(engine))
}

fn sensor(config: &KacConfig) -> Arc<dyn EnvironmentSensor> {
    match &config.sensor.snapshot_file {
        Some(path) => Arc::new(SnapshotFileSensor::new(path)),
        None => Arc::new(NoSensor),
    }
}

/// A configured but unusable attestation key means fetches go out unsigned.
fn attestor(config: &KacConfig) -> Option<Arc<dyn Attestor>> {
    if !config.attestation.enabled {
        return None;
    }
    let Some(path) = &config.attestation.key_file else {
        tracing::warn!("attestation enabled without key_file; fetches will be unsigned");
        return None;
    };
    match SoftwareAttestor::load(path) {
        Ok(a) => Some(Arc::new(a)),
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "attestation key unavailable; fetches will be unsigned");
            None
        }
    }
}

fn keys_dir(config: &KacConfig, override_dir: Option<&Path>) -> PathBuf {
    override_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.issuer.keys_dir.clone())
}

fn make_spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

// ── `kac setup` ───────────────────────────────────────────────────────────────

fn cmd_setup(
    config: &KacConfig,
    keys_dir_override: Option<&Path>,
    classes: Option<Vec<String>>,
    force: bool,
) -> Result<()> {
    let dir = keys_dir(config, keys_dir_override);
    let path = dir.join(PARAMS_FILE);
    if path.exists() && !force {
        anyhow::bail!(
            "system parameters already exist at {} (use --force to overwrite; issued keys will stop working)",
            path.display()
        );
    }

    let classes = ClassSet::new(classes.unwrap_or_else(|| config.issuer.supported_classes.clone()))
        .context("invalid class list")?;
    if classes.is_empty() {
        anyhow::bail!("at least one supported class is required");
    }

    let params = SystemParameters::generate(classes);
    params.save(&path)?;

    println!("System parameters written to {}", path.display());
    println!("  system id: {}", params.system_id.to_hex());
    println!("  classes:   {}", params.supported_classes);
    Ok(())
}

// ── `kac issue` ───────────────────────────────────────────────────────────────

fn cmd_issue(
    config: &KacConfig,
    device: &str,
    classes: Vec<String>,
    keys_dir_override: Option<&Path>,
) -> Result<()> {
    let dir = keys_dir(config, keys_dir_override);
    let issuer = Issuer::from_keys_dir(&dir)?;
    let classes = ClassSet::new(classes).context("invalid class list")?;
    let (key, path) = issuer.issue_to_dir(device, &classes, &dir)?;

    println!("Issued aggregate key for '{}'", key.device_name);
    println!("  classes: {}", key.classes);
    println!("  file:    {}", path.display());
    println!("Install it on the device at [device].aggregate_key.");
    Ok(())
}

// ── `kac encrypt` ─────────────────────────────────────────────────────────────

async fn cmd_encrypt(config: &KacConfig, path: &Path, class: &str) -> Result<()> {
    let engine = load_engine(config)?;
    let store = open_storage(config)?;
    let pipeline = EncryptPipeline::new(engine, store)
        .with_sensor(sensor(config))
        .with_output(&config.output.report_dir, &config.output.sidecar_dir);

    let pb = make_spinner("encrypt");
    pb.set_message(format!("{} [{class}]", path.display()));
    let result = pipeline.encrypt(path, class).await;
    pb.finish_and_clear();
    let receipt = result.with_context(|| format!("encrypting {}", path.display()))?;

    println!("Encrypted {} as '{}'", path.display(), receipt.object_name);
    println!("  class:   {}", receipt.header.class);
    println!("  bytes:   {}", fmt_bytes(receipt.report.size_bytes));
    println!("  sha256:  {}", receipt.report.plaintext_sha256);
    println!("  report:  {}", receipt.report_path.display());
    println!("  sidecar: {}", receipt.sidecar_path.display());
    Ok(())
}

// ── `kac decrypt` ─────────────────────────────────────────────────────────────

async fn cmd_decrypt(config: &KacConfig, target: &str) -> Result<()> {
    let engine = load_engine(config)?;
    let store = open_storage(config)?;
    let sensor = sensor(config);
    let status = sensor
        .sample()
        .map(|snapshot| snapshot.status_lines())
        .unwrap_or_default();

    let gate = ConsoleGate::new(&config.gate.allowlist).with_status(status);
    let viewer = ExportViewer::new(
        &config.output.export_dir,
        config.output.viewer_columns,
        config.output.viewer_page_lines,
    );
    let mut pipeline = DecryptPipeline::new(Arc::new(gate), store, engine)
        .with_gate_timeout(Duration::from_secs(config.gate.timeout_secs))
        .with_viewer(Arc::new(viewer))
        .with_output_dir(&config.output.plaintext_dir);
    if let Some(attestor) = attestor(config) {
        pipeline = pipeline.with_attestor(attestor, config.attestation.challenge.as_bytes());
    }

    match pipeline.decrypt(target).await {
        Ok(done) => {
            println!("Decrypted '{}' for {}", done.object_name, done.principal);
            println!("  class:   {}", done.class);
            println!("  bytes:   {}", fmt_bytes(done.size_bytes));
            println!("  sha256:  {}", done.plaintext_sha256);
            if done.sidecar_verified {
                println!("  sidecar: verified");
            }
            println!("  output:  {}", done.output_path.display());
            Ok(())
        }
        Err(e) => {
            eprintln!("decryption failed: {e}");
            // Already reported; skip the error print from main.
            std::process::exit(1);
        }
    }
}

// ── `kac tags` ────────────────────────────────────────────────────────────────

fn cmd_tags(config: &KacConfig, action: TagsAction) -> Result<()> {
    let path = &config.gate.allowlist;
    let mut tags = TagAllowList::load(path)?;

    match action {
        TagsAction::Enroll { uid, name, force } => {
            let uid = match uid {
                Some(uid) => uid,
                None => prompt("Tap the card to enroll (or type its UID): ")?,
            };
            let name = match name {
                Some(name) => name,
                None => prompt("Name for this card: ")?,
            };
            if name.trim().is_empty() {
                anyhow::bail!("principal name must not be empty");
            }
            tags.enroll(&uid, name.trim(), force)?;
            tags.save(path)?;
            println!("Enrolled {} as '{}' ({} tags)", uid.trim(), name.trim(), tags.len());
        }
        TagsAction::Remove { uid } => {
            if !tags.remove(&uid) {
                anyhow::bail!("tag {} is not enrolled", uid.trim());
            }
            tags.save(path)?;
            println!("Removed {} ({} tags left)", uid.trim(), tags.len());
        }
        TagsAction::List => {
            if tags.is_empty() {
                println!("No tags enrolled in {}", path.display());
            }
            for (uid, name) in tags.iter() {
                println!("{uid:<20} {name}");
            }
        }
    }
    Ok(())
}

fn prompt(message: &str) -> Result<String> {
    eprint!("{message}");
    std::io::stderr().flush().ok();
    let mut line = String::new();
    let read = std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading stdin")?;
    if read == 0 || line.trim().is_empty() {
        anyhow::bail!("no input");
    }
    Ok(line.trim().to_string())
}

// ── `kac config show` ─────────────────────────────────────────────────────────

fn cmd_config_show(config: &KacConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

// ── `kac status` ──────────────────────────────────────────────────────────────

async fn cmd_status(config: &KacConfig) -> Result<()> {
    println!("kac v{}", env!("CARGO_PKG_VERSION"));

    match KeyAggregateEngine::load(&config.device.aggregate_key) {
        Ok(engine) => {
            let key = engine.aggregate_key();
            println!("  device:      {}", key.device_name);
            println!("  classes:     {}", key.classes);
            println!("  system id:   {}", key.system_id.to_hex());
        }
        Err(e) => println!("  device:      NO KEY ({e})"),
    }

    match open_storage(config) {
        Ok(store) => {
            let pb = make_spinner("probe");
            pb.set_message(store.endpoint());
            let probe = store.probe().await;
            pb.finish_and_clear();
            match probe {
                Ok(()) => println!("  storage:     {} [ok]", store.endpoint()),
                Err(e) => println!("  storage:     {} [UNREACHABLE: {e}]", store.endpoint()),
            }
        }
        Err(e) => println!("  storage:     NOT CONFIGURED ({e:#})"),
    }

    match TagAllowList::load(&config.gate.allowlist) {
        Ok(tags) => println!(
            "  tags:        {} enrolled ({})",
            tags.len(),
            config.gate.allowlist.display()
        ),
        Err(e) => println!("  tags:        UNREADABLE ({e:#})"),
    }

    let attestation = match (config.attestation.enabled, attestor(config)) {
        (false, _) => "disabled",
        (true, Some(_)) => "enabled",
        (true, None) => "enabled, key unavailable",
    };
    println!("  attestation: {attestation}");

    match sensor(config).sample() {
        Some(snapshot) => println!("  environment: {}", snapshot.status_lines().join("  ")),
        None => println!("  environment: no reading"),
    }
    Ok(())
}

// ── Utilities ─────────────────────────────────────────────────────────────────

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
