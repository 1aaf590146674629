//! envseal: client-side envelope encryption CLI
//!
//! Commands:
//!   keygen                       - generate a recipient RSA key pair (PEM)
//!   seal <input>                 - encrypt a file into <out> + <out>.json
//!   open <blob>                  - decrypt an envelope back to plaintext
//!   config show                  - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::info;

use envseal_core::EnvsealConfig;
use envseal_crypto::{
    generate_keypair, CiphertextEnvelope, EnvelopeBuilder, KeyForm, KeyProtection, OsEntropy,
    PlaintextFile, RecipientPrivateKey,
};

/// Extension appended to sealed blobs when --out is not given.
const SEALED_EXT: &str = "envseal";

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "envseal",
    version,
    about = "Client-side envelope encryption",
    long_about = "envseal: encrypt files under a fresh AES-256-GCM key and wrap that key for a recipient's RSA public key"
)]
struct Cli {
    /// Path to envseal.toml configuration file
    #[arg(long, short = 'c', env = "ENVSEAL_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides config
    #[arg(long, env = "ENVSEAL_LOG")]
    log: Option<String>,

    /// Log format; overrides config
    #[arg(long, env = "ENVSEAL_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a recipient RSA key pair
    ///
    /// Writes <name>.pub.pem (SPKI) and <name>.key.pem (PKCS#8, mode 0600).
    Keygen {
        /// Modulus size in bits (default: crypto.rsa_bits from config)
        #[arg(long)]
        bits: Option<usize>,
        /// Output directory
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// Base file name
        #[arg(long, default_value = "recipient")]
        name: String,
    },

    /// Encrypt a file into an envelope
    Seal {
        /// File to encrypt
        input: PathBuf,
        /// Recipient public key PEM (default: recipient.public_key from config)
        #[arg(long, short = 'r', conflicts_with = "raw_key")]
        recipient: Option<PathBuf>,
        /// Store the raw symmetric key in the envelope instead of wrapping it.
        /// Anyone holding the header can decrypt. Requires crypto.allow_raw_key.
        #[arg(long)]
        raw_key: bool,
        /// Identifier to carry in the envelope header
        #[arg(long)]
        cid: Option<String>,
        /// Blob output path (default: <input>.envseal); the header goes to <out>.json
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
        /// Overwrite existing output files
        #[arg(long)]
        force: bool,
    },

    /// Decrypt an envelope
    Open {
        /// Cipher blob produced by `seal`
        blob: PathBuf,
        /// Envelope header JSON (default: <blob>.json)
        #[arg(long)]
        header: Option<PathBuf>,
        /// Recipient private key PEM (default: recipient.private_key from config)
        #[arg(long, short = 'i')]
        identity: Option<PathBuf>,
        /// Plaintext output path (default: <blob> without .envseal)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
        /// Overwrite an existing output file
        #[arg(long)]
        force: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
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
    let config_path = cli.config.clone().unwrap_or_else(EnvsealConfig::default_path);
    let loaded = EnvsealConfig::load_if_present(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;
    let config_found = loaded.is_some();
    let config = loaded.unwrap_or_default();

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = match cli.log_format {
        Some(format) => format,
        None => LogFormat::from_str(&config.log.format, true)
            .map_err(|e| anyhow::anyhow!("config log.format: {e}"))?,
    };
    init_logging(&level, format);
    if !config_found {
        tracing::warn!(
            "config file not found: {}  (using defaults)",
            config_path.display()
        );
    }

    match cli.command {
        Commands::Keygen { bits, out_dir, name } => {
            cmd_keygen(&config, bits, &out_dir, &name).await
        }
        Commands::Seal { input, recipient, raw_key, cid, out, force } => {
            cmd_seal(&config, &input, recipient.as_deref(), raw_key, cid, out.as_deref(), force)
                .await
        }
        Commands::Open { blob, header, identity, out, force } => {
            cmd_open(&config, &blob, header.as_deref(), identity.as_deref(), out.as_deref(), force)
                .await
        }
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &config_path),
    }
}

fn init_logging(level: &str, format: LogFormat) {
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

// ── `envseal keygen` ──────────────────────────────────────────────────────────

async fn cmd_keygen(
    config: &EnvsealConfig,
    bits: Option<usize>,
    out_dir: &Path,
    name: &str,
) -> Result<()> {
    let bits = bits.unwrap_or(config.crypto.rsa_bits);
    let public_path = out_dir.join(format!("{name}.pub.pem"));
    let private_path = out_dir.join(format!("{name}.key.pem"));

    for path in [&public_path, &private_path] {
        if path.exists() {
            anyhow::bail!("refusing to overwrite existing key file: {}", path.display());
        }
    }

    info!(bits, "generating RSA key pair");
    let pair = tokio::task::spawn_blocking(move || generate_keypair(&OsEntropy, bits))
        .await
        .context("key generation task panicked")??;

    let public_pem = pair.public.to_pem()?;
    let private_pem = pair.private.to_pem()?;

    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("creating {}", out_dir.display()))?;
    write_private_file(&private_path, private_pem.as_bytes()).await?;
    tokio::fs::write(&public_path, public_pem.as_bytes())
        .await
        .with_context(|| format!("writing {}", public_path.display()))?;

    println!("public key:  {}", public_path.display());
    println!("private key: {}", private_path.display());
    Ok(())
}

/// Create `path` readable by the owner only.
async fn write_private_file(path: &Path, contents: &[u8]) -> Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options
        .open(path)
        .await
        .with_context(|| format!("creating {}", path.display()))?;
    file.write_all(contents)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    file.flush().await?;
    Ok(())
}

// ── `envseal seal` ────────────────────────────────────────────────────────────

async fn cmd_seal(
    config: &EnvsealConfig,
    input: &Path,
    recipient: Option<&Path>,
    raw_key: bool,
    cid: Option<String>,
    out: Option<&Path>,
    force: bool,
) -> Result<()> {
    let recipient_pem = if raw_key {
        if !config.crypto.allow_raw_key {
            anyhow::bail!(
                "--raw-key stores the decryption key in the envelope header\n\
                 Set crypto.allow_raw_key = true in the config file to permit it."
            );
        }
        None
    } else {
        let path = recipient
            .map(Path::to_path_buf)
            .or_else(|| config.recipient.public_key.clone())
            .context(
                "no recipient public key\n\
                 Pass --recipient <PEM>, set recipient.public_key in the config, or use --raw-key.",
            )?;
        let pem = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading recipient key: {}", path.display()))?;
        Some(pem)
    };

    let blob_path = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_sealed_path(input));
    let header_path = header_path_for(&blob_path);
    if !force {
        for path in [&blob_path, &header_path] {
            if path.exists() {
                anyhow::bail!("{} exists (use --force to overwrite)", path.display());
            }
        }
    }

    let file = read_plaintext(input).await?;
    let size = file.len();

    let envelope = tokio::task::spawn_blocking(move || {
        let protection = match recipient_pem.as_deref() {
            Some(pem) => KeyProtection::Recipient(pem),
            None => KeyProtection::ReturnRawKey,
        };
        EnvelopeBuilder::new().build_envelope(file, cid, protection)
    })
    .await
    .context("seal task panicked")??;

    let header_json = envelope.header_json()?;
    match envelope.key_form() {
        KeyForm::Wrapped => tokio::fs::write(&header_path, header_json.as_bytes())
            .await
            .with_context(|| format!("writing {}", header_path.display()))?,
        // The header holds the key itself
        KeyForm::Raw => write_private_file_replacing(&header_path, header_json.as_bytes()).await?,
    }
    // Never leave a header without its blob
    if let Err(e) = tokio::fs::write(&blob_path, &envelope.cipher_blob).await {
        let _ = tokio::fs::remove_file(&header_path).await;
        return Err(e).with_context(|| format!("writing {}", blob_path.display()));
    }

    info!(
        input = %input.display(),
        bytes = size,
        key_form = ?envelope.key_form(),
        blob = %blob_path.display(),
        header = %header_path.display(),
        "sealed"
    );
    Ok(())
}

async fn write_private_file_replacing(path: &Path, contents: &[u8]) -> Result<()> {
    if path.exists() {
        tokio::fs::remove_file(path)
            .await
            .with_context(|| format!("removing {}", path.display()))?;
    }
    write_private_file(path, contents).await
}

async fn read_plaintext(path: &Path) -> Result<PlaintextFile> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(PlaintextFile::from_bytes(data))
}

// ── `envseal open` ────────────────────────────────────────────────────────────

async fn cmd_open(
    config: &EnvsealConfig,
    blob_path: &Path,
    header: Option<&Path>,
    identity: Option<&Path>,
    out: Option<&Path>,
    force: bool,
) -> Result<()> {
    let header_path = header
        .map(Path::to_path_buf)
        .unwrap_or_else(|| header_path_for(blob_path));
    let out_path = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_opened_path(blob_path));
    if out_path.exists() && !force {
        anyhow::bail!("{} exists (use --force to overwrite)", out_path.display());
    }

    let header_json = tokio::fs::read_to_string(&header_path)
        .await
        .with_context(|| format!("reading header: {}", header_path.display()))?;
    let blob = tokio::fs::read(blob_path)
        .await
        .with_context(|| format!("reading {}", blob_path.display()))?;
    let envelope = CiphertextEnvelope::from_header_json(&header_json, blob)
        .with_context(|| format!("parsing header: {}", header_path.display()))?;

    let private = match envelope.key_form() {
        KeyForm::Raw => None,
        KeyForm::Wrapped => {
            let path = identity
                .map(Path::to_path_buf)
                .or_else(|| config.recipient.private_key.clone())
                .context(
                    "envelope key is wrapped; pass --identity <PEM> or set recipient.private_key",
                )?;
            Some(load_private_key(config, &path).await?)
        }
    };

    let plaintext = tokio::task::spawn_blocking(move || {
        EnvelopeBuilder::new().open_envelope(&envelope, private.as_ref())
    })
    .await
    .context("open task panicked")??;
    let plaintext = zeroize::Zeroizing::new(plaintext);

    tokio::fs::write(&out_path, plaintext.as_slice())
        .await
        .with_context(|| format!("writing {}", out_path.display()))?;

    info!(
        blob = %blob_path.display(),
        bytes = plaintext.len(),
        out = %out_path.display(),
        "opened"
    );
    Ok(())
}

async fn load_private_key(config: &EnvsealConfig, path: &Path) -> Result<RecipientPrivateKey> {
    if config.key_file_mode_check {
        warn_if_exposed(path).await;
    }
    let pem = zeroize::Zeroizing::new(
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading private key: {}", path.display()))?,
    );
    RecipientPrivateKey::from_pem(&pem)
        .with_context(|| format!("parsing private key: {}", path.display()))
}

#[cfg(unix)]
async fn warn_if_exposed(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(meta) = tokio::fs::metadata(path).await {
        let mode = meta.permissions().mode();
        if mode & 0o077 != 0 {
            tracing::warn!(
                path = %path.display(),
                mode = format!("{:o}", mode & 0o777),
                "private key file is readable by other users"
            );
        }
    }
}

#[cfg(not(unix))]
async fn warn_if_exposed(_path: &Path) {}

// ── `envseal config show` ─────────────────────────────────────────────────────

fn cmd_config_show(config: &EnvsealConfig, config_path: &Path) -> Result<()> {
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

// ── Path helpers ──────────────────────────────────────────────────────────────

/// `report.pdf` → `report.pdf.envseal`
fn default_sealed_path(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_os_string();
    name.push(".");
    name.push(SEALED_EXT);
    PathBuf::from(name)
}

/// `report.pdf.envseal` → `report.pdf.envseal.json`
fn header_path_for(blob: &Path) -> PathBuf {
    let mut name = blob.as_os_str().to_os_string();
    name.push(".json");
    PathBuf::from(name)
}

/// `report.pdf.envseal` → `report.pdf`; anything else gets `.out` appended.
fn default_opened_path(blob: &Path) -> PathBuf {
    if blob.extension().is_some_and(|ext| ext == SEALED_EXT) {
        blob.with_extension("")
    } else {
        let mut name = blob.as_os_str().to_os_string();
        name.push(".out");
        PathBuf::from(name)
    }
}
