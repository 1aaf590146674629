use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{EnvsealError, EnvsealResult};

/// Top-level configuration (loaded from envseal.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvsealConfig {
    pub log: LogConfig,
    pub crypto: CryptoConfig,
    pub recipient: RecipientConfig,
    /// Warn if a private key file is group- or world-readable (default: true)
    pub key_file_mode_check: bool,
}

impl Default for EnvsealConfig {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            crypto: CryptoConfig::default(),
            recipient: RecipientConfig::default(),
            key_file_mode_check: true,
        }
    }
}

impl EnvsealConfig {
    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> EnvsealResult<Self> {
        match Self::load_if_present(path)? {
            Some(config) => Ok(config),
            None => {
                tracing::warn!("config file not found: {}  (using defaults)", path.display());
                Ok(Self::default())
            }
        }
    }

    /// Load from `path`; `None` when the file does not exist.
    ///
    /// For callers that report the missing file themselves, e.g. once logging is up.
    pub fn load_if_present(path: &Path) -> EnvsealResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map(Some)
            .map_err(|e| EnvsealError::Config(format!("parsing {}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// `$XDG_CONFIG_HOME/envseal/config.toml`, else `~/.config/envseal/config.toml`
    pub fn default_path() -> PathBuf {
        std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("envseal")
            .join("config.toml")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level or EnvFilter directive (default: info; RUST_LOG wins)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Envelope encryption settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// RSA modulus size for `envseal keygen` (default: 2048)
    pub rsa_bits: usize,
    /// Permit envelopes that carry their raw key (default: false)
    pub allow_raw_key: bool,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            rsa_bits: 2048,
            allow_raw_key: false,
        }
    }
}

/// Default recipient key files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipientConfig {
    /// Public key PEM used by `seal` when --recipient is absent
    pub public_key: Option<PathBuf>,
    /// PKCS#8 private key PEM used by `open` when --identity is absent
    pub private_key: Option<PathBuf>,
}
