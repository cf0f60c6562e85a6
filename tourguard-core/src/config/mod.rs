//! Configuration management for TourGuard
//!
//! Defaults, TOML files and `TOURGUARD_<SECTION>_<KEY>` environment overrides.

use crate::logging::LogLevel;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Smallest Argon2 memory cost accepted outside of tests (8 MiB)
pub const MIN_KDF_MEMORY_KIB: u32 = 8 * 1024;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crypto: CryptoConfig,
    pub ledger: LedgerConfig,
    pub content: ContentConfig,
    pub keystore: KeystoreConfig,
    pub credential: CredentialConfig,
    pub logging: LoggingConfig,
}

/// Fixed Argon2id cost parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    pub kdf_memory_kib: u32,
    pub kdf_iterations: u32,
    pub kdf_parallelism: u32,
}

/// Ledger namespace and write policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// DID method segment (`did:<method>:...`)
    pub did_method: String,

    /// Network segment (`did:<method>:<network>:...`)
    pub network: String,

    /// Confirmations to wait for before a write is treated as durable
    pub required_confirmations: u64,

    /// Retries for retryable write failures
    pub max_retries: u32,

    /// Initial backoff, doubled per attempt
    #[serde(with = "humantime_serde")]
    pub retry_backoff: Duration,

    #[serde(with = "humantime_serde")]
    pub confirmation_timeout: Duration,
}

/// Where blobs and keystore entries live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    File,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "file" => Ok(StorageBackend::File),
            other => Err(ConfigError::InvalidValue(format!("Unknown storage backend: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub backend: StorageBackend,
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeystoreConfig {
    pub backend: StorageBackend,
    pub path: PathBuf,
}

/// Credential issuance/verification policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    /// Tolerance for issuance dates in the future and expiry in the past
    #[serde(with = "humantime_serde")]
    pub clock_skew: Duration,

    /// Validity applied when the issuer does not give an expiration date
    #[serde(with = "humantime_serde")]
    pub default_validity: Option<Duration>,

    /// Revocation list new credentials are allocated in
    pub revocation_list_id: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include target module
    pub with_target: bool,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            kdf_memory_kib: 19 * 1024,
            kdf_iterations: 2,
            kdf_parallelism: 1,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            did_method: "tourguard".to_string(),
            network: "testnet".to_string(),
            required_confirmations: 1,
            max_retries: 3,
            retry_backoff: Duration::from_millis(200),
            confirmation_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            data_dir: PathBuf::from("./data/content"),
        }
    }
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            path: PathBuf::from("./data/keystore"),
        }
    }
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            clock_skew: Duration::from_secs(5 * 60),
            default_validity: None,
            revocation_list_id: "default".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_target: true,
        }
    }
}

fn parse_var<T>(key: &str, what: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(format!("Invalid {}: {}", what, e))),
        Err(_) => Ok(None),
    }
}

fn parse_duration_var(key: &str, what: &str) -> Result<Option<Duration>, ConfigError> {
    match env::var(key) {
        Ok(raw) => humantime_serde::re::humantime::parse_duration(&raw)
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(format!("Invalid {}: {}", what, e))),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: TOURGUARD_<SECTION>_<KEY>
    /// Example: TOURGUARD_LEDGER_NETWORK=mainnet
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Crypto config
        if let Some(v) = parse_var("TOURGUARD_CRYPTO_KDF_MEMORY_KIB", "KDF memory")? {
            config.crypto.kdf_memory_kib = v;
        }
        if let Some(v) = parse_var("TOURGUARD_CRYPTO_KDF_ITERATIONS", "KDF iterations")? {
            config.crypto.kdf_iterations = v;
        }
        if let Some(v) = parse_var("TOURGUARD_CRYPTO_KDF_PARALLELISM", "KDF parallelism")? {
            config.crypto.kdf_parallelism = v;
        }

        // Ledger config
        if let Ok(method) = env::var("TOURGUARD_LEDGER_DID_METHOD") {
            config.ledger.did_method = method;
        }
        if let Ok(network) = env::var("TOURGUARD_LEDGER_NETWORK") {
            config.ledger.network = network;
        }
        if let Some(v) = parse_var("TOURGUARD_LEDGER_REQUIRED_CONFIRMATIONS", "required confirmations")? {
            config.ledger.required_confirmations = v;
        }
        if let Some(v) = parse_var("TOURGUARD_LEDGER_MAX_RETRIES", "max retries")? {
            config.ledger.max_retries = v;
        }
        if let Some(v) = parse_duration_var("TOURGUARD_LEDGER_RETRY_BACKOFF", "retry backoff")? {
            config.ledger.retry_backoff = v;
        }
        if let Some(v) = parse_duration_var("TOURGUARD_LEDGER_CONFIRMATION_TIMEOUT", "confirmation timeout")? {
            config.ledger.confirmation_timeout = v;
        }

        // Content / keystore config
        if let Some(v) = parse_var("TOURGUARD_CONTENT_BACKEND", "content backend")? {
            config.content.backend = v;
        }
        if let Ok(dir) = env::var("TOURGUARD_CONTENT_DATA_DIR") {
            config.content.data_dir = PathBuf::from(dir);
        }
        if let Some(v) = parse_var("TOURGUARD_KEYSTORE_BACKEND", "keystore backend")? {
            config.keystore.backend = v;
        }
        if let Ok(path) = env::var("TOURGUARD_KEYSTORE_PATH") {
            config.keystore.path = PathBuf::from(path);
        }

        // Credential config
        if let Some(v) = parse_duration_var("TOURGUARD_CREDENTIAL_CLOCK_SKEW", "clock skew")? {
            config.credential.clock_skew = v;
        }
        if let Some(v) = parse_duration_var("TOURGUARD_CREDENTIAL_DEFAULT_VALIDITY", "default validity")? {
            config.credential.default_validity = Some(v);
        }
        if let Ok(list) = env::var("TOURGUARD_CREDENTIAL_REVOCATION_LIST_ID") {
            config.credential.revocation_list_id = list;
        }

        // Logging config
        if let Ok(level) = env::var("TOURGUARD_LOGGING_LEVEL") {
            config.logging.level = level;
        }
        if let Some(v) = parse_var("TOURGUARD_LOGGING_JSON_FORMAT", "JSON flag")? {
            config.logging.json_format = v;
        }
        if let Some(v) = parse_var("TOURGUARD_LOGGING_WITH_TARGET", "target flag")? {
            config.logging.with_target = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError(e.to_string()))?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.crypto.kdf_memory_kib < MIN_KDF_MEMORY_KIB {
            return Err(ConfigError::ValidationFailed(format!(
                "kdf_memory_kib must be at least {}",
                MIN_KDF_MEMORY_KIB
            )));
        }
        if self.crypto.kdf_iterations == 0 || self.crypto.kdf_parallelism == 0 {
            return Err(ConfigError::ValidationFailed(
                "kdf_iterations and kdf_parallelism must be greater than 0".to_string(),
            ));
        }

        for (name, value) in [("did_method", &self.ledger.did_method), ("network", &self.ledger.network)] {
            if value.is_empty() {
                return Err(ConfigError::ValidationFailed(format!("{} must not be empty", name)));
            }
            if value.contains(':') {
                return Err(ConfigError::ValidationFailed(format!("{} must not contain ':'", name)));
            }
        }
        if self.ledger.required_confirmations == 0 {
            return Err(ConfigError::ValidationFailed(
                "required_confirmations must be greater than 0".to_string(),
            ));
        }
        if self.ledger.max_retries == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_retries must be greater than 0".to_string(),
            ));
        }

        if self.credential.revocation_list_id.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "revocation_list_id must not be empty".to_string(),
            ));
        }

        if self.logging.level.parse::<LogLevel>().is_err() {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::FileWriteError(e.to_string()))?;

        Ok(())
    }
}
