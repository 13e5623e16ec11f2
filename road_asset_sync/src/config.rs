//! Run configuration: a TOML file for settings, the environment for secrets.
//!
//! The file describes the two external services, resolver limits, the
//! destination pool and the identities stamped on written rows. Secrets are
//! never read from the file; [`Secrets::from_env`] collects them and fails
//! before any I/O when one is missing.
//!
//! Entrypoints:
//! - Parse + validate a TOML string: [`load_config_str`]
//! - Read, parse + validate a file: [`load_config_path`]

use std::{num::NonZeroU32, time::Duration};

use anyhow::{Context, bail};
use road_data_client::{
    providers::{converter::ConverterSettings, registry::RegistrySettings},
    retry::RetryPolicy,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use shared_utils::{config::ConfigError, env::get_secret_env_var};

use crate::{
    resolver::ResolverSettings,
    store::WriterIdentity,
    strategy::traffic_sign_mappings::{SignTypeEntry, SignTypeTable},
};

/// Top-level run configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Source registry endpoints.
    pub registry: RegistryCfg,
    /// Linear-referencing converter endpoint and limits.
    pub converter: ConverterCfg,
    /// Batching of converter requests.
    #[serde(default)]
    pub resolver: ResolverCfg,
    /// Destination database.
    #[serde(default)]
    pub database: DatabaseCfg,
    /// Identities stamped on written rows.
    #[serde(default)]
    pub writer: WriterIdentity,
    /// Partition fan-out.
    #[serde(default)]
    pub run: RunCfg,
    /// Additional or overriding traffic sign types.
    #[serde(default)]
    pub traffic_sign_types: Vec<SignTypeEntry>,
}

/// `[registry]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryCfg {
    /// Download API root.
    pub api_url: String,
    /// OAuth2 token endpoint.
    pub token_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// `[converter]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConverterCfg {
    /// Conversion endpoint.
    pub url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Optional client-side throttle.
    #[serde(default)]
    pub requests_per_second: Option<u32>,
    /// Total attempts for timeout-class failures.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Fixed pause between attempts, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

/// `[resolver]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverCfg {
    /// Items per converter request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Converter requests in flight at once.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

/// `[database]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseCfg {
    /// Maximum pooled connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Rows written per transaction.
    #[serde(default = "default_batch_size")]
    pub write_batch_size: usize,
}

/// `[run]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RunCfg {
    /// Partitions processed at once by the fan-out helper.
    #[serde(default = "default_partitions_in_flight")]
    pub max_partitions_in_flight: usize,
}

fn default_timeout_secs() -> u64 {
    60
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    5000
}
fn default_batch_size() -> usize {
    50
}
fn default_max_in_flight() -> usize {
    20
}
fn default_pool_size() -> usize {
    8
}
fn default_partitions_in_flight() -> usize {
    4
}

impl Default for ResolverCfg {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

impl Default for DatabaseCfg {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            write_batch_size: default_batch_size(),
        }
    }
}

impl Default for RunCfg {
    fn default() -> Self {
        Self {
            max_partitions_in_flight: default_partitions_in_flight(),
        }
    }
}

impl SyncConfig {
    /// Registry client settings.
    pub fn registry_settings(&self) -> RegistrySettings {
        RegistrySettings {
            api_url: self.registry.api_url.clone(),
            token_url: self.registry.token_url.clone(),
            timeout: Duration::from_secs(self.registry.timeout_secs),
        }
    }

    /// Converter client settings.
    pub fn converter_settings(&self) -> ConverterSettings {
        let c = &self.converter;
        ConverterSettings {
            url: c.url.clone(),
            timeout: Duration::from_secs(c.timeout_secs),
            requests_per_second: c.requests_per_second.and_then(NonZeroU32::new),
            retry: RetryPolicy::new(c.retry_attempts, Duration::from_millis(c.retry_delay_ms)),
        }
    }

    /// Resolver limits.
    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            batch_size: self.resolver.batch_size,
            max_in_flight: self.resolver.max_in_flight,
        }
    }

    /// Built-in sign types with the configured entries taking precedence.
    pub fn sign_types(&self) -> SignTypeTable {
        SignTypeTable::builtin().with_overrides(self.traffic_sign_types.clone())
    }
}

/// Trims URLs and codes, then checks limits.
///
/// Errors:
/// - Empty service URLs
/// - Zero batch sizes, in-flight cap, retry attempts, pool size or partition cap
/// - Sign type entries without any code
pub fn normalize_config(cfg: &mut SyncConfig) -> anyhow::Result<()> {
    for (name, url) in [
        ("registry.api_url", &mut cfg.registry.api_url),
        ("registry.token_url", &mut cfg.registry.token_url),
        ("converter.url", &mut cfg.converter.url),
    ] {
        *url = url.trim().to_owned();
        if url.is_empty() {
            bail!("{name} cannot be empty");
        }
    }

    for (name, value) in [
        ("resolver.batch_size", cfg.resolver.batch_size),
        ("resolver.max_in_flight", cfg.resolver.max_in_flight),
        ("converter.retry_attempts", cfg.converter.retry_attempts as usize),
        ("database.pool_size", cfg.database.pool_size),
        ("database.write_batch_size", cfg.database.write_batch_size),
        ("run.max_partitions_in_flight", cfg.run.max_partitions_in_flight),
    ] {
        if value == 0 {
            bail!("{name} must be positive");
        }
    }

    for entry in &mut cfg.traffic_sign_types {
        for code in [&mut entry.new_law, &mut entry.old_law] {
            if let Some(c) = code.take() {
                let c = c.trim().to_owned();
                if !c.is_empty() {
                    *code = Some(c);
                }
            }
        }
        if entry.new_law.is_none() && entry.old_law.is_none() {
            bail!("traffic sign type {} has neither new_law nor old_law", entry.value);
        }
    }
    Ok(())
}

/// Parse and validate a configuration from a TOML string.
pub fn load_config_str(toml_str: &str) -> anyhow::Result<SyncConfig> {
    let mut cfg: SyncConfig = toml::from_str(toml_str).context("failed to parse config TOML")?;
    normalize_config(&mut cfg).context("invalid configuration")?;
    Ok(cfg)
}

/// Read a configuration file from disk, parse and validate it.
pub fn load_config_path(path: impl AsRef<std::path::Path>) -> anyhow::Result<SyncConfig> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("read config file {}", path.as_ref().display()))?;
    load_config_str(&text)
}

/// Destination connection string.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
/// Registry OAuth2 client id.
pub const REGISTRY_CLIENT_ID_ENV: &str = "REGISTRY_CLIENT_ID";
/// Registry OAuth2 client secret.
pub const REGISTRY_CLIENT_SECRET_ENV: &str = "REGISTRY_CLIENT_SECRET";
/// Converter API key.
pub const CONVERTER_API_KEY_ENV: &str = "CONVERTER_API_KEY";

/// Credentials for the database and both services.
#[derive(Clone)]
pub struct Secrets {
    /// `DATABASE_URL`.
    pub database_url: SecretString,
    /// `REGISTRY_CLIENT_ID`.
    pub registry_client_id: SecretString,
    /// `REGISTRY_CLIENT_SECRET`.
    pub registry_client_secret: SecretString,
    /// `CONVERTER_API_KEY`.
    pub converter_api_key: SecretString,
}

impl Secrets {
    /// Reads every secret; the first missing one is reported.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: get_secret_env_var(DATABASE_URL_ENV)?,
            registry_client_id: get_secret_env_var(REGISTRY_CLIENT_ID_ENV)?,
            registry_client_secret: get_secret_env_var(REGISTRY_CLIENT_SECRET_ENV)?,
            converter_api_key: get_secret_env_var(CONVERTER_API_KEY_ENV)?,
        })
    }
}
