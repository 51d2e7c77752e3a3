//! Runtime configuration
//!
//! Every value has a compile-time default in `constants`, except the Jupiter
//! API key which must be supplied. Overrides are read from environment
//! variables once at start-up; the resulting structs are never mutated.
//!
//! The binary first loads a `.env` file from the working directory, if one
//! exists. Variables already set in the process environment win over the file.

use crate::{
    constants::{
        DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_MAX_PRICE_AGE_SECS, DEFAULT_POLL_INTERVAL_MS,
        HERMES_API_URL, JUPITER_PRICE_URL, PYTH_SOL_USD_FEED_ID, PYTH_SOL_USD_PRICE_ACCOUNT,
        SOLANA_RPC_URL, SOL_MINT,
    },
    error::ConfigError,
    movement::StepConfig,
};
use solana_sdk::pubkey::Pubkey;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const ENV_RPC_URL: &str = "SOLANA_RPC_URL";
pub const ENV_PRICE_ACCOUNT: &str = "PYTH_PRICE_ACCOUNT";
pub const ENV_HERMES_URL: &str = "HERMES_URL";
pub const ENV_FEED_ID: &str = "PYTH_FEED_ID";
pub const ENV_MAX_AGE_SECS: &str = "PYTH_MAX_AGE_SECS";
pub const ENV_JUPITER_URL: &str = "JUPITER_PRICE_URL";
pub const ENV_MINT: &str = "SOL_MINT";
pub const ENV_JUPITER_API_KEY: &str = "JUP_API_KEY";

/// Reads a variable from the process environment
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Loads `.env` from the working directory or its parents, if present
///
/// Returns the path that was loaded.
pub fn load_dotenv() -> Result<Option<PathBuf>, ConfigError> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(ConfigError::EnvFile {
            path: ".env".to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Loads variables from an env file into the process environment
///
/// Variables that are already set are left untouched.
pub fn load_env_file(path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let path = path.as_ref();
    dotenvy::from_path(path).map_err(|e| ConfigError::EnvFile {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Unset and blank variables are treated the same
fn lookup_var(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// When the first cycle runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartPolicy {
    /// First cycle runs as soon as the poller starts
    #[default]
    Immediate,
    /// First cycle runs one interval after start
    AfterInterval,
}

/// Poll loop configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PollerConfig {
    /// Time between ticks
    pub interval: Duration,
    /// Upper bound for a single fetch
    pub fetch_timeout: Duration,
    pub start: StartPolicy,
    /// Step tracking of price moves; off when `None`
    pub step: Option<StepConfig>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            start: StartPolicy::Immediate,
            step: None,
        }
    }
}

impl PollerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::invalid("interval", "must be greater than zero"));
        }
        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::invalid(
                "fetch timeout",
                "must be greater than zero",
            ));
        }
        if let Some(step) = &self.step {
            step.validate()?;
        }
        Ok(())
    }
}

/// On-chain Pyth price account source configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSourceConfig {
    pub rpc_url: String,
    pub price_account: Pubkey,
}

impl AccountSourceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let rpc_url =
            lookup_var(&lookup, ENV_RPC_URL).unwrap_or_else(|| SOLANA_RPC_URL.to_string());
        let account = lookup_var(&lookup, ENV_PRICE_ACCOUNT)
            .unwrap_or_else(|| PYTH_SOL_USD_PRICE_ACCOUNT.to_string());
        let price_account = Pubkey::from_str(&account)
            .map_err(|e| ConfigError::invalid(ENV_PRICE_ACCOUNT, e.to_string()))?;

        Ok(Self {
            rpc_url,
            price_account,
        })
    }
}

/// Hermes price service source configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HermesSourceConfig {
    pub endpoint: String,
    /// 32-byte hex feed id, with or without `0x`
    pub feed_id: String,
    pub max_age: Duration,
}

impl Default for HermesSourceConfig {
    fn default() -> Self {
        Self {
            endpoint: HERMES_API_URL.to_string(),
            feed_id: PYTH_SOL_USD_FEED_ID.to_string(),
            max_age: Duration::from_secs(DEFAULT_MAX_PRICE_AGE_SECS),
        }
    }
}

impl HermesSourceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let endpoint = lookup_var(&lookup, ENV_HERMES_URL).unwrap_or(defaults.endpoint);
        let feed_id = lookup_var(&lookup, ENV_FEED_ID).unwrap_or(defaults.feed_id);
        validate_feed_id(&feed_id)?;

        let max_age = match lookup_var(&lookup, ENV_MAX_AGE_SECS) {
            Some(raw) => Duration::from_secs(
                raw.parse::<u64>()
                    .map_err(|e| ConfigError::invalid(ENV_MAX_AGE_SECS, e.to_string()))?,
            ),
            None => defaults.max_age,
        };

        Ok(Self {
            endpoint,
            feed_id,
            max_age,
        })
    }
}

fn validate_feed_id(feed_id: &str) -> Result<(), ConfigError> {
    let hex = feed_id.trim_start_matches("0x");
    if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConfigError::invalid(
            ENV_FEED_ID,
            format!("expected 64 hex characters, got {:?}", feed_id),
        ));
    }
    Ok(())
}

/// Jupiter price API source configuration
#[derive(Clone, PartialEq, Eq)]
pub struct JupiterSourceConfig {
    pub endpoint: String,
    pub mint: String,
    pub api_key: String,
}

impl std::fmt::Debug for JupiterSourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JupiterSourceConfig")
            .field("endpoint", &self.endpoint)
            .field("mint", &self.mint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl JupiterSourceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Fails when no API key is supplied; there is no built-in key
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup_var(&lookup, ENV_JUPITER_API_KEY).ok_or(ConfigError::Missing {
            var: ENV_JUPITER_API_KEY,
        })?;
        let endpoint =
            lookup_var(&lookup, ENV_JUPITER_URL).unwrap_or_else(|| JUPITER_PRICE_URL.to_string());
        let mint = lookup_var(&lookup, ENV_MINT).unwrap_or_else(|| SOL_MINT.to_string());
        Pubkey::from_str(&mint).map_err(|e| ConfigError::invalid(ENV_MINT, e.to_string()))?;

        Ok(Self {
            endpoint,
            mint,
            api_key,
        })
    }
}
