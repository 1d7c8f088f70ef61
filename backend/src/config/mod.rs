//! Application configuration management

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};

use crate::graphql::{ExecutionDefaults, NamingConfig};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host (for logged URLs)
    pub host: Option<String>,

    /// Server port
    pub port: u16,

    /// YAML seed for the memory store
    pub seed_file: Option<PathBuf>,

    /// Keyspaces to manage; `None` manages every non-system keyspace
    pub keyspaces: Option<Vec<String>>,

    /// Keyspace served at `/graphql`
    pub default_keyspace: Option<String>,

    pub schema_update_interval: Duration,

    pub naming: NamingConfig,

    /// Consistency, page size and timeout used when a request sets none
    pub execution: ExecutionDefaults,

    /// Header carrying the acting-as identity
    pub acting_as_header: String,

    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let parsed = |key: &str, default: &str| -> String {
            lookup(key).unwrap_or_else(|| default.to_string())
        };

        let keyspaces = lookup("KEYSPACES")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|list| !list.is_empty());

        let naming = NamingConfig {
            type_case: parsed("TYPE_NAME_CASE", "pascal")
                .parse()
                .map_err(|e: String| anyhow!(e))
                .context("Invalid TYPE_NAME_CASE")?,
            field_case: parsed("FIELD_NAME_CASE", "camel")
                .parse()
                .map_err(|e: String| anyhow!(e))
                .context("Invalid FIELD_NAME_CASE")?,
        };

        let execution = ExecutionDefaults {
            consistency: parsed("DEFAULT_CONSISTENCY", "LOCAL_QUORUM")
                .parse()
                .map_err(|e: String| anyhow!(e))
                .context("Invalid DEFAULT_CONSISTENCY")?,
            serial_consistency: parsed("DEFAULT_SERIAL_CONSISTENCY", "SERIAL")
                .parse()
                .map_err(|e: String| anyhow!(e))
                .context("Invalid DEFAULT_SERIAL_CONSISTENCY")?,
            page_size: parsed("DEFAULT_PAGE_SIZE", "100")
                .parse()
                .context("Invalid DEFAULT_PAGE_SIZE")?,
            timeout: Duration::from_secs(
                parsed("REQUEST_TIMEOUT_SECS", "10")
                    .parse()
                    .context("Invalid REQUEST_TIMEOUT_SECS")?,
            ),
        };

        Ok(Self {
            host: lookup("HOST"),

            port: parsed("PORT", "8080").parse().context("Invalid PORT")?,

            seed_file: lookup("SEED_FILE").map(PathBuf::from),

            keyspaces,

            default_keyspace: lookup("DEFAULT_KEYSPACE").filter(|k| !k.is_empty()),

            schema_update_interval: Duration::from_secs(
                parsed("SCHEMA_UPDATE_INTERVAL_SECS", "10")
                    .parse()
                    .context("Invalid SCHEMA_UPDATE_INTERVAL_SECS")?,
            ),

            naming,

            execution,

            acting_as_header: parsed("ACTING_AS_HEADER", "x-acting-as").to_ascii_lowercase(),

            log_format: parsed("LOG_FORMAT", "json")
                .parse()
                .map_err(|e: String| anyhow!(e))
                .context("Invalid LOG_FORMAT")?,
        })
    }
}
