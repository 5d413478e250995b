use std::collections::HashMap;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "form-autofill",
    version,
    about = "AI-assisted form filling: scan a page, map student data, fill the form"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: form-autofill.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Generative model name used by the gemini mapper
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Mapping endpoint used by the remote mapper
    #[arg(long, global = true)]
    pub remote_endpoint: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a page snapshot and print its fillable controls
    Scan {
        /// Page snapshot (JSON)
        #[arg(long)]
        page: String,

        /// Write the page back out, including scanner markers
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Scan a page and ask the mapper for field values
    Map {
        #[arg(long)]
        page: String,

        /// Student record (JSON)
        #[arg(long)]
        student: String,

        /// Mapper: gemini, heuristic or remote
        #[arg(long, default_value = "gemini")]
        mapper: String,
    },

    /// Apply a mapping list to a page snapshot
    Fill {
        #[arg(long)]
        page: String,

        /// Mapping list (JSON array of {selector, value, confidence})
        #[arg(long)]
        mapping: String,

        /// Where to write the filled page; only the fill report is printed
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Scan, map and fill in one run
    Autofill {
        #[arg(long)]
        page: String,

        #[arg(long)]
        student: String,

        #[arg(long, default_value = "gemini")]
        mapper: String,

        /// Show the proposed mappings without touching the page
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        #[arg(short, long)]
        output: Option<String>,
    },

    /// Serve the field-mapping HTTP endpoint
    Serve {
        /// Listen address (default from config: 127.0.0.1:8765)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Host the page bridge over newline-delimited JSON on stdin/stdout
    Bridge {
        #[arg(long)]
        page: String,

        /// Write the page here when stdin closes
        #[arg(short, long)]
        output: Option<String>,
    },
}

// ============================================================================
// Config File Model (optional YAML)
// ============================================================================

pub const DEFAULT_CONFIG_PATH: &str = "form-autofill.yaml";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Optional YAML config file: `form-autofill.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub mapper: MapperConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub trace: TraceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapperConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Falls back to the GEMINI_API_KEY environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            temperature: default_temperature(),
            max_retries: default_max_retries(),
            timeout_ms: default_timeout_ms(),
            retry_backoff_ms: default_backoff_ms(),
        }
    }
}

impl MapperConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Session token -> user id. Requests with any other token are rejected.
    #[serde(default)]
    pub sessions: HashMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            sessions: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub endpoint: Option<String>,

    /// Falls back to the FORM_AUTOFILL_SESSION_TOKEN environment variable.
    pub session_token: Option<String>,
}

impl RemoteConfig {
    pub fn resolved_session_token(&self) -> Option<String> {
        self.session_token
            .clone()
            .or_else(|| std::env::var("FORM_AUTOFILL_SESSION_TOKEN").ok())
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceConfig {
    /// JSONL pipeline trace; disabled when unset.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default = "default_true")]
    pub redact_pii: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            redact_pii: true,
        }
    }
}

// Serde default helpers
fn default_base_url() -> String { GEMINI_BASE_URL.to_string() }
fn default_model() -> String { "gemini-2.0-flash".to_string() }
fn default_temperature() -> f32 { 0.1 }
fn default_max_retries() -> u32 { 2 }
fn default_timeout_ms() -> u64 { 30_000 }
fn default_backoff_ms() -> u64 { 500 }
fn default_bind() -> String { "127.0.0.1:8765".to_string() }
fn default_level() -> String { "info".to_string() }
fn default_true() -> bool { true }

// ============================================================================
// Config File Loading
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("malformed config '{path}': {source}")]
    Yaml {
        path: String,
        source: serde_yaml::Error,
    },
}

/// Load a config file the caller asked for explicitly.
pub fn try_load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
        path: path.to_string(),
        source,
    })
}

/// Load config from a YAML file. Returns defaults if file is missing or malformed.
pub fn load_config(path: Option<&str>) -> AppConfig {
    try_load_config(path.unwrap_or(DEFAULT_CONFIG_PATH)).unwrap_or_default()
}

// ============================================================================
// CLI overrides
// ============================================================================

/// Apply global CLI flags on top of the file config (CLI wins).
pub fn apply_cli_overrides(mut config: AppConfig, cli: &Cli) -> AppConfig {
    if let Some(model) = &cli.model {
        config.mapper.model = model.clone();
    }
    if let Some(endpoint) = &cli.remote_endpoint {
        config.remote.endpoint = Some(endpoint.clone());
    }
    config.logging.level = match cli.verbose {
        0 => config.logging.level,
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    config
}
