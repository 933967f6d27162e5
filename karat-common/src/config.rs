//! Configuration loading
//!
//! One `Settings` struct serves both services, resolved once at process
//! start and passed by reference into each component's constructor.
//! Per-field priority order:
//! 1. Command-line argument (highest)
//! 2. Environment variable (`KARAT_*`)
//! 3. TOML config file
//! 4. Compiled default

use std::path::PathBuf;

use serde::Deserialize;
use tracing::warn;

use crate::model::Appraisal;
use crate::Result;

/// Success appraisals stay cached for a day.
pub const DEFAULT_SUCCESS_TTL_SECS: i64 = 86_400;

/// Error appraisals expire quickly so failed computations are retried
/// without manual intervention.
pub const DEFAULT_ERROR_TTL_SECS: i64 = 10;

/// Projects above this size are rejected before any clone is attempted.
pub const DEFAULT_SIZE_THRESHOLD: i64 = 100_000;

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Shared SQLite database coordinating api and worker.
    pub database_path: PathBuf,
    /// API listen address.
    pub listen_addr: String,
    /// Size-eligibility threshold in repository size units.
    pub size_threshold: i64,
    pub success_ttl_secs: i64,
    pub error_ttl_secs: i64,
    /// Concurrent worker slots consuming the job queue.
    pub worker_slots: usize,
    /// Directory holding local clone checkouts, one per project.
    pub clone_root: PathBuf,
    /// External contribution analyzer command.
    pub analyzer_command: String,
    /// Queue poll interval when idle.
    pub poll_interval_ms: u64,
    /// How long a claimed job stays invisible before redelivery.
    pub visibility_timeout_secs: i64,
    /// How long the terminal phase is re-announced for late subscribers.
    pub finish_announce_secs: u64,
}

impl Settings {
    /// TTL for a cache write, selected by the appraisal's own status.
    pub fn ttl_for(&self, appraisal: &Appraisal) -> i64 {
        if appraisal.is_ok() {
            self.success_ttl_secs
        } else {
            self.error_ttl_secs
        }
    }
}

/// Command-line overrides, filled in by each binary's clap args.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database_path: Option<PathBuf>,
    pub listen_addr: Option<String>,
    pub clone_root: Option<PathBuf>,
    pub worker_slots: Option<usize>,
}

/// Optional keys read from the TOML config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub database_path: Option<PathBuf>,
    pub listen_addr: Option<String>,
    pub size_threshold: Option<i64>,
    pub success_ttl_secs: Option<i64>,
    pub error_ttl_secs: Option<i64>,
    pub worker_slots: Option<usize>,
    pub clone_root: Option<PathBuf>,
    pub analyzer_command: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub visibility_timeout_secs: Option<i64>,
    pub finish_announce_secs: Option<u64>,
}

impl TomlConfig {
    /// Load the config file if one exists. A missing file is normal; a
    /// malformed one is logged and ignored rather than fatal.
    pub fn load() -> TomlConfig {
        let path = match config_file_path() {
            Some(path) if path.exists() => path,
            _ => return TomlConfig::default(),
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ignoring malformed config file");
                    TomlConfig::default()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
                TomlConfig::default()
            }
        }
    }
}

/// Config file location: `KARAT_CONFIG` override, else the platform
/// config dir (`~/.config/karat/config.toml` on Linux).
fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("KARAT_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("karat").join("config.toml"))
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("karat"))
        .unwrap_or_else(|| PathBuf::from("./karat_data"))
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    match env_string(name) {
        Some(raw) => match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(var = name, value = %raw, "Ignoring unparseable environment variable");
                None
            }
        },
        None => None,
    }
}

/// Resolve the full settings from overrides, environment, TOML file, and
/// compiled defaults, in that order.
pub fn resolve(overrides: &Overrides) -> Result<Settings> {
    let file = TomlConfig::load();
    let data_dir = default_data_dir();

    let database_path = overrides
        .database_path
        .clone()
        .or_else(|| env_string("KARAT_DATABASE").map(PathBuf::from))
        .or(file.database_path)
        .unwrap_or_else(|| data_dir.join("karat.db"));

    let listen_addr = overrides
        .listen_addr
        .clone()
        .or_else(|| env_string("KARAT_LISTEN"))
        .or(file.listen_addr)
        .unwrap_or_else(|| "127.0.0.1:5780".to_string());

    let clone_root = overrides
        .clone_root
        .clone()
        .or_else(|| env_string("KARAT_CLONE_ROOT").map(PathBuf::from))
        .or(file.clone_root)
        .unwrap_or_else(|| data_dir.join("checkouts"));

    let worker_slots = overrides
        .worker_slots
        .or_else(|| env_parsed("KARAT_WORKER_SLOTS"))
        .or(file.worker_slots)
        .unwrap_or(2);

    let settings = Settings {
        database_path,
        listen_addr,
        size_threshold: env_parsed("KARAT_SIZE_THRESHOLD")
            .or(file.size_threshold)
            .unwrap_or(DEFAULT_SIZE_THRESHOLD),
        success_ttl_secs: env_parsed("KARAT_SUCCESS_TTL_SECS")
            .or(file.success_ttl_secs)
            .unwrap_or(DEFAULT_SUCCESS_TTL_SECS),
        error_ttl_secs: env_parsed("KARAT_ERROR_TTL_SECS")
            .or(file.error_ttl_secs)
            .unwrap_or(DEFAULT_ERROR_TTL_SECS),
        worker_slots,
        clone_root,
        analyzer_command: env_string("KARAT_ANALYZER")
            .or(file.analyzer_command)
            .unwrap_or_else(|| "karat-blame".to_string()),
        poll_interval_ms: env_parsed("KARAT_POLL_INTERVAL_MS")
            .or(file.poll_interval_ms)
            .unwrap_or(500),
        visibility_timeout_secs: env_parsed("KARAT_VISIBILITY_TIMEOUT_SECS")
            .or(file.visibility_timeout_secs)
            .unwrap_or(600),
        finish_announce_secs: file.finish_announce_secs.unwrap_or(5),
    };

    if settings.worker_slots == 0 {
        return Err(crate::Error::Config(
            "worker_slots must be at least 1".to_string(),
        ));
    }

    Ok(settings)
}
