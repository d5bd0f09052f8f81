//! Configuration data model.
//!
//! This module intentionally holds struct definitions plus default values.
//! Loader and env-override logic remains in `config::env`/`config::loader` so
//! parsing and precedence behavior stays centralized.

use std::path::PathBuf;

use super::defaults::{
    default_file_allowed_extensions, DEFAULT_API_PREFIX, DEFAULT_CLEANUP_FILE_MAX_AGE_SECS,
    DEFAULT_CLEANUP_RUN_INTERVAL_SECS, DEFAULT_CONTAINER_CPU_LIMIT,
    DEFAULT_CONTAINER_MEMORY_LIMIT_MB, DEFAULT_DOCKER_NETWORK_ENABLED,
    DEFAULT_FILE_MAX_UPLOAD_SIZE, DEFAULT_HOST_FILE_UPLOAD_PATH, DEFAULT_LOG_LEVEL,
    DEFAULT_MAX_CONCURRENT_CONTAINERS, DEFAULT_PORT, DEFAULT_PY_CONTAINER_IMAGE,
    DEFAULT_R_CONTAINER_IMAGE, DEFAULT_SANDBOX_MAX_EXECUTION_TIME_SECS,
};

/// Ambient runtime configuration for the sandbox service.
///
/// Loaded once at startup (defaults, then an optional TOML file, then
/// environment overrides) and shared read-only across the engine and HTTP
/// layer from then on.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub containers: ContainerConfig,
    pub files: FilesConfig,
    pub cleanup: CleanupConfig,
    pub logging: LoggingConfig,
    /// Shared secret checked by the `/v1/<adapter>/...` surface. Absent
    /// disables the adapter's API-key enforcement (fine for local dev).
    pub api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            containers: ContainerConfig::default(),
            files: FilesConfig::default(),
            cleanup: CleanupConfig::default(),
            logging: LoggingConfig::default(),
            api_key: None,
        }
    }
}

impl Settings {
    /// Absolute path to the upload root, creating no directories itself.
    pub fn host_file_upload_path_abs(&self) -> PathBuf {
        if self.files.host_file_upload_path.is_absolute() {
            self.files.host_file_upload_path.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.files.host_file_upload_path)
        }
    }

    /// Path to the SQLite metadata database file.
    pub fn database_path(&self, config_root: &std::path::Path) -> PathBuf {
        config_root.join("database.db")
    }
}

/// HTTP server bind settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub api_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            api_prefix: DEFAULT_API_PREFIX.to_string(),
        }
    }
}

/// Container scheduling and resource-cap settings.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    pub max_concurrent_containers: usize,
    pub memory_limit_mb: u64,
    pub cpu_limit_cores: f64,
    pub network_enabled: bool,
    pub sandbox_max_execution_time_secs: u64,
    pub py_image: String,
    pub r_image: String,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_containers: DEFAULT_MAX_CONCURRENT_CONTAINERS,
            memory_limit_mb: DEFAULT_CONTAINER_MEMORY_LIMIT_MB,
            cpu_limit_cores: DEFAULT_CONTAINER_CPU_LIMIT,
            network_enabled: DEFAULT_DOCKER_NETWORK_ENABLED,
            sandbox_max_execution_time_secs: DEFAULT_SANDBOX_MAX_EXECUTION_TIME_SECS,
            py_image: DEFAULT_PY_CONTAINER_IMAGE.to_string(),
            r_image: DEFAULT_R_CONTAINER_IMAGE.to_string(),
        }
    }
}

/// Upload/session-directory policy enforced by the upload collaborator.
#[derive(Debug, Clone)]
pub struct FilesConfig {
    pub host_file_upload_path: PathBuf,
    pub allowed_extensions: Vec<String>,
    pub max_upload_size_bytes: u64,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            host_file_upload_path: PathBuf::from(DEFAULT_HOST_FILE_UPLOAD_PATH),
            allowed_extensions: default_file_allowed_extensions(),
            max_upload_size_bytes: DEFAULT_FILE_MAX_UPLOAD_SIZE,
        }
    }
}

/// Periodic reaper cadence and retention window.
#[derive(Debug, Clone, Copy)]
pub struct CleanupConfig {
    pub run_interval_secs: u64,
    pub file_max_age_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            run_interval_secs: DEFAULT_CLEANUP_RUN_INTERVAL_SECS,
            file_max_age_secs: DEFAULT_CLEANUP_FILE_MAX_AGE_SECS,
        }
    }
}

/// Structured-logging verbosity settings.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub serialize_json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            serialize_json: false,
        }
    }
}

/// Diagnostics captured while resolving runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigDiagnostics {
    /// Non-fatal observations (e.g. an overridden value that was clamped).
    pub warnings: Vec<String>,
}

/// Configuration payload plus load-time diagnostics.
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub settings: Settings,
    pub diagnostics: ConfigDiagnostics,
}
