//! Top-level config loading pipeline: defaults, then an optional TOML file,
//! then environment overrides.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::env::apply_env_overrides;
use super::types::{ConfigDiagnostics, LoadedSettings};
use super::Settings;

/// Load settings from an optional TOML file plus the process environment.
pub fn load_settings(path_override: Option<&str>) -> Result<Settings, ConfigError> {
    Ok(load_settings_with_diagnostics(path_override)?.settings)
}

/// Load settings and return any non-fatal diagnostics collected along the way.
pub fn load_settings_with_diagnostics(
    path_override: Option<&str>,
) -> Result<LoadedSettings, ConfigError> {
    load_settings_from_sources(path_override, |path| std::fs::read_to_string(path), |name| {
        std::env::var(name).ok()
    })
}

pub(super) fn load_settings_from_sources<FRead, FEnv>(
    path_override: Option<&str>,
    read_file: FRead,
    env_lookup: FEnv,
) -> Result<LoadedSettings, ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FEnv: Fn(&str) -> Option<String>,
{
    let mut diagnostics = ConfigDiagnostics::default();
    let mut settings = Settings::default();

    if let Some(path) = path_override {
        let text = read_file(Path::new(path))?;
        let file_settings: FileSettings = toml::from_str(&text)?;
        file_settings.merge_into(&mut settings);
    }

    apply_env_overrides(&mut settings, &env_lookup, &mut diagnostics)?;

    Ok(LoadedSettings {
        settings,
        diagnostics,
    })
}

/// Directory holding the metadata database and any config file, resolved the
/// same way the upload root is: relative to the process working directory
/// unless `HOST_CONFIG_PATH` names an absolute one.
pub fn config_root_dir(env_lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    match env_lookup("HOST_CONFIG_PATH") {
        Some(p) => PathBuf::from(p),
        None => PathBuf::from("config"),
    }
}

/// Partial, all-optional mirror of [`Settings`] for TOML file overrides.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
struct FileSettings {
    max_concurrent_containers: Option<usize>,
    container_memory_limit_mb: Option<u64>,
    container_cpu_limit: Option<f64>,
    docker_network_enabled: Option<bool>,
    host_file_upload_path: Option<String>,
    file_max_upload_size: Option<u64>,
    file_allowed_extensions: Option<Vec<String>>,
    cleanup_run_interval: Option<u64>,
    cleanup_file_max_age: Option<u64>,
    sandbox_max_execution_time: Option<u64>,
    py_container_image: Option<String>,
    r_container_image: Option<String>,
    port: Option<u16>,
    api_prefix: Option<String>,
    log_level: Option<String>,
    log_serialize: Option<bool>,
    api_key: Option<String>,
}

impl FileSettings {
    fn merge_into(self, settings: &mut Settings) {
        if let Some(v) = self.max_concurrent_containers {
            settings.containers.max_concurrent_containers = v;
        }
        if let Some(v) = self.container_memory_limit_mb {
            settings.containers.memory_limit_mb = v;
        }
        if let Some(v) = self.container_cpu_limit {
            settings.containers.cpu_limit_cores = v;
        }
        if let Some(v) = self.docker_network_enabled {
            settings.containers.network_enabled = v;
        }
        if let Some(v) = self.host_file_upload_path {
            settings.files.host_file_upload_path = v.into();
        }
        if let Some(v) = self.file_max_upload_size {
            settings.files.max_upload_size_bytes = v;
        }
        if let Some(v) = self.file_allowed_extensions {
            settings.files.allowed_extensions = v;
        }
        if let Some(v) = self.cleanup_run_interval {
            settings.cleanup.run_interval_secs = v;
        }
        if let Some(v) = self.cleanup_file_max_age {
            settings.cleanup.file_max_age_secs = v;
        }
        if let Some(v) = self.sandbox_max_execution_time {
            settings.containers.sandbox_max_execution_time_secs = v;
        }
        if let Some(v) = self.py_container_image {
            settings.containers.py_image = v;
        }
        if let Some(v) = self.r_container_image {
            settings.containers.r_image = v;
        }
        if let Some(v) = self.port {
            settings.server.port = v;
        }
        if let Some(v) = self.api_prefix {
            settings.server.api_prefix = v;
        }
        if let Some(v) = self.log_level {
            settings.logging.level = v;
        }
        if let Some(v) = self.log_serialize {
            settings.logging.serialize_json = v;
        }
        if let Some(v) = self.api_key {
            settings.api_key = Some(v);
        }
    }
}
