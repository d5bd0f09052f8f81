//! Environment-variable override handling.
//!
//! Every field of [`super::Settings`] can be overridden by a same-named
//! environment variable (e.g. `MAX_CONCURRENT_CONTAINERS`,
//! `CONTAINER_MEMORY_LIMIT_MB`), matching the flat env-var surface the
//! request layer's ambient configuration object exposes.

use crate::error::ConfigError;

use super::types::ConfigDiagnostics;
use super::Settings;

pub(super) fn apply_env_overrides<FEnv>(
    settings: &mut Settings,
    env_lookup: &FEnv,
    diagnostics: &mut ConfigDiagnostics,
) -> Result<(), ConfigError>
where
    FEnv: Fn(&str) -> Option<String>,
{
    if let Some(v) = env_lookup("MAX_CONCURRENT_CONTAINERS") {
        settings.containers.max_concurrent_containers = parse_positive(&v, "MAX_CONCURRENT_CONTAINERS")?;
    }
    if let Some(v) = env_lookup("CONTAINER_MEMORY_LIMIT_MB") {
        settings.containers.memory_limit_mb = parse_positive(&v, "CONTAINER_MEMORY_LIMIT_MB")?;
    }
    if let Some(v) = env_lookup("CONTAINER_CPU_LIMIT") {
        settings.containers.cpu_limit_cores = v.parse::<f64>().map_err(|_| {
            ConfigError::Invalid(format!("invalid CONTAINER_CPU_LIMIT value `{v}`"))
        })?;
    }
    if let Some(v) = env_lookup("DOCKER_NETWORK_ENABLED") {
        settings.containers.network_enabled = parse_bool(&v, "DOCKER_NETWORK_ENABLED")?;
    }
    if let Some(v) = env_lookup("SANDBOX_MAX_EXECUTION_TIME") {
        settings.containers.sandbox_max_execution_time_secs =
            parse_positive(&v, "SANDBOX_MAX_EXECUTION_TIME")?;
    }
    if let Some(v) = env_lookup("PY_CONTAINER_IMAGE") {
        settings.containers.py_image = v;
    }
    if let Some(v) = env_lookup("R_CONTAINER_IMAGE") {
        settings.containers.r_image = v;
    }
    if let Some(v) = env_lookup("HOST_FILE_UPLOAD_PATH") {
        settings.files.host_file_upload_path = v.into();
    }
    if let Some(v) = env_lookup("FILE_MAX_UPLOAD_SIZE") {
        settings.files.max_upload_size_bytes = parse_positive(&v, "FILE_MAX_UPLOAD_SIZE")?;
    }
    if let Some(v) = env_lookup("FILE_ALLOWED_EXTENSIONS") {
        let parsed: Vec<String> = v
            .split(',')
            .map(|s| s.trim().trim_start_matches('.').to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        if parsed.is_empty() {
            diagnostics
                .warnings
                .push("FILE_ALLOWED_EXTENSIONS set but empty after parsing; keeping defaults".into());
        } else {
            settings.files.allowed_extensions = parsed;
        }
    }
    if let Some(v) = env_lookup("CLEANUP_RUN_INTERVAL") {
        settings.cleanup.run_interval_secs = parse_positive(&v, "CLEANUP_RUN_INTERVAL")?;
    }
    if let Some(v) = env_lookup("CLEANUP_FILE_MAX_AGE") {
        settings.cleanup.file_max_age_secs = parse_positive(&v, "CLEANUP_FILE_MAX_AGE")?;
    }
    if let Some(v) = env_lookup("PORT") {
        settings.server.port = v
            .parse::<u16>()
            .map_err(|_| ConfigError::Invalid(format!("invalid PORT value `{v}`")))?;
    }
    if let Some(v) = env_lookup("API_PREFIX") {
        settings.server.api_prefix = v;
    }
    if let Some(v) = env_lookup("LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env_lookup("LOG_SERIALIZE") {
        settings.logging.serialize_json = parse_bool(&v, "LOG_SERIALIZE")?;
    }
    if let Some(v) = env_lookup("API_KEY") {
        settings.api_key = Some(v);
    }
    Ok(())
}

fn parse_positive<T>(raw: &str, name: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    raw.parse::<T>()
        .map_err(|_| ConfigError::Invalid(format!("invalid {name} value `{raw}`: expected a positive integer")))
}

fn parse_bool(raw: &str, name: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid(format!(
            "invalid {name} value `{raw}`: expected true/false"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_map(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn overrides_numeric_fields() {
        let mut settings = Settings::default();
        let mut diagnostics = ConfigDiagnostics::default();
        let lookup = env_map(&[("MAX_CONCURRENT_CONTAINERS", "10"), ("PORT", "9090")]);
        apply_env_overrides(&mut settings, &lookup, &mut diagnostics).unwrap();
        assert_eq!(settings.containers.max_concurrent_containers, 10);
        assert_eq!(settings.server.port, 9090);
    }

    #[test]
    fn rejects_non_numeric_override() {
        let mut settings = Settings::default();
        let mut diagnostics = ConfigDiagnostics::default();
        let lookup = env_map(&[("MAX_CONCURRENT_CONTAINERS", "many")]);
        let err = apply_env_overrides(&mut settings, &lookup, &mut diagnostics).unwrap_err();
        assert!(err.to_string().contains("MAX_CONCURRENT_CONTAINERS"));
    }

    #[test]
    fn parses_bool_variants() {
        let mut settings = Settings::default();
        let mut diagnostics = ConfigDiagnostics::default();
        let lookup = env_map(&[("DOCKER_NETWORK_ENABLED", "yes")]);
        apply_env_overrides(&mut settings, &lookup, &mut diagnostics).unwrap();
        assert!(settings.containers.network_enabled);
    }

    #[test]
    fn empty_extension_list_keeps_defaults_and_warns() {
        let mut settings = Settings::default();
        let mut diagnostics = ConfigDiagnostics::default();
        let lookup = env_map(&[("FILE_ALLOWED_EXTENSIONS", " , ,")]);
        apply_env_overrides(&mut settings, &lookup, &mut diagnostics).unwrap();
        assert!(!settings.files.allowed_extensions.is_empty());
        assert_eq!(diagnostics.warnings.len(), 1);
    }
}
