//! Compiled-in default values for [`super::Settings`].

pub(super) const DEFAULT_MAX_CONCURRENT_CONTAINERS: usize = 4;
pub(super) const DEFAULT_CONTAINER_MEMORY_LIMIT_MB: u64 = 512;
pub(super) const DEFAULT_CONTAINER_CPU_LIMIT: f64 = 1.0;
pub(super) const DEFAULT_DOCKER_NETWORK_ENABLED: bool = false;
pub(super) const DEFAULT_HOST_FILE_UPLOAD_PATH: &str = "uploads";
pub(super) const DEFAULT_FILE_MAX_UPLOAD_SIZE: u64 = 10 * 1024 * 1024;
pub(super) const DEFAULT_CLEANUP_RUN_INTERVAL_SECS: u64 = 3600;
pub(super) const DEFAULT_CLEANUP_FILE_MAX_AGE_SECS: u64 = 86_400;
pub(super) const DEFAULT_SANDBOX_MAX_EXECUTION_TIME_SECS: u64 = 300;
pub(super) const DEFAULT_PY_CONTAINER_IMAGE: &str = "python-scientific-notebook";
pub(super) const DEFAULT_R_CONTAINER_IMAGE: &str = "r-notebook";
pub(super) const DEFAULT_PORT: u16 = 8000;
pub(super) const DEFAULT_API_PREFIX: &str = "/v1";
pub(super) const DEFAULT_LOG_LEVEL: &str = "info";

pub(super) fn default_file_allowed_extensions() -> Vec<String> {
    [
        "txt", "csv", "tsv", "json", "xml", "yaml", "yml", "md", "png", "jpg", "jpeg", "gif",
        "svg", "pdf", "xlsx", "xls", "parquet", "html", "zip", "gz", "tar", "py", "r", "ipynb",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}
