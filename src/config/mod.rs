//! Config loading, defaults, and environment overrides.

mod defaults;
mod env;
mod loader;
mod types;

pub use loader::{config_root_dir, load_settings, load_settings_with_diagnostics};
pub use types::{
    CleanupConfig, ConfigDiagnostics, ContainerConfig, FilesConfig, LoadedSettings, LoggingConfig,
    ServerConfig, Settings,
};
