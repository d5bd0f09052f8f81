//! Unified error types for the sandbox service.

use std::fmt;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors when loading or parsing configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Toml(e) => write!(f, "toml: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e)
    }
}

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Errors from the metadata store.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite failure. Treated as retriable by callers.
    Db(rusqlite::Error),
    /// `get`/`delete` addressed a row that does not exist.
    NotFound,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Db(e) => write!(f, "store: {e}"),
            Self::NotFound => write!(f, "not found"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Db(e)
    }
}

// ---------------------------------------------------------------------------
// ImageError
// ---------------------------------------------------------------------------

/// Errors from the image coordinator.
#[derive(Debug)]
pub enum ImageError {
    /// The inspect/pull call to the container runtime failed.
    Runtime(String),
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Runtime(msg) => write!(f, "image: {msg}"),
        }
    }
}

impl std::error::Error for ImageError {}

// ---------------------------------------------------------------------------
// SnapshotError
// ---------------------------------------------------------------------------

/// Errors from the file snapshotter.
#[derive(Debug)]
pub enum SnapshotError {
    Io(std::io::Error),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "snapshot io: {e}"),
        }
    }
}

impl std::error::Error for SnapshotError {}

impl From<std::io::Error> for SnapshotError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// EngineError — top-level, internal only
// ---------------------------------------------------------------------------

/// Internal failure classification for one `execute` call.
///
/// Never escapes [`crate::engine::Engine::execute`] — every variant is caught
/// at the call site and folded into an `ExecutionResult { status: Error, .. }`
/// per the propagation policy: the engine always returns a structured result.
#[derive(Debug)]
pub enum EngineError {
    /// The container runtime client could not be reached even after one
    /// reinitialization attempt.
    RuntimeUnreachable,
    Image(ImageError),
    /// The container did not reach the running state before the deadline.
    ContainerStartTimeout,
    Snapshot(SnapshotError),
    Store(StoreError),
    /// Any other internal failure not covered above.
    Internal(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RuntimeUnreachable => write!(f, "container runtime unreachable"),
            Self::Image(e) => write!(f, "{e}"),
            Self::ContainerStartTimeout => write!(f, "container start deadline exceeded"),
            Self::Snapshot(e) => write!(f, "{e}"),
            Self::Store(e) => write!(f, "{e}"),
            Self::Internal(msg) => write!(f, "internal: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<ImageError> for EngineError {
    fn from(e: ImageError) -> Self {
        Self::Image(e)
    }
}

impl From<SnapshotError> for EngineError {
    fn from(e: SnapshotError) -> Self {
        Self::Snapshot(e)
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}
