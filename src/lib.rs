//! sandboxd — a network-accessible code execution sandbox service.
//!
//! Runs untrusted Python/R snippets inside short-lived Docker containers,
//! tracks files the snippet produced, and exposes the whole thing over a
//! small HTTP API.
//!
//! # Quick start
//!
//! ```no_run
//! use sandboxd::config::load_settings;
//! use sandboxd::engine::docker::BollardRuntime;
//! use sandboxd::engine::Engine;
//! use sandboxd::store::MetadataStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = load_settings(None)?;
//! let store = MetadataStore::open_in_memory()?;
//! let runtime = Arc::new(BollardRuntime::connect()?);
//! let engine = Engine::new(runtime, store, settings);
//! let _ = engine.active_containers().await;
//! # Ok(())
//! # }
//! ```

/// Compile-time build/version metadata.
pub mod build_info;
/// Command-line argument parsing for the daemon binary.
pub mod cli;
/// Config loading, defaults, and environment overrides.
pub mod config;
/// Docker exec-stream frame decoding (the documented multiplexed wire format).
pub mod demux;
/// The execution engine: container lifecycle orchestration and the runtime seam.
pub mod engine;
/// Error types used across crate modules.
pub mod error;
/// Axum HTTP surface: routes, DTOs, and the adapter re-shaping layer.
pub mod http;
/// Short opaque id generation for sessions and files.
pub mod id;
/// Per-image pull coordination.
pub mod image;
/// Background periodic metadata/file cleanup.
pub mod reaper;
/// Pre/post execution directory snapshotting and diffing.
pub mod snapshot;
/// SQLite-backed file metadata store.
pub mod store;
