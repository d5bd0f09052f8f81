//! Axum HTTP surface: the non-core collaborator that turns already-parsed
//! requests into calls against `engine`/`store` and serializes the result.

pub mod adapter;
pub mod dto;
pub mod handlers;

use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Settings;
use crate::engine::Engine;
use crate::store::MetadataStore;

/// Shared state handed to every handler. Cheap to clone (everything inside
/// is already an `Arc`/cheaply-cloneable handle), so it's wrapped in one
/// outer `Arc` for axum's `State` extractor rather than per-field `Arc`s.
pub struct AppState {
    pub engine: Engine,
    pub store: MetadataStore,
    pub settings: Settings,
    pub upload_root: PathBuf,
}

impl AppState {
    pub fn engine_store(&self) -> &MetadataStore {
        &self.store
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let api_prefix = state.settings.server.api_prefix.clone();

    let api_routes = Router::new()
        .route("/execute", post(handlers::execute))
        .route("/files/:session_id", get(handlers::list_files))
        .route(
            "/files/:session_id/:file_id",
            get(handlers::get_file).delete(handlers::delete_file),
        )
        .route("/download/:session_id/:file_id", get(handlers::download_file))
        .route("/upload/:session_id", post(handlers::upload_file))
        .route("/containers/active", get(handlers::containers_active));

    let adapter_routes = Router::new()
        .route("/execute", post(adapter::execute))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            adapter::require_api_key,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .nest(&api_prefix, api_routes)
        .nest(&format!("{api_prefix}/adapter"), adapter_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
