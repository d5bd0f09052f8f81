//! The `/v1/adapter/...` re-shaping surface: same operations as the core
//! API, wrapped in an `X-Api-Key` check and a renamed response shape for a
//! downstream chat client. Non-core policy, kept deliberately thin.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use super::dto::ExecuteRequestDto;
use super::AppState;

const API_KEY_HEADER: &str = "x-api-key";

pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.settings.api_key.as_deref() else {
        // No API key configured: adapter enforcement is disabled.
        return next.run(req).await;
    };

    let provided = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v: &HeaderValue| v.to_str().ok());

    match provided {
        Some(key) if key == expected => next.run(req).await,
        _ => (StatusCode::UNAUTHORIZED, "missing or invalid X-Api-Key").into_response(),
    }
}

/// Adapter-shaped execution result: the chat client expects `output`/`error`
/// fields rather than the core's `run.stdout`/`run.stderr` split.
#[derive(Debug, Serialize)]
struct AdapterExecuteResponse {
    output: String,
    error: Option<String>,
    session_id: String,
}

pub async fn execute(State(state): State<Arc<AppState>>, Json(body): Json<ExecuteRequestDto>) -> Response {
    let session_id = body.session_id.clone().unwrap_or_else(crate::id::new_id);
    let lang = body.lang;
    let request = crate::engine::ExecuteRequest {
        code: body.code,
        session_id: session_id.clone(),
        lang: body.lang,
        referenced_files: body
            .files
            .into_iter()
            .map(|f| crate::engine::ReferencedFile { name: f.name })
            .collect(),
        overrides: crate::engine::ExecutionOverrides {
            memory_limit_mb: body.memory_limit_mb,
            cpu_limit_cores: body.cpu_limit_cores,
            network_enabled: body.network_enabled,
        },
    };

    let result = state.engine.execute(request).await;
    let response = match result.status {
        crate::engine::ExecutionStatus::Ok => {
            let output = if result.stdout.trim().is_empty() {
                crate::engine::empty_output_hint(lang).to_string()
            } else {
                result.stdout
            };
            AdapterExecuteResponse {
                output,
                error: None,
                session_id,
            }
        }
        crate::engine::ExecutionStatus::Error => AdapterExecuteResponse {
            output: String::new(),
            error: Some(result.stderr),
            session_id,
        },
    };
    Json(response).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_response_serializes_error_branch_without_output() {
        let response = AdapterExecuteResponse {
            output: String::new(),
            error: Some("boom".to_string()),
            session_id: "s1".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["error"], "boom");
        assert_eq!(json["output"], "");
    }
}
