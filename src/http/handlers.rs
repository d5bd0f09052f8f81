//! Axum handlers. Each one parses its DTO, calls into `engine`/`store`, and
//! maps the result back to a DTO and status code — no orchestration logic
//! lives here.

use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::engine::{ExecuteRequest, ExecutionOverrides, ReferencedFile};
use crate::store::NewFileRecord;

use super::dto::{
    ContainerMetricsDto, ErrorResponseDto, ExecuteRequestDto, ExecuteResponseDto, FileMetadataDto,
    FileRefDto, HealthDto, RunDto, UploadResponseDto,
};
use super::AppState;

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponseDto { error: message.into() })).into_response()
}

pub async fn health(State(_state): State<Arc<AppState>>) -> Json<HealthDto> {
    Json(HealthDto {
        status: "ok",
        version: crate::build_info::VERSION.to_string(),
    })
}

pub async fn execute(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExecuteRequestDto>,
) -> Response {
    let session_id = body
        .session_id
        .clone()
        .unwrap_or_else(crate::id::new_id);
    let lang = body.lang;
    let lang_str = lang.as_str().to_string();

    let request = ExecuteRequest {
        code: body.code,
        session_id: session_id.clone(),
        lang: body.lang,
        referenced_files: body
            .files
            .into_iter()
            .map(|f| ReferencedFile { name: f.name })
            .collect(),
        overrides: ExecutionOverrides {
            memory_limit_mb: body.memory_limit_mb,
            cpu_limit_cores: body.cpu_limit_cores,
            network_enabled: body.network_enabled,
        },
    };

    let mut result = state.engine.execute(request).await;
    if result.status == crate::engine::ExecutionStatus::Ok && result.stdout.trim().is_empty() {
        result.stdout = crate::engine::empty_output_hint(lang).to_string();
    }
    let response = ExecuteResponseDto {
        run: RunDto {
            stdout: result.stdout,
            stderr: result.stderr,
            status: result.status,
            metrics: result.metrics,
        },
        language: lang_str,
        version: crate::build_info::VERSION.to_string(),
        session_id,
        files: result.files.iter().map(FileRefDto::from).collect(),
    };
    Json(response).into_response()
}

pub async fn list_files(State(state): State<Arc<AppState>>, Path(session_id): Path<String>) -> Response {
    match state.engine_store().list(&session_id).await {
        Ok(records) => Json(
            records
                .into_iter()
                .map(FileMetadataDto::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path((session_id, file_id)): Path<(String, String)>,
) -> Response {
    match state.engine_store().get(&session_id, &file_id).await {
        Ok(record) => Json(FileMetadataDto::from(record)).into_response(),
        Err(crate::error::StoreError::NotFound) => error_response(StatusCode::NOT_FOUND, "file not found"),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path((session_id, file_id)): Path<(String, String)>,
) -> Response {
    match state.engine_store().delete(&session_id, &file_id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_response(StatusCode::NOT_FOUND, "file not found"),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path((session_id, file_id)): Path<(String, String)>,
) -> Response {
    let record = match state.engine_store().get(&session_id, &file_id).await {
        Ok(record) => record,
        Err(crate::error::StoreError::NotFound) => {
            return error_response(StatusCode::NOT_FOUND, "file not found")
        }
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let path = state.upload_root.join(&record.filepath);
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            [(axum::http::header::CONTENT_TYPE, record.content_type.clone())],
            bytes,
        )
            .into_response(),
        Err(_) => error_response(StatusCode::NOT_FOUND, "file content missing on disk"),
    }
}

pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    mut multipart: Multipart,
) -> Response {
    let field = match multipart.next_field().await {
        Ok(Some(field)) => field,
        Ok(None) => return error_response(StatusCode::BAD_REQUEST, "missing file field"),
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let original_filename = field.file_name().unwrap_or("upload.bin").to_string();
    let extension = std::path::Path::new(&original_filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if !state.settings.files.allowed_extensions.iter().any(|e| e == &extension) {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, format!("extension .{extension} not allowed"));
    }

    let bytes = match field.bytes().await {
        Ok(b) => b,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };
    if bytes.len() as u64 > state.settings.files.max_upload_size_bytes {
        return error_response(StatusCode::PAYLOAD_TOO_LARGE, "file exceeds maximum upload size");
    }

    let session_dir = state.upload_root.join(&session_id);
    if let Err(e) = tokio::fs::create_dir_all(&session_dir).await {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }
    let dest = session_dir.join(&original_filename);
    if let Err(e) = tokio::fs::write(&dest, &bytes).await {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    let content_type = mime_guess::from_path(&original_filename)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string();
    let etag = {
        use md5::{Digest, Md5};
        let mut hasher = Md5::new();
        hasher.update(&bytes);
        format!("{:x}", hasher.finalize())
    };

    let record = state
        .engine_store()
        .upsert(NewFileRecord {
            id: crate::id::new_id(),
            session_id: session_id.clone(),
            filename: original_filename.clone(),
            filepath: format!("{session_id}/{original_filename}"),
            size: bytes.len() as u64,
            content_type,
            original_filename,
            etag,
        })
        .await;

    match record {
        Ok(record) => Json(UploadResponseDto {
            file: FileMetadataDto::from(record),
        })
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn containers_active(State(state): State<Arc<AppState>>) -> Json<Vec<ContainerMetricsDto>> {
    let containers = state.engine.active_containers().await;
    Json(containers.iter().map(ContainerMetricsDto::from).collect())
}
