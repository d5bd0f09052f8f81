//! Request/response wire shapes for the HTTP surface. No business logic
//! lives here — handlers translate to/from `engine`/`store` types.

use serde::{Deserialize, Serialize};

use crate::engine::{ExecutionMetrics, ExecutionStatus, Lang};
use crate::store::FileRecord;

#[derive(Debug, Deserialize)]
pub struct ExecuteRequestDto {
    pub code: String,
    pub lang: Lang,
    pub session_id: Option<String>,
    #[serde(default)]
    pub files: Vec<ReferencedFileDto>,
    pub memory_limit_mb: Option<u64>,
    pub cpu_limit_cores: Option<f64>,
    pub network_enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ReferencedFileDto {
    #[allow(dead_code)]
    pub id: Option<String>,
    #[allow(dead_code)]
    pub session_id: Option<String>,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponseDto {
    pub run: RunDto,
    pub language: String,
    pub version: String,
    pub session_id: String,
    pub files: Vec<FileRefDto>,
}

#[derive(Debug, Serialize)]
pub struct RunDto {
    pub stdout: String,
    pub stderr: String,
    pub status: ExecutionStatus,
    pub metrics: Option<ExecutionMetrics>,
}

#[derive(Debug, Serialize)]
pub struct FileRefDto {
    pub id: String,
    pub name: String,
    pub path: Option<String>,
}

impl From<&FileRecord> for FileRefDto {
    fn from(record: &FileRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.filename.clone(),
            path: Some(record.filepath.clone()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FileMetadataDto {
    pub id: String,
    pub session_id: String,
    pub filename: String,
    pub size: u64,
    pub content_type: String,
    pub etag: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_modified: chrono::DateTime<chrono::Utc>,
}

impl From<FileRecord> for FileMetadataDto {
    fn from(record: FileRecord) -> Self {
        Self {
            id: record.id,
            session_id: record.session_id,
            filename: record.filename,
            size: record.size,
            content_type: record.content_type,
            etag: record.etag,
            created_at: record.created_at,
            last_modified: record.last_modified,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ContainerMetricsDto {
    pub container_id: String,
    pub memory_usage_bytes: u64,
    pub cpu_usage_percent: f64,
    pub uptime_seconds: f64,
}

impl From<&crate::engine::ContainerMetrics> for ContainerMetricsDto {
    fn from(m: &crate::engine::ContainerMetrics) -> Self {
        Self {
            container_id: m.container_id.clone(),
            memory_usage_bytes: m.memory_usage_bytes,
            cpu_usage_percent: m.cpu_usage_percent,
            uptime_seconds: m.start_time.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponseDto {
    pub file: FileMetadataDto,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponseDto {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthDto {
    pub status: &'static str,
    pub version: String,
}
