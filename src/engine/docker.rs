//! Container runtime seam and its `bollard`-backed (Docker Engine API)
//! implementation.

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, RemoveContainerOptions, StartContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use bollard::Docker;
use futures_util::StreamExt;

use crate::demux;
use crate::error::{EngineError, ImageError};
use crate::image::ImageRuntime;

/// One-shot resource-usage sample for a running container.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSample {
    pub memory_usage_bytes: u64,
    pub cpu_usage_percent: f64,
}

/// Bind mount + resource caps for a fresh container.
pub struct ContainerSpec {
    pub image: String,
    pub host_bind_path: String,
    pub container_work_dir: String,
    pub memory_limit_mb: u64,
    pub cpu_limit_cores: f64,
    pub network_enabled: bool,
}

/// Result of one `exec` call: exit code plus the raw multiplexed-frame
/// bytes, reframed into the documented wire format so
/// [`crate::demux::decode_exec_stream`] is the single decoder regardless of
/// which client produced the bytes.
pub struct ExecOutcome {
    pub exit_code: i64,
    pub raw_output: Vec<u8>,
}

/// Abstraction over container lifecycle operations, so the engine's
/// orchestration can be exercised against a fake in tests without a Docker
/// daemon — the same seam the teacher crate draws between its agent loop
/// and `ExecutionBackendOps`/`CommandBackend`.
#[async_trait]
pub trait ContainerRuntime: ImageRuntime {
    /// Lightweight liveness probe (a version call).
    async fn probe(&self) -> Result<(), EngineError>;
    async fn create_container(&self, spec: ContainerSpec) -> Result<String, EngineError>;
    async fn start_container(&self, id: &str) -> Result<(), EngineError>;
    async fn is_running(&self, id: &str) -> Result<bool, EngineError>;
    async fn exec(&self, id: &str, user: &str, cmd: Vec<String>) -> Result<ExecOutcome, EngineError>;
    async fn sample_metrics(&self, id: &str) -> Result<MetricsSample, EngineError>;
    /// Force-remove a container. Best-effort: failures are logged by the
    /// caller, never propagated, since teardown must never block the
    /// response on a cleanup error.
    async fn force_remove(&self, id: &str);
}

/// `ContainerRuntime`/`ImageRuntime` implementation backed by the real
/// Docker Engine API via `bollard`.
pub struct BollardRuntime {
    docker: Docker,
}

impl BollardRuntime {
    pub fn connect() -> Result<Self, EngineError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| EngineError::Internal(format!("docker connect: {e}")))?;
        Ok(Self { docker })
    }
}

#[async_trait]
impl ImageRuntime for BollardRuntime {
    async fn image_present(&self, image: &str) -> Result<bool, ImageError> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(ImageError::Runtime(e.to_string())),
        }
    }

    async fn pull_image(&self, image: &str) -> Result<(), ImageError> {
        let options = Some(CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        });
        let mut stream = self.docker.create_image(options, None, None);
        while let Some(progress) = stream.next().await {
            if let Err(e) = progress {
                return Err(ImageError::Runtime(format!("pulling {image}: {e}")));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for BollardRuntime {
    async fn probe(&self) -> Result<(), EngineError> {
        self.docker
            .version()
            .await
            .map(|_| ())
            .map_err(|_| EngineError::RuntimeUnreachable)
    }

    async fn create_container(&self, spec: ContainerSpec) -> Result<String, EngineError> {
        let network_mode = if spec.network_enabled {
            None
        } else {
            Some("none".to_string())
        };
        let host_config = HostConfig {
            binds: Some(vec![format!(
                "{}:{}",
                spec.host_bind_path, spec.container_work_dir
            )]),
            memory: Some((spec.memory_limit_mb * 1024 * 1024) as i64),
            nano_cpus: Some((spec.cpu_limit_cores * 1_000_000_000.0).floor() as i64),
            network_mode,
            ..Default::default()
        };
        let config = Config {
            image: Some(spec.image),
            cmd: Some(vec!["sleep".to_string(), "infinity".to_string()]),
            working_dir: Some(spec.container_work_dir),
            host_config: Some(host_config),
            ..Default::default()
        };
        let response = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, config)
            .await
            .map_err(|e| EngineError::Internal(format!("create container: {e}")))?;
        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<(), EngineError> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| EngineError::Internal(format!("start container: {e}")))
    }

    async fn is_running(&self, id: &str) -> Result<bool, EngineError> {
        let inspect = self
            .docker
            .inspect_container(id, None)
            .await
            .map_err(|e| EngineError::Internal(format!("inspect container: {e}")))?;
        Ok(inspect
            .state
            .and_then(|s| s.running)
            .unwrap_or(false))
    }

    async fn exec(&self, id: &str, user: &str, cmd: Vec<String>) -> Result<ExecOutcome, EngineError> {
        let exec = self
            .docker
            .create_exec(
                id,
                CreateExecOptions {
                    cmd: Some(cmd),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    user: Some(user.to_string()),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| EngineError::Internal(format!("create exec: {e}")))?;

        let mut raw_output = Vec::new();
        match self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| EngineError::Internal(format!("start exec: {e}")))?
        {
            StartExecResults::Attached { mut output, .. } => {
                while let Some(chunk) = output.next().await {
                    let chunk = chunk.map_err(|e| EngineError::Internal(format!("exec stream: {e}")))?;
                    let (kind, bytes) = match chunk {
                        bollard::container::LogOutput::StdOut { message } => (1u8, message),
                        bollard::container::LogOutput::StdErr { message } => (2u8, message),
                        bollard::container::LogOutput::StdIn { message } => (0u8, message),
                        bollard::container::LogOutput::Console { message } => (1u8, message),
                    };
                    raw_output.extend(demux::frame(kind, &bytes));
                }
            }
            StartExecResults::Detached => {}
        }

        let inspect = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(|e| EngineError::Internal(format!("inspect exec: {e}")))?;
        let exit_code = inspect.exit_code.unwrap_or(-1);

        Ok(ExecOutcome {
            exit_code,
            raw_output,
        })
    }

    async fn sample_metrics(&self, id: &str) -> Result<MetricsSample, EngineError> {
        use bollard::container::StatsOptions;
        let mut stream = self.docker.stats(
            id,
            Some(StatsOptions {
                stream: false,
                one_shot: true,
            }),
        );
        let stats = stream
            .next()
            .await
            .ok_or_else(|| EngineError::Internal("no stats sample returned".into()))?
            .map_err(|e| EngineError::Internal(format!("stats: {e}")))?;

        let memory_usage_bytes = stats.memory_stats.usage.unwrap_or(0);

        let cpu_delta = stats
            .cpu_stats
            .cpu_usage
            .total_usage
            .saturating_sub(stats.precpu_stats.cpu_usage.total_usage);
        let system_delta = stats
            .cpu_stats
            .system_cpu_usage
            .unwrap_or(0)
            .saturating_sub(stats.precpu_stats.system_cpu_usage.unwrap_or(0));
        let online_cpus = stats.cpu_stats.online_cpus.unwrap_or(1).max(1) as f64;
        let cpu_usage_percent = if system_delta > 0 {
            (cpu_delta as f64 / system_delta as f64) * online_cpus * 100.0
        } else {
            0.0
        };

        Ok(MetricsSample {
            memory_usage_bytes,
            cpu_usage_percent,
        })
    }

    async fn force_remove(&self, id: &str) {
        let result = self
            .docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await;
        if let Err(e) = result {
            tracing::warn!(container_id = id, error = %e, "container teardown failed");
        }
    }
}
