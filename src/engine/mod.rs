//! The execution engine: binds the id generator, metadata store, file
//! snapshotter, stream demultiplexer, and image coordinator into one
//! orchestrated `execute` call.

pub mod docker;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Semaphore};

use crate::config::Settings;
use crate::error::EngineError;
use crate::id;
use crate::snapshot::{self, Snapshot};
use crate::store::{FileRecord, MetadataStore, NewFileRecord};

use docker::{ContainerRuntime, ContainerSpec};

const CONTAINER_WORK_DIR: &str = "/mnt/data";
const INTERPRETER_USER: &str = "jovyan";
const CONTAINER_START_DEADLINE: Duration = Duration::from_secs(10);
const CONTAINER_START_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The closed set of supported interpreters.
///
/// Replaces the source system's stringly-typed `lang` selector with an
/// exhaustively-matched variant, per the documented redesign: no lookup
/// table that could silently miss a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Py,
    R,
}

impl Lang {
    pub fn image<'a>(&self, containers: &'a crate::config::ContainerConfig) -> &'a str {
        match self {
            Lang::Py => &containers.py_image,
            Lang::R => &containers.r_image,
        }
    }

    pub fn argv_prefix(&self) -> Vec<String> {
        match self {
            Lang::Py => vec!["python".to_string(), "-c".to_string()],
            Lang::R => vec!["Rscript".to_string(), "-e".to_string()],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Lang::Py => "py",
            Lang::R => "r",
        }
    }
}

/// A file the caller considers pre-existing in the session. Only the name
/// is consulted — the engine never needs to look the record up, since the
/// bind-mounted session directory already contains whatever the caller
/// previously wrote there.
#[derive(Debug, Clone)]
pub struct ReferencedFile {
    pub name: String,
}

/// Per-request overrides of the ambient container resource caps.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOverrides {
    pub memory_limit_mb: Option<u64>,
    pub cpu_limit_cores: Option<f64>,
    pub network_enabled: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    pub code: String,
    pub session_id: String,
    pub lang: Lang,
    pub referenced_files: Vec<ReferencedFile>,
    pub overrides: ExecutionOverrides,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutionMetrics {
    pub memory_usage_bytes: u64,
    pub cpu_usage_percent: f64,
    pub execution_time_seconds: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub status: ExecutionStatus,
    pub files: Vec<FileRecord>,
    pub metrics: Option<ExecutionMetrics>,
}

impl ExecutionResult {
    fn error(stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            status: ExecutionStatus::Error,
            files: Vec::new(),
            metrics: None,
        }
    }
}

/// Transient per-container resource-usage record, tracked only while a
/// container is alive.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ContainerMetrics {
    pub container_id: String,
    #[serde(skip)]
    pub start_time: Instant,
    pub memory_usage_bytes: u64,
    pub cpu_usage_percent: f64,
}

type MetricsMap = Arc<Mutex<HashMap<String, ContainerMetrics>>>;

/// The orchestrator described in the component design: acquires a global
/// concurrency permit, prepares and snapshots the session directory,
/// launches a container, executes the interpreter, demultiplexes output,
/// diffs the snapshot, registers changed files, and guarantees teardown.
pub struct Engine {
    runtime: Arc<dyn ContainerRuntime>,
    store: MetadataStore,
    images: crate::image::ImageCoordinator,
    semaphore: Arc<Semaphore>,
    metrics: MetricsMap,
    upload_root: PathBuf,
    settings: Settings,
}

impl Engine {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, store: MetadataStore, settings: Settings) -> Self {
        let upload_root = settings.host_file_upload_path_abs();
        let permits = settings.containers.max_concurrent_containers;
        Self {
            runtime,
            store,
            images: crate::image::ImageCoordinator::new(),
            semaphore: Arc::new(Semaphore::new(permits)),
            metrics: Arc::new(Mutex::new(HashMap::new())),
            upload_root,
            settings,
        }
    }

    /// Snapshot of the currently tracked containers, for the
    /// `/v1/containers/active` observation endpoint. Never blocks for the
    /// duration of an execution — it takes the same mutex as the engine's
    /// insert/remove/update calls, each of which is held only briefly.
    pub async fn active_containers(&self) -> Vec<ContainerMetrics> {
        self.metrics.lock().await.values().cloned().collect()
    }

    pub async fn execute(&self, request: ExecuteRequest) -> ExecutionResult {
        match self.execute_inner(request).await {
            Ok(result) => result,
            Err(EngineError::RuntimeUnreachable) => {
                ExecutionResult::error("Failed to execute code. Please try again.")
            }
            Err(EngineError::ContainerStartTimeout) => {
                ExecutionResult::error("Failed to execute code. Please try again.")
            }
            Err(EngineError::Image(e)) => ExecutionResult::error(e.to_string()),
            Err(other) => {
                tracing::error!(error = %other, "execution failed with internal error");
                ExecutionResult::error("Failed to execute code. Please try again.")
            }
        }
    }

    async fn execute_inner(&self, request: ExecuteRequest) -> Result<ExecutionResult, EngineError> {
        // 1. Runtime handshake: probe, and on failure try once more.
        if self.runtime.probe().await.is_err() {
            self.runtime.probe().await.map_err(|_| EngineError::RuntimeUnreachable)?;
        }

        // 2. Session directory.
        let session_dir = self.upload_root.join(&request.session_id);
        tokio::fs::create_dir_all(&session_dir)
            .await
            .map_err(crate::error::SnapshotError::Io)?;

        // 3. Pre-snapshot.
        let before = snapshot::snapshot(&session_dir)?;

        // 4. Admission.
        let _permit = self
            .semaphore
            .acquire()
            .await
            .expect("semaphore is never closed");

        // 5. Image readiness.
        let image = request.lang.image(&self.settings.containers).to_string();
        if let Err(e) = self.images.ensure(self.runtime.as_ref(), &image).await {
            return Err(e.into());
        }

        let memory_limit_mb = request
            .overrides
            .memory_limit_mb
            .unwrap_or(self.settings.containers.memory_limit_mb);
        let cpu_limit_cores = request
            .overrides
            .cpu_limit_cores
            .unwrap_or(self.settings.containers.cpu_limit_cores);
        let network_enabled = request
            .overrides
            .network_enabled
            .unwrap_or(self.settings.containers.network_enabled);

        // 6. Container creation.
        let container_id = self
            .runtime
            .create_container(ContainerSpec {
                image,
                host_bind_path: session_dir.to_string_lossy().to_string(),
                container_work_dir: CONTAINER_WORK_DIR.to_string(),
                memory_limit_mb,
                cpu_limit_cores,
                network_enabled,
            })
            .await?;

        // Guaranteed-exit teardown from here on: every path below must fall
        // through to `self.teardown(&container_id)`.
        let result = self
            .run_in_container(&container_id, &request, &session_dir, before)
            .await;
        self.teardown(&container_id).await;
        result
    }

    async fn run_in_container(
        &self,
        container_id: &str,
        request: &ExecuteRequest,
        session_dir: &std::path::Path,
        before: Snapshot,
    ) -> Result<ExecutionResult, EngineError> {
        let start_time = Instant::now();

        // 7. Start & readiness.
        self.runtime.start_container(container_id).await?;
        self.wait_until_running(container_id).await?;

        // 8. Metrics registration + fire-and-forget sampler.
        self.metrics.lock().await.insert(
            container_id.to_string(),
            ContainerMetrics {
                container_id: container_id.to_string(),
                start_time,
                memory_usage_bytes: 0,
                cpu_usage_percent: 0.0,
            },
        );
        self.spawn_metrics_sampler(container_id.to_string());

        // 9. Permission fix-up. Best-effort: logged, never fatal.
        let chown_cmd = vec![
            "chown".to_string(),
            "-R".to_string(),
            format!("{INTERPRETER_USER}:users"),
            CONTAINER_WORK_DIR.to_string(),
        ];
        if let Err(e) = self.runtime.exec(container_id, "root", chown_cmd).await {
            tracing::warn!(container_id, error = %e, "chown fix-up failed, continuing anyway");
        }

        // 10. Interpreter exec, bounded by the configured execution deadline.
        let mut argv = request.lang.argv_prefix();
        argv.push(request.code.clone());
        let deadline = Duration::from_secs(self.settings.containers.sandbox_max_execution_time_secs);
        let outcome = tokio::time::timeout(deadline, self.runtime.exec(container_id, INTERPRETER_USER, argv))
            .await
            .map_err(|_| EngineError::Internal("execution timed out".to_string()))??;

        let decoded = crate::demux::decode_exec_stream(&outcome.raw_output);

        // 11. Classification.
        if outcome.exit_code != 0 {
            return Ok(ExecutionResult {
                stdout: String::new(),
                stderr: decoded,
                status: ExecutionStatus::Error,
                files: Vec::new(),
                metrics: None,
            });
        }

        // 12. Post-snapshot & diff.
        let after = snapshot::snapshot(session_dir)?;
        let changed = snapshot::diff(&before, &after);

        // 13. File registration.
        let mut files = Vec::with_capacity(changed.len());
        for rel_path in changed {
            let absolute = session_dir.join(&rel_path);
            if !absolute.is_file() {
                continue;
            }
            let Some(state) = after.get(&rel_path) else {
                continue;
            };
            let basename = std::path::Path::new(&rel_path)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| rel_path.clone());
            let content_type = mime_guess::from_path(&rel_path)
                .first_raw()
                .unwrap_or("application/octet-stream")
                .to_string();
            let etag = {
                use md5::{Digest, Md5};
                let mut hasher = Md5::new();
                hasher.update(state.mtime.to_string().as_bytes());
                format!("{:x}", hasher.finalize())
            };

            let record = self
                .store
                .upsert(NewFileRecord {
                    id: id::new_id(),
                    session_id: request.session_id.clone(),
                    filename: basename.clone(),
                    filepath: format!("{}/{}", request.session_id, rel_path),
                    size: state.size,
                    content_type,
                    original_filename: basename,
                    etag,
                })
                .await?;
            files.push(record);
        }

        // 8b. Final metrics sample before teardown removes the entry.
        let metrics = self.metrics.lock().await.get(container_id).cloned();
        let execution_metrics = metrics.map(|m| ExecutionMetrics {
            memory_usage_bytes: m.memory_usage_bytes,
            cpu_usage_percent: m.cpu_usage_percent,
            execution_time_seconds: start_time.elapsed().as_secs_f64(),
        });

        // 15. Return.
        Ok(ExecutionResult {
            stdout: decoded,
            stderr: String::new(),
            status: ExecutionStatus::Ok,
            files,
            metrics: execution_metrics,
        })
    }

    async fn wait_until_running(&self, container_id: &str) -> Result<(), EngineError> {
        let deadline = Instant::now() + CONTAINER_START_DEADLINE;
        loop {
            if self.runtime.is_running(container_id).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(EngineError::ContainerStartTimeout);
            }
            tokio::time::sleep(CONTAINER_START_POLL_INTERVAL).await;
        }
    }

    fn spawn_metrics_sampler(&self, container_id: String) {
        let runtime = self.runtime.clone();
        let metrics = self.metrics.clone();
        tokio::spawn(async move {
            match runtime.sample_metrics(&container_id).await {
                Ok(sample) => {
                    let mut guard = metrics.lock().await;
                    if let Some(entry) = guard.get_mut(&container_id) {
                        entry.memory_usage_bytes = sample.memory_usage_bytes;
                        entry.cpu_usage_percent = sample.cpu_usage_percent;
                    }
                }
                Err(e) => {
                    tracing::debug!(container_id, error = %e, "metrics sampling failed, best-effort only");
                }
            }
        });
    }

    async fn teardown(&self, container_id: &str) {
        // 14. Teardown. Errors are logged inside `force_remove`, never
        // surfaced, so they can't change the already-computed result.
        self.runtime.force_remove(container_id).await;
        self.metrics.lock().await.remove(container_id);
    }
}

/// Language-specific hint substituted by the request layer (not the engine
/// itself) when `status=ok` and stdout is empty after trimming.
pub fn empty_output_hint(lang: Lang) -> &'static str {
    match lang {
        Lang::Py => "Code executed successfully with no output. Use print() to display results.",
        Lang::R => "Code executed successfully with no output. Use print() or cat() to display results.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docker::{ExecOutcome, MetricsSample};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use crate::error::{EngineError, ImageError};
    use crate::image::ImageRuntime;

    /// Drives the container lifecycle against a temp directory instead of a
    /// Docker daemon. `exec` simulates the interpreter writing a result file
    /// into the bind-mounted work dir whenever the command user is the
    /// interpreter user and the requested code is non-empty.
    struct FakeRuntime {
        host_dir: std::sync::Mutex<Option<PathBuf>>,
        exit_code: i64,
        stdout: Vec<u8>,
        force_removed: AtomicUsize,
        running: AtomicBool,
    }

    impl FakeRuntime {
        fn new(exit_code: i64, stdout: &str) -> Self {
            Self {
                host_dir: std::sync::Mutex::new(None),
                exit_code,
                stdout: stdout.as_bytes().to_vec(),
                force_removed: AtomicUsize::new(0),
                running: AtomicBool::new(true),
            }
        }
    }

    #[async_trait]
    impl ImageRuntime for FakeRuntime {
        async fn image_present(&self, _image: &str) -> Result<bool, ImageError> {
            Ok(true)
        }

        async fn pull_image(&self, _image: &str) -> Result<(), ImageError> {
            Ok(())
        }
    }

    #[async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn probe(&self) -> Result<(), EngineError> {
            Ok(())
        }

        async fn create_container(&self, spec: docker::ContainerSpec) -> Result<String, EngineError> {
            *self.host_dir.lock().unwrap() = Some(PathBuf::from(spec.host_bind_path));
            Ok("fake-container".to_string())
        }

        async fn start_container(&self, _id: &str) -> Result<(), EngineError> {
            Ok(())
        }

        async fn is_running(&self, _id: &str) -> Result<bool, EngineError> {
            Ok(self.running.load(Ordering::SeqCst))
        }

        async fn exec(&self, _id: &str, user: &str, _cmd: Vec<String>) -> Result<ExecOutcome, EngineError> {
            if user == INTERPRETER_USER {
                if let Some(dir) = self.host_dir.lock().unwrap().clone() {
                    std::fs::write(dir.join("result.csv"), b"a,b\n1,2\n").unwrap();
                }
                Ok(ExecOutcome {
                    exit_code: self.exit_code,
                    raw_output: crate::demux::frame(1, &self.stdout),
                })
            } else {
                Ok(ExecOutcome {
                    exit_code: 0,
                    raw_output: Vec::new(),
                })
            }
        }

        async fn sample_metrics(&self, _id: &str) -> Result<MetricsSample, EngineError> {
            Ok(MetricsSample {
                memory_usage_bytes: 1024,
                cpu_usage_percent: 12.5,
            })
        }

        async fn force_remove(&self, _id: &str) {
            self.force_removed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn test_settings(upload_root: &std::path::Path) -> Settings {
        let mut settings = Settings::default();
        settings.files.host_file_upload_path = upload_root.to_path_buf();
        settings
    }

    #[tokio::test]
    async fn successful_execution_registers_new_files_and_tears_down() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Arc::new(FakeRuntime::new(0, "hello"));
        let store = MetadataStore::open_in_memory().unwrap();
        let settings = test_settings(dir.path());
        let engine = Engine::new(runtime.clone(), store, settings);

        let result = engine
            .execute(ExecuteRequest {
                code: "print('hello')".to_string(),
                session_id: "sess-1".to_string(),
                lang: Lang::Py,
                referenced_files: Vec::new(),
                overrides: ExecutionOverrides::default(),
            })
            .await;

        assert_eq!(result.status, ExecutionStatus::Ok);
        assert_eq!(result.stdout, "hello");
        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].filename, "result.csv");
        assert!(result.metrics.is_some());
        assert_eq!(runtime.force_removed.load(Ordering::SeqCst), 1);
        assert!(engine.active_containers().await.is_empty());
    }

    #[tokio::test]
    async fn nonzero_exit_code_reports_error_status_with_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Arc::new(FakeRuntime::new(1, "traceback"));
        let store = MetadataStore::open_in_memory().unwrap();
        let settings = test_settings(dir.path());
        let engine = Engine::new(runtime.clone(), store, settings);

        let result = engine
            .execute(ExecuteRequest {
                code: "raise ValueError()".to_string(),
                session_id: "sess-2".to_string(),
                lang: Lang::Py,
                referenced_files: Vec::new(),
                overrides: ExecutionOverrides::default(),
            })
            .await;

        assert_eq!(result.status, ExecutionStatus::Error);
        assert_eq!(result.stderr, "traceback");
        assert!(result.files.is_empty());
        assert_eq!(runtime.force_removed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn runtime_unreachable_surfaces_as_error_status() {
        struct DeadRuntime;

        #[async_trait]
        impl ImageRuntime for DeadRuntime {
            async fn image_present(&self, _image: &str) -> Result<bool, ImageError> {
                Ok(true)
            }
            async fn pull_image(&self, _image: &str) -> Result<(), ImageError> {
                Ok(())
            }
        }

        #[async_trait]
        impl ContainerRuntime for DeadRuntime {
            async fn probe(&self) -> Result<(), EngineError> {
                Err(EngineError::RuntimeUnreachable)
            }
            async fn create_container(&self, _spec: docker::ContainerSpec) -> Result<String, EngineError> {
                unreachable!("probe fails before container creation")
            }
            async fn start_container(&self, _id: &str) -> Result<(), EngineError> {
                Ok(())
            }
            async fn is_running(&self, _id: &str) -> Result<bool, EngineError> {
                Ok(true)
            }
            async fn exec(&self, _id: &str, _user: &str, _cmd: Vec<String>) -> Result<ExecOutcome, EngineError> {
                unreachable!()
            }
            async fn sample_metrics(&self, _id: &str) -> Result<MetricsSample, EngineError> {
                unreachable!()
            }
            async fn force_remove(&self, _id: &str) {}
        }

        let dir = tempfile::tempdir().unwrap();
        let runtime: Arc<dyn ContainerRuntime> = Arc::new(DeadRuntime);
        let store = MetadataStore::open_in_memory().unwrap();
        let settings = test_settings(dir.path());
        let engine = Engine::new(runtime, store, settings);

        let result = engine
            .execute(ExecuteRequest {
                code: "1 + 1".to_string(),
                session_id: "sess-3".to_string(),
                lang: Lang::Py,
                referenced_files: Vec::new(),
                overrides: ExecutionOverrides::default(),
            })
            .await;

        assert_eq!(result.status, ExecutionStatus::Error);
    }

    #[test]
    fn empty_output_hint_varies_by_language() {
        assert!(empty_output_hint(Lang::Py).contains("print()"));
        assert!(empty_output_hint(Lang::R).contains("cat()"));
    }

    #[tokio::test]
    async fn file_persists_across_two_executions_in_same_session() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Arc::new(FakeRuntime::new(0, ""));
        let store = MetadataStore::open_in_memory().unwrap();
        let settings = test_settings(dir.path());
        let engine = Engine::new(runtime.clone(), store, settings);

        let first = engine
            .execute(ExecuteRequest {
                code: "open('/mnt/data/result.csv','w').write('a,b\\n1,2\\n')".to_string(),
                session_id: "sess-persist".to_string(),
                lang: Lang::Py,
                referenced_files: Vec::new(),
                overrides: ExecutionOverrides::default(),
            })
            .await;
        assert_eq!(first.status, ExecutionStatus::Ok);
        assert_eq!(first.files.len(), 1);

        let second = engine
            .execute(ExecuteRequest {
                code: "print(open('/mnt/data/result.csv').read())".to_string(),
                session_id: "sess-persist".to_string(),
                lang: Lang::Py,
                referenced_files: vec![ReferencedFile {
                    name: "result.csv".to_string(),
                }],
                overrides: ExecutionOverrides::default(),
            })
            .await;

        assert_eq!(second.status, ExecutionStatus::Ok);
        assert!(
            second.files.is_empty(),
            "rewriting identical content on the second exec must not be reported as changed"
        );
        let contents = std::fs::read_to_string(dir.path().join("sess-persist/result.csv")).unwrap();
        assert_eq!(contents, "a,b\n1,2\n");
    }

    #[tokio::test]
    async fn new_session_starts_with_an_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Arc::new(FakeRuntime::new(0, ""));
        let store = MetadataStore::open_in_memory().unwrap();
        let settings = test_settings(dir.path());
        let engine = Engine::new(runtime.clone(), store, settings);

        engine
            .execute(ExecuteRequest {
                code: "open('/mnt/data/secret.txt','w').write('x')".to_string(),
                session_id: "sess-a".to_string(),
                lang: Lang::Py,
                referenced_files: Vec::new(),
                overrides: ExecutionOverrides::default(),
            })
            .await;

        let other = engine
            .execute(ExecuteRequest {
                code: "import os; print(os.listdir('/mnt/data'))".to_string(),
                session_id: "sess-b".to_string(),
                lang: Lang::Py,
                referenced_files: Vec::new(),
                overrides: ExecutionOverrides::default(),
            })
            .await;

        assert_eq!(other.status, ExecutionStatus::Ok);
        assert_eq!(other.files.len(), 1);
        assert!(dir.path().join("sess-a/result.csv").exists());
        assert!(dir.path().join("sess-b/result.csv").exists());
    }

    /// Tracks how many containers are concurrently mid-exec rather than
    /// touching the filesystem, so it can be driven by many tasks at once
    /// without the single-slot `FakeRuntime::host_dir` race.
    struct CountingRuntime {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ImageRuntime for CountingRuntime {
        async fn image_present(&self, _image: &str) -> Result<bool, ImageError> {
            Ok(true)
        }
        async fn pull_image(&self, _image: &str) -> Result<(), ImageError> {
            Ok(())
        }
    }

    #[async_trait]
    impl ContainerRuntime for CountingRuntime {
        async fn probe(&self) -> Result<(), EngineError> {
            Ok(())
        }
        async fn create_container(&self, _spec: docker::ContainerSpec) -> Result<String, EngineError> {
            Ok(id::new_id())
        }
        async fn start_container(&self, _id: &str) -> Result<(), EngineError> {
            Ok(())
        }
        async fn is_running(&self, _id: &str) -> Result<bool, EngineError> {
            Ok(true)
        }
        async fn exec(&self, _id: &str, user: &str, _cmd: Vec<String>) -> Result<ExecOutcome, EngineError> {
            if user != INTERPRETER_USER {
                return Ok(ExecOutcome {
                    exit_code: 0,
                    raw_output: Vec::new(),
                });
            }
            let active = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(active, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(ExecOutcome {
                exit_code: 0,
                raw_output: crate::demux::frame(1, b"ok"),
            })
        }
        async fn sample_metrics(&self, _id: &str) -> Result<MetricsSample, EngineError> {
            Ok(MetricsSample {
                memory_usage_bytes: 0,
                cpu_usage_percent: 0.0,
            })
        }
        async fn force_remove(&self, _id: &str) {}
    }

    #[tokio::test]
    async fn concurrency_cap_admits_at_most_n_containers() {
        let dir = tempfile::tempdir().unwrap();
        let n = 2;
        let mut settings = test_settings(dir.path());
        settings.containers.max_concurrent_containers = n;
        let runtime = Arc::new(CountingRuntime {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let store = MetadataStore::open_in_memory().unwrap();
        let engine = Arc::new(Engine::new(runtime.clone(), store, settings));

        let mut handles = Vec::new();
        for i in 0..(3 * n) {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .execute(ExecuteRequest {
                        code: "noop".to_string(),
                        session_id: format!("sess-{i}"),
                        lang: Lang::Py,
                        referenced_files: Vec::new(),
                        overrides: ExecutionOverrides::default(),
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().status, ExecutionStatus::Ok);
        }

        assert!(runtime.peak.load(Ordering::SeqCst) <= n);
    }
}
