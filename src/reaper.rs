//! Background cleanup loop: periodically reaps metadata rows (and their
//! backing files) older than the configured retention window.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::store::MetadataStore;

/// Handle to a running reaper task. Dropping it does not stop the task —
/// call [`ReaperHandle::stop`] for a graceful shutdown, matching the
/// teardown pattern the rest of the crate uses for background work.
pub struct ReaperHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl ReaperHandle {
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.join.await;
    }
}

/// Spawn the periodic reaper: every `run_interval`, delete rows (and their
/// backing file on disk) whose `last_modified` is older than `max_age`.
pub fn spawn(store: MetadataStore, upload_root: PathBuf, run_interval: Duration, max_age: Duration) -> ReaperHandle {
    let (stop_tx, mut stop_rx) = oneshot::channel();
    let max_age_chrono = ChronoDuration::from_std(max_age).unwrap_or_else(|_| ChronoDuration::seconds(0));

    let join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(run_interval);
        // The first tick fires immediately; skip it so we don't reap on
        // the very instant the service starts.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = &mut stop_rx => {
                    tracing::info!("reaper shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    run_once(&store, &upload_root, max_age_chrono).await;
                }
            }
        }
    });

    ReaperHandle {
        stop_tx: Some(stop_tx),
        join,
    }
}

async fn run_once(store: &MetadataStore, upload_root: &std::path::Path, max_age: ChronoDuration) {
    let reaped = match store.reap(max_age).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(error = %e, "reaper: failed to query expired rows");
            return;
        }
    };

    if reaped.is_empty() {
        return;
    }
    tracing::info!(count = reaped.len(), "reaper: removing expired files");

    for record in &reaped {
        let path = upload_root.join(&record.filepath);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "reaper: failed to remove file from disk");
            }
        }
    }

    // Best-effort: remove now-empty session directories. A directory that
    // still has other files in it simply fails `remove_dir` and is skipped.
    let mut session_dirs: std::collections::HashSet<PathBuf> = std::collections::HashSet::new();
    for record in &reaped {
        if let Some(parent) = upload_root.join(&record.filepath).parent() {
            session_dirs.insert(parent.to_path_buf());
        }
    }
    for dir in session_dirs {
        let _ = tokio::fs::remove_dir(&dir).await;
    }
}
