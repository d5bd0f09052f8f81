//! Per-image single-flight pull coordination.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::ImageError;

/// Narrow seam over the container runtime's image inspect/pull calls, so
/// the coordination algorithm can be exercised without a Docker daemon.
#[async_trait]
pub trait ImageRuntime: Send + Sync {
    /// `Ok(true)` if present locally, `Ok(false)` if definitively absent.
    async fn image_present(&self, image: &str) -> Result<bool, ImageError>;
    async fn pull_image(&self, image: &str) -> Result<(), ImageError>;
}

/// Ensures a named image is present locally, serialising concurrent pulls
/// for the same image behind a per-image lock. Distinct images pull in
/// parallel; at most one pull is ever in flight for a given image.
pub struct ImageCoordinator {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Default for ImageCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCoordinator {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Return (creating if absent) the lock bound to `image`.
    async fn lock_for(&self, image: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(image.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Ensure `image` is present locally, pulling it if necessary.
    pub async fn ensure(&self, runtime: &dyn ImageRuntime, image: &str) -> Result<(), ImageError> {
        if runtime.image_present(image).await? {
            return Ok(());
        }

        let lock = self.lock_for(image).await;
        let _guard = lock.lock().await;

        // Another waiter may have pulled it while we were queued for the lock.
        if runtime.image_present(image).await? {
            return Ok(());
        }

        tracing::info!(image, "pulling container image");
        runtime.pull_image(image).await
    }
}
