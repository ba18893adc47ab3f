//! Render pool
//!
//! Bounds how many renderer processes run at once across all in-flight
//! requests. Requests over the limit wait for a slot; waiting stays
//! cancellable.

use dashmap::DashMap;
use scenecast_kernel::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

/// Default number of concurrent renders
pub const DEFAULT_MAX_CONCURRENT_RENDERS: usize = 2;

/// Pool statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderPoolStats {
    /// Renders that acquired a slot
    pub total_started: usize,
    /// Renders that returned (any outcome)
    pub total_finished: usize,
    /// Renders currently holding a slot
    pub active_count: usize,
    /// Highest observed `active_count`
    pub peak_active: usize,
}

/// Concurrency-bounded wrapper around a render engine
pub struct RenderPool {
    engine: Arc<dyn RenderEngine>,
    max_concurrent: usize,
    slots: Semaphore,
    /// Active renders and when they started
    active: DashMap<RequestId, Instant>,
    stats: Mutex<RenderPoolStats>,
}

impl std::fmt::Debug for RenderPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPool")
            .field("max_concurrent", &self.max_concurrent)
            .field("active", &self.active.len())
            .finish_non_exhaustive()
    }
}

impl RenderPool {
    /// Wrap `engine`, allowing at most `max_concurrent` renders (minimum 1)
    #[must_use]
    pub fn new(engine: Arc<dyn RenderEngine>, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            engine,
            max_concurrent,
            slots: Semaphore::new(max_concurrent),
            active: DashMap::new(),
            stats: Mutex::new(RenderPoolStats::default()),
        }
    }

    /// Concurrency limit
    #[inline]
    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Renders currently holding a slot
    #[inline]
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Snapshot of the statistics
    #[must_use]
    pub fn stats(&self) -> RenderPoolStats {
        self.stats.lock().clone()
    }

    fn begin(&self, request_id: RequestId) -> ActiveRender<'_> {
        self.active.insert(request_id, Instant::now());
        let mut stats = self.stats.lock();
        stats.total_started += 1;
        stats.active_count = self.active.len();
        stats.peak_active = stats.peak_active.max(stats.active_count);
        ActiveRender { pool: self, request_id }
    }
}

/// Releases an active-render entry when dropped, including when the render
/// future is dropped mid-flight
struct ActiveRender<'a> {
    pool: &'a RenderPool,
    request_id: RequestId,
}

impl Drop for ActiveRender<'_> {
    fn drop(&mut self) {
        if let Some((_, started)) = self.pool.active.remove(&self.request_id) {
            tracing::debug!(
                request_id = %self.request_id,
                elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                "render slot released"
            );
        }
        let mut stats = self.pool.stats.lock();
        stats.total_finished += 1;
        stats.active_count = self.pool.active.len();
    }
}

#[async_trait::async_trait]
impl RenderEngine for RenderPool {
    async fn render(
        &self,
        area: &StagingArea,
        quality: Quality,
        cancel: &CancellationToken,
    ) -> Result<RenderResult, RenderError> {
        let _permit = tokio::select! {
            () = cancel.cancelled() => return Err(RenderError::Cancelled),
            permit = self.slots.acquire() => permit.map_err(|_| RenderError::Cancelled)?,
        };

        let _active = self.begin(area.request_id());
        self.engine.render(area, quality, cancel).await
    }
}
