//! Task identity, status, cancellation and single-flight completion.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify};

use crate::config::kind_priority_offset;
use crate::error::{ArtifactKind, PreloadError};

/// Identity of a preload task: which artifact, for which virtual page.
/// At most one live `PreloadTask` exists per fingerprint at any instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    /// Which artifact kind.
    pub kind: ArtifactKind,
    /// Which virtual page.
    pub virtual_index: usize,
}

impl Fingerprint {
    /// Build a fingerprint.
    pub fn new(kind: ArtifactKind, virtual_index: usize) -> Self {
        Self { kind, virtual_index }
    }

    /// Cache-namespace key for this fingerprint.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.kind, self.virtual_index)
    }

    /// `distance + kind_priority_offset(kind)`: closer pages and cheaper
    /// kinds get lower (more urgent) numbers.
    pub fn priority_for_distance(&self, distance: i64) -> i64 {
        distance + kind_priority_offset(self.kind)
    }
}

/// A task's lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    /// Queued, not yet started.
    Pending,
    /// Running its loader body.
    Loading,
    /// Completed successfully; artifact is in cache.
    Done,
    /// Completed with a loader error.
    Error,
    /// Cancelled before completion; never wrote to cache.
    Cancelled,
}

/// Hand-rolled cooperative cancellation signal: no `tokio-util` dependency
/// is pulled in for this, since the primitive needed — signal, poll,
/// one-shot wake — is small enough to own directly.
#[derive(Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    /// A fresh, not-yet-cancelled handle.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Signal cancellation; wakes any task awaiting `cancelled()`.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// `true` once `cancel()` has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves immediately if already cancelled, else waits for `cancel()`.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }
}

type LoadResult = Result<Bytes, PreloadError>;

/// One in-flight (or queued) preload task.
pub struct PreloadTask {
    /// Which artifact/virtual-page this task resolves.
    pub fingerprint: Fingerprint,
    priority: AtomicI64,
    status: Mutex<TaskStatus>,
    /// Exclusively owned by this task.
    pub cancel: CancelHandle,
    /// Creation timestamp in epoch milliseconds, used as the FIFO
    /// tie-breaker within a priority tier.
    pub created_at_ms: u64,
    completion: Mutex<Option<oneshot::Sender<LoadResult>>>,
    shared: Shared<BoxFuture<'static, LoadResult>>,
}

impl PreloadTask {
    /// Construct a new `Pending` task with a fresh single-flight future.
    pub fn new(fingerprint: Fingerprint, priority: i64, created_at_ms: u64) -> Arc<Self> {
        let (tx, rx) = oneshot::channel::<LoadResult>();
        let shared: Shared<BoxFuture<'static, LoadResult>> = async move {
            rx.await.unwrap_or(Err(PreloadError::Cancelled))
        }
        .boxed()
        .shared();

        Arc::new(Self {
            fingerprint,
            priority: AtomicI64::new(priority),
            status: Mutex::new(TaskStatus::Pending),
            cancel: CancelHandle::new(),
            created_at_ms,
            completion: Mutex::new(Some(tx)),
            shared,
        })
    }

    /// Current priority (smaller = more urgent).
    pub fn priority(&self) -> i64 {
        self.priority.load(Ordering::Relaxed)
    }

    /// Lower the priority to `min(current, candidate)` — higher priority
    /// (the smaller number) always wins when a task is re-requested.
    pub fn raise_urgency(&self, candidate: i64) {
        self.priority.fetch_min(candidate, Ordering::Relaxed);
    }

    /// Current lifecycle state.
    pub fn status(&self) -> TaskStatus {
        *self.status.lock()
    }

    /// Transition the lifecycle state.
    pub fn set_status(&self, status: TaskStatus) {
        *self.status.lock() = status;
    }

    /// A clone of the single-flight future; every caller attached to this
    /// fingerprint awaits the same one, so concurrent requests for the
    /// same artifact only ever trigger a single load.
    pub fn future(&self) -> Shared<BoxFuture<'static, LoadResult>> {
        self.shared.clone()
    }

    /// Resolve the task's future exactly once. Later calls are no-ops —
    /// a task can only complete once, whichever outcome reaches here
    /// first (used both by loader bodies and by cancellation).
    pub fn complete(&self, result: LoadResult) {
        if let Some(tx) = self.completion.lock().take() {
            let _ = tx.send(result);
        }
    }
}
