//! Task registry: create-or-reprioritize, and cancellation of stale work.

use std::collections::{HashMap, HashSet};

use tokio::sync::Mutex;

use crate::error::ArtifactKind;
use crate::preload::task::{Fingerprint, PreloadTask, TaskStatus};
use std::sync::Arc;

struct SchedulerState {
    tasks: HashMap<Fingerprint, Arc<PreloadTask>>,
}

/// Owns every live `PreloadTask`, keyed by fingerprint. A `tokio::sync::Mutex`
/// guards the map because `ensure_task`/`cancel_missing` are called from
/// async contexts interleaved with other `.await`s in the same call stack;
/// a `parking_lot` guard held across one of those would be easy to get
/// wrong, so the registry uses the async-aware mutex instead.
pub struct Scheduler {
    state: Mutex<SchedulerState>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// An empty scheduler.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SchedulerState {
                tasks: HashMap::new(),
            }),
        }
    }

    /// Return the existing task for `fingerprint`, lowering its priority to
    /// `min(current, priority)`; or create a fresh `Pending` task.
    pub async fn ensure_task(
        &self,
        fingerprint: Fingerprint,
        priority: i64,
        now_ms: u64,
    ) -> Arc<PreloadTask> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.tasks.get(&fingerprint) {
            existing.raise_urgency(priority);
            return existing.clone();
        }
        let task = PreloadTask::new(fingerprint, priority, now_ms);
        state.tasks.insert(fingerprint, task.clone());
        task
    }

    /// Look up a live task without creating one.
    pub async fn get(&self, fingerprint: Fingerprint) -> Option<Arc<PreloadTask>> {
        self.state.lock().await.tasks.get(&fingerprint).cloned()
    }

    /// Drop a task from the registry once it has reached a terminal state
    /// (`Done`/`Error`/`Cancelled`); a loader body calls this after writing
    /// its result so the fingerprint can be requested fresh later.
    pub async fn retire(&self, fingerprint: Fingerprint) {
        self.state.lock().await.tasks.remove(&fingerprint);
    }

    /// Cancel and remove every task whose fingerprint is not in `wanted`.
    /// `Pending` tasks are fulfilled immediately with `Cancelled`; `Loading`
    /// tasks just have their `CancelHandle` signaled — the running loader
    /// body is responsible for observing it and calling `complete` itself.
    pub async fn cancel_missing(&self, wanted: &HashSet<Fingerprint>) -> Vec<Arc<PreloadTask>> {
        let mut state = self.state.lock().await;
        let stale: Vec<Fingerprint> = state
            .tasks
            .keys()
            .filter(|fp| !wanted.contains(fp))
            .copied()
            .collect();
        let mut cancelled = Vec::with_capacity(stale.len());
        for fp in stale {
            if let Some(task) = state.tasks.remove(&fp) {
                task.cancel.cancel();
                if task.status() == TaskStatus::Pending {
                    task.set_status(TaskStatus::Cancelled);
                    task.complete(Err(crate::error::PreloadError::Cancelled));
                }
                cancelled.push(task);
            }
        }
        cancelled
    }

    /// Every `Pending` task for `kind`, ordered by priority then creation
    /// time (the scheduling step's candidate pool for one kind).
    pub async fn pending_by_kind(&self, kind: ArtifactKind) -> Vec<Arc<PreloadTask>> {
        let state = self.state.lock().await;
        let mut candidates: Vec<Arc<PreloadTask>> = state
            .tasks
            .values()
            .filter(|t| t.fingerprint.kind == kind && t.status() == TaskStatus::Pending)
            .cloned()
            .collect();
        candidates.sort_by_key(|t| (t.priority(), t.created_at_ms));
        candidates
    }

    /// How many tasks of `kind` are currently `Loading`.
    pub async fn loading_count(&self, kind: ArtifactKind) -> usize {
        self.state
            .lock()
            .await
            .tasks
            .values()
            .filter(|t| t.fingerprint.kind == kind && t.status() == TaskStatus::Loading)
            .count()
    }

    /// Cancel and remove every task, regardless of fingerprint.
    pub async fn cancel_all(&self) -> Vec<Arc<PreloadTask>> {
        self.cancel_missing(&HashSet::new()).await
    }
}
