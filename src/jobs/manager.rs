//! In-memory job registry and background dispatch.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use uuid::Uuid;

use crate::config::JobsConfig;
use crate::context::{ContextOptimizer, ConversationTurn, OptimizationMetrics, OptimizedContext};
use crate::error::JobError;
use crate::jobs::model::{Job, JobInput};
use crate::jobs::worker;
use crate::llm::FallbackChain;

#[derive(Default)]
struct Registry {
    jobs: HashMap<Uuid, Job>,
    /// Ids in creation order.
    order: Vec<Uuid>,
    next_seq: u64,
    last_metrics: Option<OptimizationMetrics>,
}

impl Registry {
    /// Drop the oldest terminal jobs until at most `capacity` remain.
    /// Non-terminal jobs are never evicted, so the registry may stay above
    /// capacity while many jobs are in flight.
    fn evict(&mut self, capacity: usize) -> usize {
        let excess = self.jobs.len().saturating_sub(capacity);
        if excess == 0 {
            return 0;
        }

        let victims: Vec<Uuid> = self
            .order
            .iter()
            .filter(|id| self.jobs.get(id).is_some_and(Job::is_terminal))
            .take(excess)
            .copied()
            .collect();

        for id in &victims {
            self.jobs.remove(id);
        }
        self.order.retain(|id| self.jobs.contains_key(id));
        victims.len()
    }

    fn done_turns(&self, exclude: Option<Uuid>) -> Vec<ConversationTurn> {
        self.order
            .iter()
            .filter(|id| Some(**id) != exclude)
            .filter_map(|id| self.jobs.get(id))
            .filter_map(Job::to_turn)
            .collect()
    }
}

struct Shared {
    registry: RwLock<Registry>,
    optimizer: ContextOptimizer,
    chain: FallbackChain,
    capacity: usize,
    processing_delay: Duration,
}

/// Owns every job and runs each one as a background task.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct JobManager {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager")
            .field("jobs", &self.read().jobs.len())
            .field("capacity", &self.shared.capacity)
            .field("chain", &self.shared.chain)
            .finish()
    }
}

impl JobManager {
    pub fn new(chain: FallbackChain, optimizer: ContextOptimizer, config: &JobsConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: RwLock::new(Registry::default()),
                optimizer,
                chain,
                capacity: config.max_in_memory.max(1),
                processing_delay: config.processing_delay,
            }),
        }
    }

    // A panic while holding the lock leaves the registry consistent (every
    // mutation is a single insert/remove/field write), so poisoning is
    // ignored.
    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.shared
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.shared
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new pending job and start processing it in the background.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn create(&self, input: JobInput) -> Uuid {
        let kind = input.kind();
        let (job_id, evicted) = {
            let mut registry = self.write();
            let seq = registry.next_seq;
            registry.next_seq += 1;

            let job = Job::new(input, seq);
            let job_id = job.id;
            registry.order.push(job_id);
            registry.jobs.insert(job_id, job);
            (job_id, registry.evict(self.shared.capacity))
        };

        tracing::info!(job_id = %job_id, kind = %kind, "Job created");
        if evicted > 0 {
            tracing::debug!(evicted, capacity = self.shared.capacity, "Evicted finished jobs");
        }

        tokio::spawn(worker::run(self.clone(), job_id));
        job_id
    }

    pub fn get(&self, id: Uuid) -> Result<Job, JobError> {
        self.read()
            .jobs
            .get(&id)
            .cloned()
            .ok_or(JobError::NotFound { id })
    }

    /// All jobs in creation order.
    pub fn list(&self) -> Vec<Job> {
        let registry = self.read();
        registry
            .order
            .iter()
            .filter_map(|id| registry.jobs.get(id).cloned())
            .collect()
    }

    /// Remove every job. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let removed = {
            let mut registry = self.write();
            let removed = registry.jobs.len();
            registry.jobs.clear();
            registry.order.clear();
            registry.last_metrics = None;
            removed
        };
        tracing::info!(removed, "Job registry cleared");
        removed
    }

    pub fn len(&self) -> usize {
        self.read().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Completed conversation so far, in creation order.
    pub fn history(&self) -> Vec<ConversationTurn> {
        self.read().done_turns(None)
    }

    /// What the optimizer would send for `text` right now. Creates no job.
    pub fn preview(&self, text: &str) -> OptimizedContext {
        self.shared.optimizer.optimize(&self.history(), text)
    }

    /// Metrics of the most recent optimization run by a job.
    pub fn last_metrics(&self) -> Option<OptimizationMetrics> {
        self.read().last_metrics
    }

    pub fn optimizer(&self) -> &ContextOptimizer {
        &self.shared.optimizer
    }

    pub(crate) fn chain(&self) -> &FallbackChain {
        &self.shared.chain
    }

    pub(crate) fn processing_delay(&self) -> Duration {
        self.shared.processing_delay
    }

    pub(crate) fn history_excluding(&self, id: Uuid) -> Vec<ConversationTurn> {
        self.read().done_turns(Some(id))
    }

    /// Store `metrics` as the latest run unless job `id` is gone, in which
    /// case nothing is recorded and `false` is returned.
    pub(crate) fn record_metrics(&self, id: Uuid, metrics: OptimizationMetrics) -> bool {
        let mut registry = self.write();
        if !registry.jobs.contains_key(&id) {
            return false;
        }
        registry.last_metrics = Some(metrics);
        true
    }

    /// Apply `f` to the job under the write lock.
    ///
    /// `Ok(None)` means the job no longer exists (it was cleared or evicted);
    /// the caller should treat that as a no-op.
    pub(crate) fn update<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Job) -> Result<T, JobError>,
    ) -> Result<Option<T>, JobError> {
        let mut registry = self.write();
        match registry.jobs.get_mut(&id) {
            Some(job) => f(job).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::model::JobStatus;

    fn manager(capacity: usize) -> JobManager {
        JobManager::new(
            FallbackChain::default(),
            ContextOptimizer::default(),
            &JobsConfig {
                max_in_memory: capacity,
                ..JobsConfig::default()
            },
        )
    }

    fn finished(input: JobInput, seq: u64, reply: &str) -> Job {
        let mut job = Job::new(input, seq);
        job.start().unwrap();
        job.complete(reply).unwrap();
        job
    }

    #[test]
    fn eviction_spares_unfinished_jobs() {
        let mut registry = Registry::default();
        let pending = Job::new(JobInput::message("still going"), 0);
        let old = finished(JobInput::message("old"), 1, "a");
        let newer = finished(JobInput::message("newer"), 2, "b");
        let ids = [pending.id, old.id, newer.id];
        for job in [pending, old, newer] {
            registry.order.push(job.id);
            registry.jobs.insert(job.id, job);
        }

        assert_eq!(registry.evict(2), 1);
        assert_eq!(registry.order, vec![ids[0], ids[2]]);

        // Nothing terminal left to drop.
        assert_eq!(registry.evict(0), 1);
        assert_eq!(registry.order, vec![ids[0]]);
        assert_eq!(registry.evict(0), 0);
    }

    #[test]
    fn history_only_contains_done_jobs_in_order() {
        let mut registry = Registry::default();
        let first = finished(JobInput::message("first"), 0, "one");
        let pending = Job::new(JobInput::message("waiting"), 1);
        let second = finished(JobInput::message("second"), 2, "two");
        let second_id = second.id;
        for job in [first, pending, second] {
            registry.order.push(job.id);
            registry.jobs.insert(job.id, job);
        }

        let texts: Vec<String> = registry
            .done_turns(None)
            .into_iter()
            .map(|t| t.user_text)
            .collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(registry.done_turns(Some(second_id)).len(), 1);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let m = manager(10);
        let id = Uuid::new_v4();
        assert!(matches!(m.get(id), Err(JobError::NotFound { id: missing }) if missing == id));
    }

    #[tokio::test]
    async fn update_on_missing_job_is_a_no_op() {
        let m = manager(10);
        let result = m.update(Uuid::new_v4(), |job| job.start());
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let m = manager(10);
        m.create(JobInput::message("hello"));
        m.create(JobInput::message("again"));
        assert_eq!(m.clear(), 2);
        assert_eq!(m.clear(), 0);
        assert!(m.is_empty());
        assert!(m.list().is_empty());
        assert!(m.last_metrics().is_none());
    }

    #[test]
    fn metrics_for_a_missing_job_are_dropped() {
        let m = manager(10);
        assert!(!m.record_metrics(Uuid::new_v4(), OptimizationMetrics::default()));
        assert_eq!(m.last_metrics(), None);
    }

    #[tokio::test]
    async fn created_jobs_start_pending_or_later() {
        let m = manager(10);
        let id = m.create(JobInput::message("hello"));
        let job = m.get(id).unwrap();
        assert_eq!(job.kind, crate::jobs::JobKind::Message);
        assert!(matches!(
            job.status,
            JobStatus::Pending | JobStatus::Processing | JobStatus::Done
        ));
    }
}
