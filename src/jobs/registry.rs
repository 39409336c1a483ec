use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::{JobSource, JobStore, JobUpdate};
use crate::models::JobStatus;

/// Interval between status fetches when the caller does not pick one.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Capacity of the update channel before slow subscribers start lagging.
const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// `PollingStopped` reason for handles removed by the caller.
pub const STOPPED_REASON: &str = "stopped";

/// Live polling task for one job
struct PollingHandle {
    /// Distinguishes this task from an earlier one for the same job id
    generation: u64,
    interval: Duration,
    task: JoinHandle<()>,
}

struct Shared {
    source: Arc<dyn JobSource>,
    store: Arc<JobStore>,
    handles: Mutex<HashMap<String, PollingHandle>>,
    updates: broadcast::Sender<JobUpdate>,
    next_generation: AtomicU64,
}

impl Shared {
    fn lock_handles(&self) -> MutexGuard<'_, HashMap<String, PollingHandle>> {
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, update: JobUpdate) {
        // No subscribers is fine
        let _ = self.updates.send(update);
    }

    fn publish_stopped(&self, job_id: String) {
        self.publish(JobUpdate::PollingStopped {
            job_id,
            reason: STOPPED_REASON.to_string(),
        });
    }
}

/// Owns one polling task per tracked job.
///
/// Every handle mutation and every status write happens under the handles
/// lock, and a tick only writes while its own handle is still registered.
/// Once `stop_polling` returns, the stopped task can no longer touch the
/// store.
pub struct JobRegistry {
    shared: Arc<Shared>,
}

impl JobRegistry {
    pub fn new(source: Arc<dyn JobSource>) -> Self {
        Self::with_store(source, Arc::new(JobStore::new()))
    }

    pub fn with_store(source: Arc<dyn JobSource>, store: Arc<JobStore>) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                source,
                store,
                handles: Mutex::new(HashMap::new()),
                updates,
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.shared.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobUpdate> {
        self.shared.updates.subscribe()
    }

    /// Start polling `job_id` every `interval`.
    ///
    /// Returns `false` without doing anything when the job is already being
    /// polled. The first fetch happens one interval after the call.
    pub fn start_polling(&self, job_id: &str, interval: Duration) -> bool {
        let interval = interval.max(Duration::from_millis(1));
        let mut handles = self.shared.lock_handles();

        if let Some(existing) = handles.get(job_id) {
            tracing::debug!(
                "Job {} already polled every {:?}, ignoring duplicate start",
                job_id,
                existing.interval
            );
            return false;
        }

        let generation = self.shared.next_generation.fetch_add(1, Ordering::Relaxed);
        let task = tokio::spawn(poll_job(
            self.shared.clone(),
            job_id.to_string(),
            generation,
            interval,
        ));
        handles.insert(
            job_id.to_string(),
            PollingHandle {
                generation,
                interval,
                task,
            },
        );
        tracing::info!("Started polling job {} (interval: {:?})", job_id, interval);
        true
    }

    /// Stop polling `job_id`. Returns whether a handle was removed.
    ///
    /// A removed handle ends with a `PollingStopped` update so waiters on
    /// the job are released.
    pub fn stop_polling(&self, job_id: &str) -> bool {
        let removed = self.shared.lock_handles().remove(job_id);
        match removed {
            Some(handle) => {
                handle.task.abort();
                tracing::info!("Stopped polling job {}", job_id);
                self.shared.publish_stopped(job_id.to_string());
                true
            }
            None => false,
        }
    }

    /// Stop every polling task.
    pub fn stop_all_polling(&self) {
        let drained: Vec<_> = self.shared.lock_handles().drain().collect();
        let count = drained.len();
        for (job_id, handle) in drained {
            handle.task.abort();
            tracing::debug!("Stopped polling job {}", job_id);
            self.shared.publish_stopped(job_id);
        }
        if count > 0 {
            tracing::info!("Stopped polling {} job(s)", count);
        }
    }

    pub fn is_polling(&self, job_id: &str) -> bool {
        self.shared.lock_handles().contains_key(job_id)
    }

    pub fn active_count(&self) -> usize {
        self.shared.lock_handles().len()
    }

    /// Ids of every job currently being polled, sorted.
    pub fn polled_jobs(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.shared.lock_handles().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Drop for JobRegistry {
    fn drop(&mut self) {
        self.stop_all_polling();
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("active", &self.active_count())
            .field("store", &self.shared.store)
            .finish()
    }
}

/// Tick loop for one job. Ends on a terminal status, on a fetch failure,
/// or when its handle is removed.
async fn poll_job(shared: Arc<Shared>, job_id: String, generation: u64, interval: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let fetched = shared.source.fetch_status(&job_id).await;

        // Guard scoped so it is released before any await
        let outcome = {
            let mut handles = shared.lock_handles();
            let owned = handles
                .get(&job_id)
                .is_some_and(|handle| handle.generation == generation);
            if !owned {
                tracing::debug!("Polling for job {} was stopped mid-fetch", job_id);
                return;
            }
            match fetched {
                Ok(report) => {
                    let outcome = shared.store.apply_report(&report);
                    if outcome.job.status.is_terminal() {
                        handles.remove(&job_id);
                    }
                    Ok(outcome)
                }
                Err(err) => {
                    handles.remove(&job_id);
                    Err(err)
                }
            }
        };

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!("Stopped polling job {}: {}", job_id, err);
                shared.publish(JobUpdate::PollingStopped {
                    job_id,
                    reason: err.to_string(),
                });
                return;
            }
        };

        let status = outcome.job.status;
        tracing::debug!(
            "Job {} is {} (progress: {:?})",
            job_id,
            status,
            outcome.job.progress
        );
        if outcome.applied {
            shared.publish(JobUpdate::Status(outcome.job.clone()));
        }

        match status {
            JobStatus::Completed => {
                tracing::info!("Job {} completed, fetching results", job_id);
                fetch_results_once(&shared, job_id).await;
                return;
            }
            JobStatus::Failed => {
                tracing::info!("Job {} failed: {:?}", job_id, outcome.job.error);
                shared.publish(JobUpdate::Failed {
                    job_id,
                    error: outcome.job.error,
                });
                return;
            }
            JobStatus::Queued | JobStatus::Running => {}
        }
    }
}

async fn fetch_results_once(shared: &Shared, job_id: String) {
    match shared.source.fetch_results(&job_id).await {
        Ok(results) => {
            shared.store.store_results(results.clone());
            shared.publish(JobUpdate::Completed {
                job_id,
                results: Box::new(results),
            });
        }
        Err(err) => {
            tracing::warn!("Could not fetch results for job {}: {}", job_id, err);
            shared.publish(JobUpdate::ResultsUnavailable {
                job_id,
                error: err.to_string(),
            });
        }
    }
}
