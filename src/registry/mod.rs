//! Job registry: the single source of truth for "does this job still exist"
//!
//! Jobs are addressed by [`JobId`] everywhere outside this module. Any access
//! goes through [`JobRegistry::acquire`], which pins the job for the guard's
//! lifetime. Teardown is [`JobGuard::release`]: wait for the other guards to
//! drain, then detach and free under the registry lock.

mod error;
mod guard;
mod job;

pub use error::{RegistryError, Result};
pub use guard::{DrainPolicy, JobGuard};
pub use job::{JobOptions, LoadJob};
pub(crate) use job::{JobFlags, TransportProgress};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::observability::Metrics;

/// Opaque job identifier, never reused within one registry
pub type JobId = u64;

struct Entry {
    job: Arc<Mutex<LoadJob>>,
    /// Live guards
    refs: usize,
    /// Free as soon as the last guard drops
    removal_requested: bool,
}

pub struct JobRegistry {
    entries: Mutex<HashMap<JobId, Entry>>,
    next_id: AtomicU64,
    metrics: Arc<Metrics>,
}

impl JobRegistry {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            metrics,
        }
    }

    /// Register a job built for a freshly allocated id
    pub fn insert_with(&self, build: impl FnOnce(JobId) -> LoadJob) -> JobId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let job = build(id);

        lock_unpoisoned(&self.entries).insert(
            id,
            Entry {
                job: Arc::new(Mutex::new(job)),
                refs: 0,
                removal_requested: false,
            },
        );
        self.metrics.job_started();
        debug!(job_id = id, "Job registered");
        id
    }

    /// Pin a job. `None` means it already finished and was cleaned up, which
    /// callers treat as a normal outcome.
    pub fn acquire(&self, id: JobId) -> Option<JobGuard<'_>> {
        let mut entries = lock_unpoisoned(&self.entries);
        let entry = entries.get_mut(&id)?;
        entry.refs += 1;
        let job = Arc::clone(&entry.job);
        drop(entries);

        Some(JobGuard::new(self, id, job))
    }

    pub fn contains(&self, id: JobId) -> bool {
        lock_unpoisoned(&self.entries).contains_key(&id)
    }

    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = lock_unpoisoned(&self.entries).keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Live guard count for `id`, if registered
    pub fn ref_count(&self, id: JobId) -> Option<usize> {
        lock_unpoisoned(&self.entries).get(&id).map(|entry| entry.refs)
    }

    /// Drop every job nobody is holding; pinned ones go when their last guard drops.
    /// Returns how many were freed immediately.
    pub fn remove_idle(&self) -> usize {
        let mut entries = lock_unpoisoned(&self.entries);
        let idle: Vec<JobId> = entries
            .iter_mut()
            .filter_map(|(id, entry)| {
                if entry.refs == 0 {
                    Some(*id)
                } else {
                    entry.removal_requested = true;
                    None
                }
            })
            .collect();

        for id in &idle {
            entries.remove(id);
            self.metrics.job_released();
        }
        idle.len()
    }

    fn release_ref(&self, id: JobId) {
        let mut entries = lock_unpoisoned(&self.entries);
        let Some(entry) = entries.get_mut(&id) else {
            return;
        };
        entry.refs = entry.refs.saturating_sub(1);

        if entry.refs == 0 && entry.removal_requested {
            entries.remove(&id);
            self.metrics.job_released();
            debug!(job_id = id, "Job freed by last guard");
        }
    }
}

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
