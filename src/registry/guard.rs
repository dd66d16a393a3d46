use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::error::{RegistryError, Result};
use super::job::LoadJob;
use super::{JobId, JobRegistry, lock_unpoisoned};

/// Bound on how long teardown waits for other guards to drop
#[derive(Debug, Clone, Copy)]
pub struct DrainPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for DrainPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(20),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Scoped access to one job.
///
/// While the guard lives the job cannot be destroyed by any thread. The job
/// itself is only reachable through [`JobGuard::lock`], whose borrow cannot
/// outlive the guard, so nothing keeps a job reference across a thread hop.
pub struct JobGuard<'r> {
    registry: &'r JobRegistry,
    id: JobId,
    job: Arc<Mutex<LoadJob>>,
    deref_on_drop: bool,
}

impl<'r> JobGuard<'r> {
    pub(super) fn new(registry: &'r JobRegistry, id: JobId, job: Arc<Mutex<LoadJob>>) -> Self {
        Self {
            registry,
            id,
            job,
            deref_on_drop: true,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Lock the job state. Never call back into the dispatcher while holding it.
    pub fn lock(&self) -> MutexGuard<'_, LoadJob> {
        lock_unpoisoned(&self.job)
    }

    /// Tear the job down.
    ///
    /// Spins (sleeping `poll_interval` between checks) until this guard is the
    /// only one left, then detaches the job from the registry and frees it in
    /// one critical section. On timeout the job is marked for removal so the
    /// last outstanding guard frees it, and the caller decides how to escalate.
    pub fn release(mut self, policy: &DrainPolicy) -> Result<()> {
        self.deref_on_drop = false;
        let started = Instant::now();
        let mut warned = false;

        loop {
            let mut entries = lock_unpoisoned(&self.registry.entries);
            let Some(entry) = entries.get_mut(&self.id) else {
                return Ok(());
            };

            if entry.refs <= 1 {
                if let Some(entry) = entries.remove(&self.id) {
                    drop(entry);
                }
                drop(entries);
                self.registry.metrics.job_released();
                debug!(job_id = self.id, "Job released");
                return Ok(());
            }

            let waited = started.elapsed();
            if waited >= policy.timeout {
                let refs = entry.refs;
                entry.refs -= 1;
                entry.removal_requested = true;
                return Err(RegistryError::DrainTimeout {
                    job_id: self.id,
                    refs,
                    waited_ms: waited.as_millis(),
                });
            }
            drop(entries);

            if !warned && waited >= policy.timeout / 2 {
                warned = true;
                warn!(job_id = self.id, "Job teardown still waiting for outstanding guards");
            }
            std::thread::sleep(policy.poll_interval);
        }
    }
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        if self.deref_on_drop {
            self.registry.release_ref(self.id);
        }
    }
}
