//! Process-wide dispatcher state, constructed once and passed around explicitly

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::AbortHandle;
use tracing::{debug, info};

use crate::config::DispatcherConfig;
use crate::dispatcher::DispatchError;
use crate::hooks::{InterceptionHooks, LoadClient, MultipartFactory};
use crate::observability::Metrics;
use crate::registry::{DrainPolicy, JobId, JobOptions, JobRegistry, LoadJob, lock_unpoisoned};
use crate::request::LoadRequest;
use crate::tasks::{self, MainTaskRunner, Task, TaskAction};
use crate::transport::TransportSink;

/// Registry, main-thread runner, hooks and metrics for one dispatcher.
///
/// Lock order is job, then runner queue; the registry map lock is never held
/// while a job is locked.
pub struct LoadContext {
    config: DispatcherConfig,
    registry: JobRegistry,
    runner: MainTaskRunner,
    hooks: Option<Arc<dyn InterceptionHooks>>,
    multipart: Option<Arc<dyn MultipartFactory>>,
    metrics: Arc<Metrics>,
    shutdown: AtomicBool,
    transfers: Mutex<HashMap<JobId, AbortHandle>>,
}

impl LoadContext {
    pub fn new(config: DispatcherConfig) -> Self {
        let metrics = Arc::new(Metrics::new());
        Self {
            config,
            registry: JobRegistry::new(Arc::clone(&metrics)),
            runner: MainTaskRunner::new(Arc::clone(&metrics)),
            hooks: None,
            multipart: None,
            metrics,
            shutdown: AtomicBool::new(false),
            transfers: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn InterceptionHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn with_multipart_factory(mut self, factory: Arc<dyn MultipartFactory>) -> Self {
        self.multipart = Some(factory);
        self
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn runner(&self) -> &MainTaskRunner {
        &self.runner
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub(crate) fn hooks(&self) -> Option<&Arc<dyn InterceptionHooks>> {
        self.hooks.as_ref()
    }

    pub(crate) fn multipart_factory(&self) -> Option<&Arc<dyn MultipartFactory>> {
        self.multipart.as_ref()
    }

    pub fn drain_policy(&self) -> DrainPolicy {
        self.config.drain_policy()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Register a new job. Nothing runs until a transport reports through its sink.
    pub fn create_job(
        &self,
        request: LoadRequest,
        client: Option<Arc<dyn LoadClient>>,
        options: JobOptions,
    ) -> Result<JobId, DispatchError> {
        if self.is_shutdown() {
            return Err(DispatchError::ShuttingDown);
        }

        let trace_id = request.trace_id;
        let url = request.url.to_string();
        let id = self
            .registry
            .insert_with(|id| LoadJob::new(id, request, client, options));
        info!(job_id = id, %trace_id, url = %url, synchronous = options.synchronous, "Load started");
        Ok(id)
    }

    /// Producer handle for `id`
    pub fn sink(self: &Arc<Self>, id: JobId) -> TransportSink {
        TransportSink::new(Arc::clone(self), id)
    }

    /// Snapshot and enqueue in one critical section on the job.
    ///
    /// `capture` runs under the job lock; the tasks it returns are routed to
    /// the job's private list (synchronous jobs) or the shared runner before
    /// the lock is released. Returns `false` when the job no longer exists or
    /// the runner refused a task.
    pub(crate) fn push_tasks(
        &self,
        id: JobId,
        capture: impl FnOnce(&mut LoadJob) -> Vec<TaskAction>,
    ) -> bool {
        let Some(guard) = self.registry.acquire(id) else {
            return false;
        };
        let mut job = guard.lock();
        let actions = capture(&mut *job);

        let mut accepted = true;
        for action in actions {
            let task = Task::new(id, action);
            if job.is_synchronous() {
                job.sync_tasks.push_back(task);
            } else {
                accepted &= self.runner.enqueue(task);
            }
        }
        accepted
    }

    pub(crate) fn push_task(&self, id: JobId, action: TaskAction) -> bool {
        self.push_tasks(id, |_| vec![action])
    }

    /// Mark the job cancelled and schedule its teardown. The transport is
    /// aborted; already captured tasks still run (as no-ops) first.
    pub fn cancel(&self, id: JobId) -> bool {
        let Some(guard) = self.registry.acquire(id) else {
            return false;
        };
        {
            let mut job = guard.lock();
            if job.is_cancelled() {
                return true;
            }
            job.mark_cancelled();
        }
        drop(guard);

        if let Some(transfer) = lock_unpoisoned(&self.transfers).remove(&id) {
            transfer.abort();
        }
        info!(job_id = id, "Load cancelled");
        self.push_task(id, TaskAction::Cancelled)
    }

    pub fn set_defers_loading(&self, id: JobId, defers: bool) -> bool {
        let Some(guard) = self.registry.acquire(id) else {
            return false;
        };
        guard.lock().set_defers_loading(defers);
        debug!(job_id = id, defers, "Deferred loading toggled");
        true
    }

    /// Drop the client; later callbacks for this job go nowhere
    pub fn detach_client(&self, id: JobId) -> bool {
        let Some(guard) = self.registry.acquire(id) else {
            return false;
        };
        let client = guard.lock().client.take();
        drop(client);
        debug!(job_id = id, "Client detached");
        true
    }

    /// Run the tasks queued for the main thread so far
    pub fn drain_once(&self) -> usize {
        self.runner.drain_once(|task| tasks::run(self, task))
    }

    /// Block until a synchronous job is torn down, running its private tasks
    /// in order on the calling thread.
    pub fn run_synchronous(&self, id: JobId) -> usize {
        let mut executed = 0;
        loop {
            if self.is_shutdown() {
                break;
            }
            let next = {
                let Some(guard) = self.registry.acquire(id) else {
                    break;
                };
                let mut job = guard.lock();
                job.sync_tasks.pop_front()
            };

            match next {
                Some(task) => {
                    tasks::run(self, task);
                    executed += 1;
                }
                None => std::thread::sleep(self.config.sync_poll_interval()),
            }
        }
        debug!(job_id = id, executed, "Synchronous load drained");
        executed
    }

    /// Remember the abort handle of a spawned transfer. The map stays locked
    /// across `spawn`, so teardown can't miss a transfer that ends instantly.
    pub(crate) fn register_transfer(&self, id: JobId, spawn: impl FnOnce() -> AbortHandle) {
        let mut transfers = lock_unpoisoned(&self.transfers);
        let handle = spawn();
        transfers.insert(id, handle);
    }

    pub(crate) fn forget_transfer(&self, id: JobId) {
        lock_unpoisoned(&self.transfers).remove(&id);
    }

    pub fn in_flight_transfers(&self) -> usize {
        lock_unpoisoned(&self.transfers).len()
    }

    /// Stop everything: queued tasks are discarded unrun, transfers aborted,
    /// unpinned jobs freed. Further starts fail with `ShuttingDown`.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        let discarded = self.runner.shutdown();
        let aborted = {
            let mut transfers = lock_unpoisoned(&self.transfers);
            let aborted = transfers.len();
            for (_, transfer) in transfers.drain() {
                transfer.abort();
            }
            aborted
        };
        let freed = self.registry.remove_idle();
        info!(discarded, aborted, freed, "Dispatcher shut down");
    }
}
