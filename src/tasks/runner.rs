use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, trace, warn};

use super::task::Task;
use crate::observability::Metrics;
use crate::registry::lock_unpoisoned;

#[derive(Default)]
struct RunnerState {
    /// Consumed slots are tombstoned with `None` until the drain finishes
    slots: Vec<Option<Task>>,
    shutting_down: bool,
}

/// Shared I/O-thread → main-thread task queue
///
/// Producers call [`MainTaskRunner::enqueue`] from any thread. The main
/// thread calls [`MainTaskRunner::drain_once`] at its yield points; tasks run
/// strictly in enqueue order. A pass only covers what was queued when it
/// began, so a busy producer cannot pin the main thread inside one drain.
pub struct MainTaskRunner {
    state: Mutex<RunnerState>,
    draining: AtomicBool,
    metrics: Arc<Metrics>,
}

impl MainTaskRunner {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            state: Mutex::new(RunnerState::default()),
            draining: AtomicBool::new(false),
            metrics,
        }
    }

    /// Append a task. Refused (and dropped) once shutdown has begun.
    pub fn enqueue(&self, task: Task) -> bool {
        let mut state = lock_unpoisoned(&self.state);
        if state.shutting_down {
            drop(state);
            trace!(job_id = task.job_id(), kind = task.action().name(), "Runner shut down, task dropped");
            self.metrics.tasks_discarded(1);
            return false;
        }

        trace!(job_id = task.job_id(), kind = task.action().name(), "Task enqueued");
        state.slots.push(Some(task));
        self.metrics.task_enqueued();
        true
    }

    /// Run the tasks queued at entry, in order. Returns how many executed.
    ///
    /// Tasks enqueued while the pass runs wait for the next call.
    /// Re-entrant calls (a task callback draining again) are no-ops.
    pub fn drain_once(&self, mut execute: impl FnMut(Task)) -> usize {
        if self.draining.swap(true, Ordering::AcqRel) {
            return 0;
        }
        let _draining = DrainingFlag(&self.draining);

        let end = lock_unpoisoned(&self.state).slots.len();
        let mut executed = 0;
        let mut index = 0;
        loop {
            let task = {
                let mut state = lock_unpoisoned(&self.state);
                if index >= end {
                    let consumed = end.min(state.slots.len());
                    assert!(
                        state.slots[..consumed].iter().all(Option::is_none),
                        "main-thread task list still holds a task after a full drain"
                    );
                    state.slots.drain(..consumed);
                    break;
                }
                match state.slots.get_mut(index) {
                    Some(slot) => slot.take(),
                    None => break,
                }
            };
            index += 1;

            let Some(task) = task else {
                continue;
            };
            execute(task);
            executed += 1;
            self.metrics.task_executed();
        }

        if executed > 0 {
            debug!(executed, "Drained main-thread tasks");
        }
        executed
    }

    /// Stop accepting tasks and drop everything queued without running it
    pub fn shutdown(&self) -> usize {
        let discarded = {
            let mut state = lock_unpoisoned(&self.state);
            state.shutting_down = true;
            let discarded = state.slots.iter().filter(|slot| slot.is_some()).count();
            state.slots.clear();
            discarded
        };

        if discarded > 0 {
            warn!(discarded, "Main-thread runner shut down with pending tasks");
            self.metrics.tasks_discarded(discarded as u64);
        }
        discarded
    }

    pub fn pending(&self) -> usize {
        lock_unpoisoned(&self.state)
            .slots
            .iter()
            .filter(|slot| slot.is_some())
            .count()
    }

    pub fn is_shutting_down(&self) -> bool {
        lock_unpoisoned(&self.state).shutting_down
    }
}

struct DrainingFlag<'a>(&'a AtomicBool);

impl Drop for DrainingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
