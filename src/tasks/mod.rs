//! Cross-thread tasks: I/O-side snapshots carried to the main thread
//!
//! A [`Task`] is produced under the job lock and consumed exactly once, either
//! by [`MainTaskRunner::drain_once`] or, for synchronous jobs, by the loop
//! blocking on that job.

mod exec;
mod runner;
mod task;

pub(crate) use exec::run;
pub use runner::MainTaskRunner;
pub use task::{CapturedResult, Task, TaskAction};
