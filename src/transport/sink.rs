use std::sync::Arc;

use tracing::trace;

use super::LoadError;
use crate::context::LoadContext;
use crate::registry::{JobId, LoadJob};
use crate::tasks::{CapturedResult, TaskAction};

/// Producer-side handle a transport uses to report progress for one job.
///
/// Holds only the job id. Every call re-acquires the job, so a sink that
/// outlives its job degrades to no-ops (the emitters return `false`).
/// Snapshots are taken under the job lock and enqueued before it is released,
/// which is what keeps one job's tasks in production order.
#[derive(Clone)]
pub struct TransportSink {
    ctx: Arc<LoadContext>,
    job_id: JobId,
}

impl TransportSink {
    pub(crate) fn new(ctx: Arc<LoadContext>, job_id: JobId) -> Self {
        Self { ctx, job_id }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub(crate) fn context(&self) -> &Arc<LoadContext> {
        &self.ctx
    }

    /// Job gone, cancelled, or dispatcher shut down
    pub fn is_cancelled(&self) -> bool {
        if self.ctx.is_shutdown() {
            return true;
        }
        let Some(guard) = self.ctx.registry().acquire(self.job_id) else {
            return true;
        };
        let cancelled = guard.lock().is_cancelled();
        cancelled
    }

    pub fn record_status(&self, http_code: u16) {
        self.update(|job| job.progress.http_code = http_code);
    }

    pub fn record_effective_url(&self, url: &str) {
        self.update(|job| job.progress.effective_url = url.to_string());
    }

    pub fn record_content_length(&self, content_length: Option<u64>) {
        self.update(|job| job.progress.content_length = content_length);
    }

    pub fn set_proxied(&self, proxied: bool) {
        self.update(|job| job.progress.proxied = proxied);
    }

    /// One raw header line, status line or blank terminator included
    pub fn header_line(&self, line: &[u8]) -> bool {
        self.ctx.push_tasks(self.job_id, |job| {
            vec![TaskAction::HeaderLine(CapturedResult::capture(job, line))]
        })
    }

    pub fn body(&self, data: &[u8]) -> bool {
        self.ctx.push_tasks(self.job_id, |job| {
            vec![TaskAction::BodyData(CapturedResult::capture(job, data))]
        })
    }

    /// Non-HTTP response is ready: synthesize it from the recorded progress
    pub fn local_response(&self) -> bool {
        self.ctx.push_tasks(self.job_id, |job| {
            vec![TaskAction::LocalResponseReady(CapturedResult::capture(job, &[]))]
        })
    }

    pub fn multipart_ended(&self) -> bool {
        self.ctx
            .push_tasks(self.job_id, |_| vec![TaskAction::MultipartContentEnded])
    }

    /// Successful end of transfer; the job is torn down after the client is told.
    /// A multipart decoder, if one was set up, gets its end-of-content signal first.
    pub fn finished(&self) -> bool {
        self.ctx.push_tasks(self.job_id, |job| {
            job.flags.transport_done = true;
            vec![
                TaskAction::HookRequestReady,
                TaskAction::MultipartContentEnded,
                TaskAction::LoadFinished(CapturedResult::capture(job, &[])),
                TaskAction::RemovedFromTransport,
            ]
        })
    }

    pub fn failed(&self, error: LoadError) -> bool {
        self.ctx.push_tasks(self.job_id, |job| {
            job.flags.transport_done = true;
            vec![TaskAction::LoadFailed(error), TaskAction::RemovedFromTransport]
        })
    }

    /// Tear the job down if the transport returned without a terminal report
    pub(crate) fn ensure_removed(&self) {
        self.ctx.push_tasks(self.job_id, |job| {
            if job.flags.transport_done {
                return Vec::new();
            }
            trace!(job_id = job.id(), "Transport returned without an outcome");
            job.flags.transport_done = true;
            vec![TaskAction::RemovedFromTransport]
        });
    }

    /// Wait while the client defers loading. Returns at once when not paused
    /// or when the job is gone.
    pub async fn resumed(&self) {
        let mut pause = {
            let Some(guard) = self.ctx.registry().acquire(self.job_id) else {
                return;
            };
            let job = guard.lock();
            job.pause.subscribe()
        };
        let _ = pause.wait_for(|paused| !*paused).await;
    }

    fn update(&self, apply: impl FnOnce(&mut LoadJob)) {
        if let Some(guard) = self.ctx.registry().acquire(self.job_id) {
            apply(&mut *guard.lock());
        }
    }
}
