use bytes::Bytes;

use crate::registry::{JobId, LoadJob};
use crate::transport::LoadError;

/// Immutable snapshot of one transport result, taken under the job lock.
///
/// The bytes are an owned copy: the transport's buffer may be thread-local
/// and reused as soon as the callback returns.
#[derive(Debug, Clone, Default)]
pub struct CapturedResult {
    pub data: Bytes,
    pub http_code: u16,
    pub effective_url: String,
    pub content_length: Option<u64>,
}

impl CapturedResult {
    pub fn capture(job: &LoadJob, data: &[u8]) -> Self {
        let progress = &job.progress;
        // CONNECT proxies report no code until the tunnel's own response arrives
        let http_code = if progress.proxied && progress.http_code == 0 {
            200
        } else {
            progress.http_code
        };

        Self {
            data: Bytes::copy_from_slice(data),
            http_code,
            effective_url: progress.effective_url.clone(),
            content_length: progress.content_length,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Work to run on the main thread for one job
#[derive(Debug)]
pub enum TaskAction {
    BodyData(CapturedResult),
    HeaderLine(CapturedResult),
    LoadFinished(CapturedResult),
    RemovedFromTransport,
    Cancelled,
    LocalResponseReady(CapturedResult),
    MultipartContentEnded,
    LoadFailed(LoadError),
    HookRequestReady,
}

impl TaskAction {
    pub fn name(&self) -> &'static str {
        match self {
            TaskAction::BodyData(_) => "body-data",
            TaskAction::HeaderLine(_) => "header-line",
            TaskAction::LoadFinished(_) => "load-finished",
            TaskAction::RemovedFromTransport => "removed-from-transport",
            TaskAction::Cancelled => "cancelled",
            TaskAction::LocalResponseReady(_) => "local-response-ready",
            TaskAction::MultipartContentEnded => "multipart-content-ended",
            TaskAction::LoadFailed(_) => "load-failed",
            TaskAction::HookRequestReady => "hook-request-ready",
        }
    }

    /// Teardown tasks release the job instead of touching client state
    pub fn is_teardown(&self) -> bool {
        matches!(self, TaskAction::RemovedFromTransport | TaskAction::Cancelled)
    }
}

/// Single-owner, single-use unit of main-thread work
#[derive(Debug)]
pub struct Task {
    job_id: JobId,
    action: TaskAction,
}

impl Task {
    pub fn new(job_id: JobId, action: TaskAction) -> Self {
        Self { job_id, action }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn action(&self) -> &TaskAction {
        &self.action
    }

    pub fn into_parts(self) -> (JobId, TaskAction) {
        (self.job_id, self.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::JobOptions;
    use crate::request::LoadRequest;
    use url::Url;

    fn job(options: JobOptions) -> LoadJob {
        LoadJob::new(
            1,
            LoadRequest::get(Url::parse("http://example.com/a").unwrap()),
            None,
            options,
        )
    }

    #[test]
    fn test_capture_copies_progress() {
        let mut job = job(JobOptions::default());
        job.progress.http_code = 404;
        job.progress.content_length = Some(12);

        let mut source = vec![1u8, 2, 3];
        let captured = CapturedResult::capture(&job, &source);
        source[0] = 9;

        assert_eq!(&captured.data[..], &[1, 2, 3]);
        assert_eq!(captured.http_code, 404);
        assert_eq!(captured.effective_url, "http://example.com/a");
        assert_eq!(captured.content_length, Some(12));
    }

    #[test]
    fn test_proxied_zero_code_reads_as_ok() {
        let proxied = job(JobOptions {
            proxied: true,
            ..JobOptions::default()
        });
        assert_eq!(CapturedResult::capture(&proxied, b"").http_code, 200);

        let direct = job(JobOptions::default());
        assert_eq!(CapturedResult::capture(&direct, b"").http_code, 0);
    }

    #[test]
    fn test_teardown_kinds() {
        assert!(TaskAction::Cancelled.is_teardown());
        assert!(TaskAction::RemovedFromTransport.is_teardown());
        assert!(!TaskAction::HookRequestReady.is_teardown());
        assert_eq!(TaskAction::MultipartContentEnded.name(), "multipart-content-ended");
    }
}
