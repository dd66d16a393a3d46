use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use super::JobId;
use crate::hooks::{LoadClient, MultipartDecoder};
use crate::request::LoadRequest;
use crate::response::{ResourceResponse, ResponseBuilder};
use crate::tasks::Task;

/// Per-job knobs fixed at creation
#[derive(Debug, Clone, Copy, Default)]
pub struct JobOptions {
    /// Route tasks to the job's private list instead of the shared queue
    pub synchronous: bool,
    /// Capture the body for the load-end hook instead of streaming it
    pub capture_body: bool,
    /// Load goes through a CONNECT proxy
    pub proxied: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct JobFlags {
    pub cancelled: bool,
    pub defers_loading: bool,
    pub response_fired: bool,
    pub synchronous: bool,
    pub capturing: bool,
    pub hook_delivered: bool,
    pub transport_done: bool,
    pub finished: bool,
}

/// What the I/O side last reported; read when a task captures its snapshot
#[derive(Debug, Clone, Default)]
pub(crate) struct TransportProgress {
    pub http_code: u16,
    pub effective_url: String,
    pub content_length: Option<u64>,
    pub proxied: bool,
}

/// One in-flight load. Only reachable through a [`super::JobGuard`].
pub struct LoadJob {
    id: JobId,
    pub(crate) request: LoadRequest,
    pub(crate) response: ResourceResponse,
    pub(crate) builder: ResponseBuilder,
    pub(crate) effective_url: Option<String>,
    pub(crate) progress: TransportProgress,
    pub(crate) client: Option<Arc<dyn LoadClient>>,
    pub(crate) flags: JobFlags,
    pub(crate) capture: Option<Vec<u8>>,
    pub(crate) multipart: Option<Box<dyn MultipartDecoder>>,
    pub(crate) sync_tasks: VecDeque<Task>,
    pub(crate) pause: watch::Sender<bool>,
}

impl LoadJob {
    pub fn new(
        id: JobId,
        request: LoadRequest,
        client: Option<Arc<dyn LoadClient>>,
        options: JobOptions,
    ) -> Self {
        let (pause, _) = watch::channel(false);
        Self {
            id,
            progress: TransportProgress {
                effective_url: request.url.to_string(),
                proxied: options.proxied,
                ..TransportProgress::default()
            },
            request,
            response: ResourceResponse::new(),
            builder: ResponseBuilder::new(),
            effective_url: None,
            client,
            flags: JobFlags {
                synchronous: options.synchronous,
                capturing: options.capture_body,
                ..JobFlags::default()
            },
            capture: None,
            multipart: None,
            sync_tasks: VecDeque::new(),
            pause,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Current outgoing request (replaced on redirect)
    pub fn request(&self) -> &LoadRequest {
        &self.request
    }

    pub fn response(&self) -> &ResourceResponse {
        &self.response
    }

    pub fn effective_url(&self) -> Option<&str> {
        self.effective_url.as_deref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.flags.cancelled
    }

    pub fn is_deferred(&self) -> bool {
        self.flags.defers_loading
    }

    pub fn response_fired(&self) -> bool {
        self.flags.response_fired
    }

    pub fn is_synchronous(&self) -> bool {
        self.flags.synchronous
    }

    pub fn is_capturing(&self) -> bool {
        self.flags.capturing
    }

    pub fn is_finished(&self) -> bool {
        self.flags.finished
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    pub fn captured_len(&self) -> usize {
        self.capture.as_ref().map_or(0, Vec::len)
    }

    pub fn pending_sync_tasks(&self) -> usize {
        self.sync_tasks.len()
    }

    pub(crate) fn set_defers_loading(&mut self, defers: bool) {
        self.flags.defers_loading = defers;
        self.pause.send_replace(defers);
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.flags.cancelled = true;
        // A paused transport must wake up to observe the abort
        self.pause.send_replace(false);
    }
}

impl fmt::Debug for LoadJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadJob")
            .field("id", &self.id)
            .field("url", &self.request.url.as_str())
            .field("status", &self.response.status)
            .field("flags", &self.flags)
            .field("captured", &self.captured_len())
            .field("sync_tasks", &self.sync_tasks.len())
            .finish()
    }
}
