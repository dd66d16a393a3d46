//! Public entry point: start loads, drain results on the main thread

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::config::Config;
use crate::context::LoadContext;
use crate::hooks::{InterceptionHooks, LoadClient};
use crate::observability::MetricsSnapshot;
use crate::registry::{JobId, JobOptions};
use crate::request::LoadRequest;
use crate::transport::{IoPool, LoadError, ReqwestTransport, Transport};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Dispatcher is shutting down")]
    ShuttingDown,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Failed to start I/O threads: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("Transport setup failed: {0}")]
    Transport(#[from] LoadError),
}

pub type Result<T> = std::result::Result<T, DispatchError>;

/// Owns the I/O pool and the transport; everything else lives in the shared
/// [`LoadContext`].
///
/// Loads run on the pool's threads. Their results reach clients only when the
/// embedding main loop calls [`LoadDispatcher::drain_once`], or inside
/// [`LoadDispatcher::run_synchronous`] for synchronous jobs.
pub struct LoadDispatcher {
    ctx: Arc<LoadContext>,
    io: IoPool,
    transport: Arc<dyn Transport>,
}

impl LoadDispatcher {
    pub fn new(ctx: LoadContext, transport: Arc<dyn Transport>, io_threads: usize) -> Result<Self> {
        Ok(Self {
            ctx: Arc::new(ctx),
            io: IoPool::new(io_threads)?,
            transport,
        })
    }

    /// Dispatcher with the bundled reqwest transport
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_hooks(config, None)
    }

    pub fn with_hooks(config: &Config, hooks: Option<Arc<dyn InterceptionHooks>>) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.transport)?;
        let mut ctx = LoadContext::new(config.dispatcher.clone());
        if let Some(hooks) = hooks {
            ctx = ctx.with_hooks(hooks);
        }
        Self::new(ctx, Arc::new(transport), config.transport.io_threads)
    }

    pub fn context(&self) -> &Arc<LoadContext> {
        &self.ctx
    }

    pub fn start(&self, request: LoadRequest, client: Arc<dyn LoadClient>) -> Result<JobId> {
        self.start_with(request, Some(client), JobOptions::default())
    }

    pub fn start_with(
        &self,
        request: LoadRequest,
        client: Option<Arc<dyn LoadClient>>,
        options: JobOptions,
    ) -> Result<JobId> {
        validate_request(&request)?;

        let id = self.ctx.create_job(request.clone(), client, options)?;
        self.io
            .spawn_load(Arc::clone(&self.transport), request, self.ctx.sink(id));
        Ok(id)
    }

    /// Start a synchronous load and block until it is torn down. All client
    /// callbacks run on the calling thread; the shared queue is not involved.
    pub fn start_synchronous(&self, request: LoadRequest, client: Arc<dyn LoadClient>) -> Result<JobId> {
        let options = JobOptions {
            synchronous: true,
            ..JobOptions::default()
        };
        let id = self.start_with(request, Some(client), options)?;
        self.ctx.run_synchronous(id);
        Ok(id)
    }

    pub fn run_synchronous(&self, id: JobId) -> usize {
        self.ctx.run_synchronous(id)
    }

    pub fn cancel(&self, id: JobId) -> bool {
        self.ctx.cancel(id)
    }

    pub fn set_defers_loading(&self, id: JobId, defers: bool) -> bool {
        self.ctx.set_defers_loading(id, defers)
    }

    pub fn detach_client(&self, id: JobId) -> bool {
        self.ctx.detach_client(id)
    }

    pub fn drain_once(&self) -> usize {
        self.ctx.drain_once()
    }

    pub fn pending_tasks(&self) -> usize {
        self.ctx.runner().pending()
    }

    pub fn is_active(&self, id: JobId) -> bool {
        self.ctx.registry().contains(id)
    }

    pub fn active_jobs(&self) -> usize {
        self.ctx.registry().len()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics().snapshot()
    }

    pub fn shutdown(&self) {
        self.ctx.shutdown();
    }
}

impl Drop for LoadDispatcher {
    fn drop(&mut self) {
        if !self.ctx.is_shutdown() {
            info!(active_jobs = self.ctx.registry().len(), "Dispatcher dropped");
            self.ctx.shutdown();
        }
    }
}

fn validate_request(request: &LoadRequest) -> Result<()> {
    match request.url.scheme() {
        "http" | "https" | "file" => {}
        scheme => {
            return Err(DispatchError::InvalidRequest(format!(
                "unsupported scheme '{}'",
                scheme
            )));
        }
    }
    if request.url.scheme() != "file" && request.url.host_str().is_none() {
        return Err(DispatchError::InvalidRequest(format!(
            "missing host in '{}'",
            request.url
        )));
    }
    Ok(())
}
