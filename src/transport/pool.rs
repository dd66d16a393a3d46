use std::io;
use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info};

use super::{Transport, TransportSink};
use crate::request::LoadRequest;

/// Background I/O threads driving transports
pub struct IoPool {
    runtime: Option<Runtime>,
    threads: usize,
}

impl IoPool {
    pub fn new(threads: usize) -> io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(threads.max(1))
            .thread_name("loadbox-io")
            .enable_all()
            .build()?;

        info!(threads, "I/O pool started");
        Ok(Self {
            runtime: Some(runtime),
            threads,
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run `transport` for one job. The job is always torn down afterwards,
    /// even when the transport returns without reporting an outcome.
    pub fn spawn_load(&self, transport: Arc<dyn Transport>, request: LoadRequest, sink: TransportSink) {
        let Some(runtime) = &self.runtime else {
            return;
        };

        let job_id = sink.job_id();
        let ctx = Arc::clone(sink.context());
        ctx.register_transfer(job_id, || {
            runtime
                .spawn(async move {
                    debug!(job_id = sink.job_id(), url = %request.url, "Transfer started");
                    transport.perform(request, sink.clone()).await;
                    sink.ensure_removed();
                })
                .abort_handle()
        });
    }
}

impl Drop for IoPool {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
