//! I/O side of the dispatcher
//!
//! A [`Transport`] drives one job on a background thread and reports through
//! a [`TransportSink`]. [`IoPool`] owns the threads; [`ReqwestTransport`] is
//! the bundled HTTP(S) + `file://` implementation.

mod error;
mod http;
mod pool;
mod sink;

pub use error::LoadError;
pub use http::ReqwestTransport;
pub use pool::IoPool;
pub use sink::TransportSink;

use async_trait::async_trait;

use crate::request::LoadRequest;

/// Wire-protocol collaborator.
///
/// Implementations report head lines, body chunks and exactly one terminal
/// outcome (`finished` or `failed`) through the sink. Returning without an
/// outcome still tears the job down.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn perform(&self, request: LoadRequest, sink: TransportSink);
}
