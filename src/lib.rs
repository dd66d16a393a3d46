pub mod config;
pub mod context;
pub mod dispatcher;
pub mod hooks;
pub mod humanize;
pub mod observability;
pub mod redirect;
pub mod registry;
pub mod request;
pub mod response;
pub mod tasks;
pub mod transport;

pub use context::LoadContext;
pub use dispatcher::{DispatchError, LoadDispatcher};
pub use registry::{JobId, JobOptions};
pub use request::LoadRequest;
