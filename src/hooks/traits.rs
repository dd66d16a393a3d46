use std::sync::Arc;

use url::Url;

use crate::registry::JobId;
use crate::request::LoadRequest;
use crate::response::ResourceResponse;
use crate::transport::LoadError;

/// Receives load progress on the main thread.
///
/// Callbacks run with no dispatcher lock held, so they may cancel, defer or
/// start other loads.
pub trait LoadClient: Send + Sync {
    fn will_redirect(
        &self,
        _job: JobId,
        _old_request: &LoadRequest,
        _new_request: &LoadRequest,
        _previous: &ResourceResponse,
    ) {
    }

    fn did_receive_response(&self, job: JobId, response: &ResourceResponse);

    fn did_receive_data(&self, job: JobId, data: &[u8]);

    fn did_finish_load(&self, job: JobId);

    fn did_fail(&self, job: JobId, error: &LoadError);
}

/// Verdict of the response-arrival hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseAction {
    #[default]
    Deliver,
    /// Keep the body in a capture buffer and hand it over at load end
    Capture,
    /// Stop the load
    Stop,
}

/// Verdict of the redirect hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectAction {
    #[default]
    Follow,
    /// Veto: the load is cancelled and the hook drives its own navigation
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationKind {
    Redirect,
    ResponseDetails,
}

/// Request/response summary passed to [`InterceptionHooks::observe`]
#[derive(Debug, Clone)]
pub struct LoadObservation {
    pub kind: ObservationKind,
    pub url: Url,
    pub new_url: Option<Url>,
    pub method: String,
    pub referrer: Option<String>,
    pub status: u16,
}

/// External policy consulted at fixed points of a load.
///
/// Every method has a default that matches "no hook installed".
pub trait InterceptionHooks: Send + Sync {
    fn on_response(&self, _job: JobId, _url: &Url, _response: &ResourceResponse) -> ResponseAction {
        ResponseAction::Deliver
    }

    /// Offered only for responses that look like downloads. Returning true
    /// claims the download and stops the load.
    fn on_download(&self, _job: JobId, _url: &Url) -> bool {
        false
    }

    fn on_redirect(&self, _job: JobId, _new_url: &Url) -> RedirectAction {
        RedirectAction::Follow
    }

    /// Captured body, handed over exactly once per load. `Some` replaces
    /// the bytes the client eventually receives.
    fn on_load_end(&self, _job: JobId, _url: &Url, _body: &[u8]) -> Option<Vec<u8>> {
        None
    }

    fn observe(&self, _job: JobId, _event: &LoadObservation) {}
}

/// Decoder for `multipart/x-mixed-replace` bodies
pub trait MultipartDecoder: Send {
    fn content_received(&mut self, data: &[u8]);
    fn content_ended(&mut self);
}

pub trait MultipartFactory: Send + Sync {
    fn create(
        &self,
        job: JobId,
        boundary: &str,
        client: Option<Arc<dyn LoadClient>>,
    ) -> Box<dyn MultipartDecoder>;
}
