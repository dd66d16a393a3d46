//! Collaborator surfaces consulted by the dispatcher
//!
//! - [`LoadClient`] - receives redirect/response/data/finish/fail callbacks
//! - [`InterceptionHooks`] - optional policy: response veto or capture,
//!   redirect veto, load-end delivery of the captured body
//! - [`MultipartDecoder`] / [`MultipartFactory`] - `multipart/x-mixed-replace`
//!   decoding, fed byte ranges and an end-of-content signal
//!
//! Hooks are optional. Each consultation point falls through to default
//! handling when none is installed.

mod download;
mod traits;

pub use download::{is_attachment, is_download_response};
pub use traits::{
    InterceptionHooks, LoadClient, LoadObservation, MultipartDecoder, MultipartFactory,
    ObservationKind, RedirectAction, ResponseAction,
};
