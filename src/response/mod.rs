//! Response accumulation: header policy, media types and the line parser

mod builder;
mod headers;
pub mod media;

pub use builder::{LineOutcome, ParseState, ResponseBuilder};
pub use headers::{ResourceResponse, is_appendable_header};
pub use media::{MediaType, parse_media_type};
