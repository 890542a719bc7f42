//! Client protocol: newline-delimited JSON requests, responses and events.

pub mod handler;
pub mod requests;
pub mod responses;

pub use handler::{Access, Session};
pub use requests::{parse_request, Command, RequestMeta};
pub use responses::{error_response, event_message, ok_response};
