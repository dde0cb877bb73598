//! Request and reply messages exchanged with inbound clients.

mod errors;
mod request;
mod response;

pub use self::errors::DispatchError;
pub use self::request::{ClientEnvelope, ClientId, RequestHeader, correlation_of};
pub use self::response::{ErrorDetail, ErrorReply, ReplyBody, ReplyMessage};
