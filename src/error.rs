//! Error handling in [`kube_watch`][crate]
use http::HeaderMap;
use thiserror::Error;

/// Possible errors when watching a resource
#[derive(Error, Debug)]
pub enum Error {
    /// The apiserver refused the watch call
    ///
    /// Produced when the watch request gets a non-2xx response. During the
    /// initial handshake this is terminal; afterwards it is surfaced in-band
    /// and the session retries.
    #[error("ApiError: {0}")]
    Api(#[source] ApiError),

    /// Hyper error
    #[error("HyperError: {0}")]
    HyperError(#[from] hyper::Error),

    /// Service error
    #[error("ServiceError: {0}")]
    Service(tower::BoxError),

    /// Returned on `std::io::Error` when reading the event stream
    #[error("Error reading events stream: {0}")]
    ReadEvents(#[source] std::io::Error),

    /// Common error case when parsing stream lines into own structs
    #[error("Error deserializing response: {0}")]
    SerdeError(#[from] serde_json::Error),

    /// A watch line was valid JSON but carried no usable event type
    #[error("Json object should have a type field")]
    MissingEventType,

    /// A watch line carried no payload
    #[error("Json object should have an object field")]
    MissingEventObject,

    /// UTF-8 Error
    #[error("UTF-8 Error: {0}")]
    FromUtf8(#[from] std::string::FromUtf8Error),

    /// Returned when failed to find a newline character within max length.
    /// Only returned by watch bodies and this should never happen as
    /// the max is `usize::MAX`.
    #[error("Error finding newline character")]
    LinesCodecMaxLineLengthExceeded,

    /// Http based error
    #[error("HttpError: {0}")]
    HttpError(#[from] http::Error),

    /// A request validation failed
    #[error("Request validation failed with {0}")]
    RequestValidation(String),
}

/// An error response from the apiserver, with the failed exchange's context
///
/// It's quite common to get a `410 Gone` here when the `resourceVersion` used
/// to resume a watch is too old.
#[derive(Error, Debug)]
#[error("{message} ({status})")]
pub struct ApiError {
    /// HTTP status code returned by the apiserver
    pub status: u16,

    /// Response headers as sent by the apiserver
    pub headers: HeaderMap,

    /// A message about the error
    ///
    /// Taken from the `Status` body when the response carried a parseable
    /// one, otherwise derived from the HTTP status line.
    pub message: String,

    /// The response body, fully read, when the server sent one
    pub response_body: Option<String>,
}
