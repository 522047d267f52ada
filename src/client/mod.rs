//! A watch-oriented API client for the Kubernetes apiserver
//!
//! The [`Client`] drives a caller-supplied [`tower::Service`] stack; base
//! urls, TLS and authorization (bearer tokens included) belong in that stack,
//! so the same client works in-cluster, against a proxy, or against a mock.
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use http::{Request, Response, StatusCode};
use hyper::Body;
use tokio_util::{
    codec::{FramedRead, LinesCodec, LinesCodecError},
    io::StreamReader,
};
use tower::{buffer::Buffer, util::BoxService, BoxError, Layer, Service, ServiceExt};
use tower_http::map_response_body::MapResponseBodyLayer;

use crate::{error::ApiError, response::Status, Error, Result};

mod body;
use body::BodyStreamExt;

/// One watch session's response body, framed into UTF-8 lines
///
/// Each item is one newline-delimited chunk as sent by the apiserver, or the
/// failure that ended the read. The stream pulls from the connection on
/// demand and never reads past what the next line needs.
pub type LineStream = futures::stream::BoxStream<'static, Result<String>>;

/// Client for opening watch streams against a Kubernetes cluster
///
/// # Example
///
/// ```rust,no_run
/// use kube_watch::Client;
/// use tower::ServiceBuilder;
///
/// # async fn doc() -> Result<(), Box<dyn std::error::Error>> {
/// // A real stack layers the apiserver base url and a bearer token around
/// // the connector; they are not this crate's concern.
/// let service = ServiceBuilder::new().service(hyper::Client::new());
/// let client = Client::new(service);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    // - `Buffer` for cheap clone
    // - `BoxService` for dynamic response future type
    inner: Buffer<BoxService<Request<Body>, Response<Body>, BoxError>, Request<Body>>,
}

impl Client {
    /// Create a [`Client`] using a custom `Service` stack.
    pub fn new<S, B>(service: S) -> Self
    where
        S: Service<Request<Body>, Response = Response<B>> + Send + 'static,
        S::Future: Send + 'static,
        S::Error: Into<BoxError>,
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        // Transform response body to `hyper::Body` and use type erased error to avoid type parameters.
        let service = MapResponseBodyLayer::new(|b: B| Body::wrap_stream(b.into_stream()))
            .layer(service)
            .map_err(|e| e.into());
        Self {
            inner: Buffer::new(BoxService::new(service), 1024),
        }
    }

    /// Perform a raw HTTP request against the API and return the raw response back.
    pub async fn send(&self, request: Request<Body>) -> Result<Response<Body>> {
        let mut svc = self.inner.clone();
        let res = svc
            .ready()
            .await
            .map_err(Error::Service)?
            .call(request)
            .await
            .map_err(|err| {
                // Error decorating request
                err.downcast::<Error>()
                    .map(|e| *e)
                    // Error requesting
                    .or_else(|err| err.downcast::<hyper::Error>().map(|err| Error::HyperError(*err)))
                    // Error from another middleware
                    .unwrap_or_else(Error::Service)
            })?;
        Ok(res)
    }

    /// Open a watch call and get back its line-framed streaming body
    ///
    /// Anything but a 2xx is drained and returned as [`Error::Api`]; on
    /// success the body is handed back one line per pull, with read timeouts
    /// surfaced as `TimedOut` io errors for the watcher to classify.
    pub async fn request_events(&self, request: Request<Vec<u8>>) -> Result<LineStream> {
        let res = self.send(request.map(Body::from)).await?;
        let status = res.status();
        tracing::trace!(status = status.as_u16(), "headers: {:?}", res.headers());
        if !status.is_success() {
            return Err(watch_refused(res, status).await);
        }

        let frames = FramedRead::new(
            StreamReader::new(res.into_body().map_err(read_error)),
            LinesCodec::new(),
        );
        Ok(frames
            .map_err(|e| match e {
                LinesCodecError::Io(e) => Error::ReadEvents(e),
                // Reached the maximum line length without finding a newline.
                // This should never happen because we're using the default `usize::MAX`.
                LinesCodecError::MaxLineLengthExceeded => Error::LinesCodecMaxLineLengthExceeded,
            })
            .boxed())
    }
}

/// Capture a refused watch call as an [`ApiError`], draining the body.
async fn watch_refused(res: Response<Body>, status: StatusCode) -> Error {
    let headers = res.headers().clone();
    let bytes = match hyper::body::to_bytes(res.into_body()).await {
        Ok(bytes) => bytes,
        Err(err) => return Error::HyperError(err),
    };
    let fallback = || {
        status
            .canonical_reason()
            .unwrap_or("unrecognized status")
            .to_string()
    };
    let (message, response_body) = if bytes.is_empty() {
        (fallback(), None)
    } else {
        match String::from_utf8(bytes.to_vec()) {
            Ok(text) => {
                let message = serde_json::from_str::<Status>(&text)
                    .ok()
                    .map(|status| status.message)
                    .filter(|message| !message.is_empty())
                    .unwrap_or_else(fallback);
                (message, Some(text))
            }
            Err(err) => return Error::FromUtf8(err),
        }
    };
    tracing::warn!(status = status.as_u16(), "watch call refused: {}", message);
    Error::Api(ApiError {
        status: status.as_u16(),
        headers,
        message,
        response_body,
    })
}

/// Map hyper read failures onto `std::io::Error`, keeping timeouts recognizable.
fn read_error(err: hyper::Error) -> std::io::Error {
    use std::error::Error as _;
    use std::io::ErrorKind;

    // Client timeout. Classified as a quiet poll by the watcher.
    if err.is_timeout() {
        return std::io::Error::new(ErrorKind::TimedOut, err);
    }
    // Unexpected EOF from the chunked decoder.
    // Tends to happen when watching for 300+s.
    if err.to_string().contains("unexpected EOF during chunk") {
        return std::io::Error::new(ErrorKind::UnexpectedEof, err);
    }
    // Timeout middlewares surface as io errors wrapped by hyper rather than
    // hyper-native timeouts; keep their kind visible through the wrapping.
    let kind = {
        let mut source = err.source();
        let mut found = ErrorKind::Other;
        while let Some(cause) = source {
            if let Some(io) = cause.downcast_ref::<std::io::Error>() {
                found = io.kind();
                break;
            }
            source = cause.source();
        }
        found
    };
    std::io::Error::new(kind, err)
}
