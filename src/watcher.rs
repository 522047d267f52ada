//! Watches a Kubernetes resource for changes, with error recovery
//!
//! The watch endpoint hands back one JSON object per line for as long as the
//! connection lasts. [`Watcher`] turns that into a session: it decodes and
//! classifies each line, tracks the last observed `resourceVersion`, and
//! reopens the connection from that cursor whenever the body fails, expires,
//! or runs dry. Nothing past the initial handshake terminates the session;
//! every failure is surfaced in-band as a [`WatchItem`].
use std::{fmt, io, marker::PhantomData};

use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    client::{Client, LineStream},
    meta,
    params::WatchParams,
    request::Request,
    response::Status,
    Error, Result,
};

/// A single outcome of polling the watch stream
///
/// The sole public event type: every poll of a watch session yields exactly
/// one of these.
pub enum WatchItem<K> {
    /// A resource change event from the apiserver
    WatchResponse {
        /// The event type, passed through verbatim
        ///
        /// Usually one of `ADDED`, `MODIFIED`, `DELETED` or `BOOKMARK`; new
        /// server-side types flow through without a library upgrade.
        kind: String,
        /// The decoded payload
        object: K,
    },

    /// The server reported the session's `resourceVersion` as expired
    ///
    /// Carries the restart version parsed from the error message when one
    /// was present. The session reopens on the next poll, resuming from the
    /// parsed version, or from the previous cursor when the message gave
    /// nothing to go on.
    InvalidResourceVersion(Option<String>),

    /// The read timed out with nothing new
    ///
    /// The connection stays usable; poll again to keep the session alive.
    NoData,

    /// Any other failure while reading or decoding
    ///
    /// Transport failures cause a reopen on the next poll; a corrupt or
    /// undecodable line is skipped and reading continues on the same
    /// connection. The stream itself never ends.
    Error(Error),
}

impl<K> fmt::Debug for WatchItem<K> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WatchItem::WatchResponse { kind, .. } => write!(f, "{} event", kind),
            WatchItem::InvalidResourceVersion(v) => write!(f, "InvalidResourceVersion event: {:?}", v),
            WatchItem::NoData => write!(f, "NoData"),
            WatchItem::Error(e) => write!(f, "Error event: {:?}", e),
        }
    }
}

/// One watch session against a resource collection
///
/// Holds the mutable state a session needs: the client, the request and its
/// parameters, the `resourceVersion` cursor, and the currently open body (if
/// any). Drive it manually with [`Watcher::poll`], or hand it to
/// [`Watcher::into_stream`] for a lazy, endless event stream.
pub struct Watcher<K> {
    client: Client,
    request: Request,
    params: WatchParams,
    resource_version: Option<String>,
    // `None` marks a session whose body must be (re)opened on the next poll.
    events: Option<LineStream>,
    _object: PhantomData<fn() -> K>,
}

impl<K> fmt::Debug for Watcher<K> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("url_path", &self.request.url_path)
            .field("resource_version", &self.resource_version)
            .field("connected", &self.events.is_some())
            .finish()
    }
}

impl<K> Watcher<K>
where
    K: DeserializeOwned,
{
    /// Open a watch session, performing the first call eagerly
    ///
    /// A failed handshake is returned as `Err` here and nowhere else; once a
    /// session exists, all failures come back through [`Watcher::poll`].
    pub async fn start(
        client: Client,
        base_url: &str,
        params: WatchParams,
        resource_version: Option<String>,
    ) -> Result<Self> {
        let mut watcher = Self {
            client,
            request: Request::new(base_url),
            params,
            resource_version,
            events: None,
            _object: PhantomData,
        };
        let request = watcher
            .request
            .watch(&watcher.params, watcher.resource_version.as_deref())?;
        watcher.events = Some(watcher.client.clone().request_events(request).await?);
        Ok(watcher)
    }

    /// The last observed `resourceVersion`, used to resume after reconnects
    pub fn resource_version(&self) -> Option<&str> {
        self.resource_version.as_deref()
    }

    /// Advance the session one step, yielding exactly one item
    ///
    /// Reuses the open connection when there is one, otherwise reopens from
    /// the current cursor first. Never panics and never blocks beyond the
    /// underlying read.
    pub async fn poll(&mut self) -> WatchItem<K> {
        let mut events = match self.events.take() {
            Some(events) => events,
            None => {
                let request = match self
                    .request
                    .watch(&self.params, self.resource_version.as_deref())
                {
                    Ok(request) => request,
                    Err(err) => return WatchItem::Error(err),
                };
                let client = self.client.clone();
                match client.request_events(request).await {
                    Ok(events) => events,
                    // leave the session closed; the next poll retries the call
                    Err(err) => return WatchItem::Error(err),
                }
            }
        };
        match events.next().await {
            Some(Ok(line)) => {
                let item = self.transition(&line);
                // a stale watch window forces a fresh call; everything else
                // keeps reading the same body
                if !matches!(item, WatchItem::InvalidResourceVersion(_)) {
                    self.events = Some(events);
                }
                item
            }
            Some(Err(Error::ReadEvents(err))) if err.kind() == io::ErrorKind::TimedOut => {
                tracing::debug!("watch poll timed out: {}", err);
                self.events = Some(events);
                WatchItem::NoData
            }
            Some(Err(err)) => {
                tracing::warn!("watch stream failed: {}", err);
                WatchItem::Error(err)
            }
            None => {
                tracing::debug!("watch body exhausted");
                WatchItem::Error(Error::ReadEvents(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "Null response from the server.",
                )))
            }
        }
    }

    /// Turn the session into a lazy, endless stream of events
    ///
    /// The stream is pull-driven and single-consumer; the caller bounds it
    /// with the usual combinators (`take`, `take_while`, ..). Dropping it
    /// drops the open body, which releases the connection.
    pub fn into_stream(self) -> impl Stream<Item = WatchItem<K>> + Send
    where
        K: Send + 'static,
    {
        futures::stream::unfold(self, |mut watcher| async move {
            let item = watcher.poll().await;
            Some((item, watcher))
        })
    }

    fn transition(&mut self, line: &str) -> WatchItem<K> {
        match self.decode(line) {
            Ok(item) => item,
            Err(err) => WatchItem::Error(err),
        }
    }

    /// Classify one line and update the cursor accordingly.
    fn decode(&mut self, line: &str) -> Result<WatchItem<K>> {
        let raw: Value = serde_json::from_str(line)?;
        let kind = match raw.get("type").and_then(Value::as_str) {
            Some(kind) => kind.to_owned(),
            None => return Err(Error::MissingEventType),
        };
        let object = match raw.get("object") {
            Some(object) if !object.is_null() => object,
            _ => return Err(Error::MissingEventObject),
        };
        if kind == "ERROR" {
            let status = serde_json::from_value::<Status>(object.clone())?;
            let suggested = status.expired_resource_version();
            if let Some(version) = &suggested {
                self.resource_version = Some(version.clone());
            }
            return Ok(WatchItem::InvalidResourceVersion(suggested));
        }
        // the cursor comes off the raw line so that slim payloads (bookmarks
        // in particular) advance it no matter what `K` retains
        let version = meta::resource_version(object);
        let object = serde_json::from_value(object.clone())?;
        if version.is_some() {
            self.resource_version = version;
        }
        Ok(WatchItem::WatchResponse { kind, object })
    }
}

/// Watch a resource collection, yielding typed change events indefinitely
///
/// Performs the first call eagerly: a failing handshake comes back as `Err`
/// and no stream is constructed. After that the stream recovers from every
/// failure by itself; items of [`WatchItem::Error`] and [`WatchItem::NoData`]
/// are informational, and pacing between polls is the caller's business.
pub async fn watch_resource<K>(
    client: Client,
    base_url: &str,
    params: WatchParams,
    resource_version: Option<String>,
) -> Result<impl Stream<Item = WatchItem<K>> + Send>
where
    K: DeserializeOwned + Send + 'static,
{
    Ok(Watcher::start(client, base_url, params, resource_version)
        .await?
        .into_stream())
}

#[cfg(test)]
mod tests {
    use super::{WatchItem, Watcher};
    use crate::{meta::DynamicObject, params::WatchParams, request::Request, Client, Error};
    use futures::StreamExt;
    use std::{io, marker::PhantomData};

    fn test_watcher(resource_version: Option<&str>) -> Watcher<DynamicObject> {
        let (service, _handle) =
            tower_test::mock::pair::<http::Request<hyper::Body>, http::Response<hyper::Body>>();
        Watcher {
            client: Client::new(service),
            request: Request::new("/api/v1/pods"),
            params: WatchParams::default(),
            resource_version: resource_version.map(String::from),
            events: None,
            _object: PhantomData,
        }
    }

    fn line_stream(items: Vec<crate::Result<&str>>) -> crate::client::LineStream {
        let items: Vec<crate::Result<String>> =
            items.into_iter().map(|item| item.map(String::from)).collect();
        futures::stream::iter(items).boxed()
    }

    #[tokio::test]
    async fn change_events_track_the_cursor() {
        let mut watcher = test_watcher(None);
        let added = r#"{"type":"ADDED","object":{"metadata":{"resourceVersion":"0"}}}"#;
        match watcher.transition(added) {
            WatchItem::WatchResponse { kind, object } => {
                assert_eq!(kind, "ADDED");
                assert_eq!(object.metadata.resource_version.as_deref(), Some("0"));
            }
            other => panic!("unexpected item: {:?}", other),
        }
        assert_eq!(watcher.resource_version(), Some("0"));

        let modified =
            r#"{"type":"MODIFIED","object":{"metadata":{"resourceVersion":"1","name":"p"}}}"#;
        match watcher.transition(modified) {
            WatchItem::WatchResponse { kind, object } => {
                assert_eq!(kind, "MODIFIED");
                assert_eq!(object.metadata.name.as_deref(), Some("p"));
            }
            other => panic!("unexpected item: {:?}", other),
        }
        assert_eq!(watcher.resource_version(), Some("1"));
    }

    #[tokio::test]
    async fn versionless_payloads_leave_the_cursor() {
        let mut watcher = test_watcher(None);
        let added = r#"{"type":"ADDED","object":{"metadata":{"name":"p"}}}"#;
        assert!(matches!(
            watcher.transition(added),
            WatchItem::WatchResponse { .. }
        ));
        assert_eq!(watcher.resource_version(), None);
    }

    #[tokio::test]
    async fn bookmarks_advance_the_cursor() {
        let mut watcher = test_watcher(Some("3"));
        let bookmark = r#"{"type":"BOOKMARK","object":{"apiVersion":"v1","kind":"Pod","metadata":{"resourceVersion":"7"}}}"#;
        match watcher.transition(bookmark) {
            WatchItem::WatchResponse { kind, .. } => assert_eq!(kind, "BOOKMARK"),
            other => panic!("unexpected item: {:?}", other),
        }
        assert_eq!(watcher.resource_version(), Some("7"));
    }

    #[tokio::test]
    async fn expired_windows_replace_the_cursor() {
        let mut watcher = test_watcher(Some("3981707"));
        watcher.events = Some(line_stream(vec![Ok(
            r#"{"type":"ERROR","object":{"kind":"Status","apiVersion":"v1","metadata":{},"status":"Failure","message":"too old resource version: 3981707 (3987044)","reason":"Gone","code":410}}"#,
        )]));
        match watcher.poll().await {
            WatchItem::InvalidResourceVersion(version) => {
                assert_eq!(version.as_deref(), Some("3987044"))
            }
            other => panic!("unexpected item: {:?}", other),
        }
        assert_eq!(watcher.resource_version(), Some("3987044"));
        // the stale body was discarded so the next poll reopens
        assert!(watcher.events.is_none());
    }

    #[tokio::test]
    async fn unparseable_error_statuses_keep_the_cursor() {
        let mut watcher = test_watcher(Some("5"));
        let unhelpful =
            r#"{"type":"ERROR","object":{"kind":"Status","status":"Failure","message":"Gone"}}"#;
        match watcher.transition(unhelpful) {
            WatchItem::InvalidResourceVersion(version) => assert_eq!(version, None),
            other => panic!("unexpected item: {:?}", other),
        }
        assert_eq!(watcher.resource_version(), Some("5"));
    }

    #[tokio::test]
    async fn malformed_lines_are_reported_not_fatal() {
        let mut watcher = test_watcher(Some("1"));
        for line in [
            r#"{"status":"ADD, object:"INVALID"}"#,
            "\"{\"",
            r#"{"type":"ADDED"}"#,
            r#"{"type":"ADDED","object":null}"#,
            r#"{"type":"ADDED","object":"INVALID"}"#,
        ] {
            assert!(matches!(watcher.transition(line), WatchItem::Error(_)));
            assert_eq!(watcher.resource_version(), Some("1"));
        }
    }

    #[tokio::test]
    async fn timeouts_keep_the_session() {
        let mut watcher = test_watcher(None);
        watcher.events = Some(line_stream(vec![Err(Error::ReadEvents(io::Error::new(
            io::ErrorKind::TimedOut,
            "read timed out",
        )))]));
        assert!(matches!(watcher.poll().await, WatchItem::NoData));
        assert!(watcher.events.is_some());
    }

    #[tokio::test]
    async fn exhausted_bodies_are_flagged_for_reopen() {
        let mut watcher = test_watcher(None);
        watcher.events = Some(line_stream(vec![Ok(
            r#"{"type":"ADDED","object":{"metadata":{"resourceVersion":"0"}}}"#,
        )]));
        assert!(matches!(
            watcher.poll().await,
            WatchItem::WatchResponse { .. }
        ));
        match watcher.poll().await {
            WatchItem::Error(Error::ReadEvents(err)) => {
                assert!(err.to_string().contains("Null response"));
            }
            other => panic!("unexpected item: {:?}", other),
        }
        assert!(watcher.events.is_none());
    }

    #[tokio::test]
    async fn transport_failures_are_flagged_for_reopen() {
        let mut watcher = test_watcher(None);
        watcher.events = Some(line_stream(vec![Err(Error::ReadEvents(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        )))]));
        assert!(matches!(watcher.poll().await, WatchItem::Error(_)));
        assert!(watcher.events.is_none());
    }
}
