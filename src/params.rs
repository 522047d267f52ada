//! A port of watch request parameter *Optionals from apimachinery/types.go
use crate::error::Error;

/// Common query parameters used in watch calls
#[derive(Clone, Debug)]
pub struct WatchParams {
    /// A selector to restrict the watched objects by their labels.
    ///
    /// Defaults to everything if `None`.
    pub label_selector: Option<String>,

    /// A selector to restrict the watched objects by their fields.
    ///
    /// Defaults to everything if `None`.
    pub field_selector: Option<String>,

    /// Timeout for the watch call.
    ///
    /// This limits the duration of the call, regardless of any activity or inactivity.
    /// We limit this to 295s due to [inherent watch limitations](https://github.com/kubernetes/kubernetes/issues/6513).
    pub timeout: Option<u32>,

    /// Enables watch events with type "BOOKMARK".
    ///
    /// Servers that do not implement bookmarks ignore this flag and
    /// bookmarks are sent at the server's discretion. Clients should not
    /// assume bookmarks are returned at any specific interval, nor may they
    /// assume the server will send any BOOKMARK event during a session.
    pub bookmarks: bool,
}

impl Default for WatchParams {
    /// Default `WatchParams` without any constricting selectors
    fn default() -> Self {
        Self {
            // bookmarks stable since 1.17, and backwards compatible
            bookmarks: true,

            label_selector: None,
            field_selector: None,
            timeout: None,
        }
    }
}

impl WatchParams {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if let Some(to) = &self.timeout {
            // https://github.com/kubernetes/kubernetes/issues/6513
            if *to >= 295 {
                return Err(Error::RequestValidation(
                    "WatchParams::timeout must be < 295s".into(),
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn populate_qp(&self, qp: &mut form_urlencoded::Serializer<String>) {
        if let Some(fields) = &self.field_selector {
            qp.append_pair("fieldSelector", fields);
        }
        if let Some(labels) = &self.label_selector {
            qp.append_pair("labelSelector", labels);
        }
        if let Some(timeout) = self.timeout {
            qp.append_pair("timeoutSeconds", &timeout.to_string());
        }
        if self.bookmarks {
            qp.append_pair("allowWatchBookmarks", "true");
        }
    }
}

/// Builder interface to WatchParams
///
/// Usage:
/// ```
/// use kube_watch::WatchParams;
/// let wp = WatchParams::default()
///     .timeout(60)
///     .labels("kubernetes.io/lifecycle=spot");
/// ```
impl WatchParams {
    /// Configure the timeout for the watch call
    ///
    /// This limits the duration of the call, regardless of any activity or inactivity.
    #[must_use]
    pub fn timeout(mut self, timeout_secs: u32) -> Self {
        self.timeout = Some(timeout_secs);
        self
    }

    /// Configure the selector to restrict watched objects by their fields.
    ///
    /// Defaults to everything.
    /// Supports `=`, `==`, `!=`, and can be comma separated: `key1=value1,key2=value2`.
    /// The server only supports a limited number of field queries per type.
    #[must_use]
    pub fn fields(mut self, field_selector: &str) -> Self {
        self.field_selector = Some(field_selector.to_string());
        self
    }

    /// Configure the selector to restrict watched objects by their labels.
    ///
    /// Defaults to everything.
    /// Supports `=`, `==`, `!=`, and can be comma separated: `key1=value1,key2=value2`.
    #[must_use]
    pub fn labels(mut self, label_selector: &str) -> Self {
        self.label_selector = Some(label_selector.to_string());
        self
    }

    /// Disables watch bookmarks to simplify watch handling
    ///
    /// This is not recommended to use with production watchers as it can cause desyncs.
    #[must_use]
    pub fn disable_bookmarks(mut self) -> Self {
        self.bookmarks = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::WatchParams;

    #[test]
    fn defaults_allow_bookmarks_only() {
        let wp = WatchParams::default();
        assert!(wp.bookmarks);
        assert!(wp.label_selector.is_none());
        assert!(wp.field_selector.is_none());
        assert!(wp.timeout.is_none());
    }

    #[test]
    fn builders_chain() {
        let wp = WatchParams::default()
            .fields("metadata.name=my-pod")
            .labels("app=blog")
            .timeout(290)
            .disable_bookmarks();
        assert_eq!(wp.field_selector.as_deref(), Some("metadata.name=my-pod"));
        assert_eq!(wp.label_selector.as_deref(), Some("app=blog"));
        assert_eq!(wp.timeout, Some(290));
        assert!(!wp.bookmarks);
    }

    #[test]
    fn timeouts_are_bounded() {
        assert!(WatchParams::default().timeout(294).validate().is_ok());
        assert!(WatchParams::default().timeout(295).validate().is_err());
    }
}
