//! Request builder for watch calls on arbitrary api paths
use crate::{error::Error, params::WatchParams};

pub(crate) const JSON_MIME: &str = "application/json";

/// A Kubernetes watch request builder
///
/// Takes the url path of a resource collection (e.g. `/api/v1/pods`) and
/// builds the hanging GET that opens a watch session on it.
#[derive(Debug, Clone)]
pub struct Request {
    /// The path component of a url
    pub url_path: String,
}

impl Request {
    /// New request with a resource's url path
    pub fn new<S: Into<String>>(url_path: S) -> Self {
        Self {
            url_path: url_path.into(),
        }
    }

    /// Watch the resource collection, optionally resuming at a known version
    ///
    /// The `watch=true` pair always leads the query string; the cursor and
    /// the selector pairs follow, omitted where absent. Values are
    /// percent-encoded by the query serializer.
    pub fn watch(
        &self,
        wp: &WatchParams,
        resource_version: Option<&str>,
    ) -> Result<http::Request<Vec<u8>>, Error> {
        wp.validate()?;
        let target = format!("{}?", self.url_path);
        let mut qp = form_urlencoded::Serializer::new(target);
        qp.append_pair("watch", "true");
        if let Some(ver) = resource_version {
            qp.append_pair("resourceVersion", ver);
        }
        wp.populate_qp(&mut qp);
        let urlstr = qp.finish();
        http::Request::get(urlstr)
            .header(http::header::ACCEPT, JSON_MIME)
            .header(http::header::CONTENT_TYPE, JSON_MIME)
            .header(http::header::CONNECTION, "keep-alive")
            .body(vec![])
            .map_err(Error::HttpError)
    }
}
