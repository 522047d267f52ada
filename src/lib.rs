//! Crate for following Kubernetes resources as they change over time
//!
//! This crate speaks the apiserver's `watch=true` protocol: one hanging GET
//! whose body delivers one JSON object per line, for as long as the server
//! keeps the window open. It turns that into an endless, pull-driven stream
//! of typed change events, resuming from the last observed `resourceVersion`
//! whenever the connection times out, expires, or drops.
//!
//! # Example
//!
//! The following example follows pods in the `default` namespace, printing
//! every change event until interrupted.
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use kube_watch::{meta::DynamicObject, watch_resource, Client, WatchItem, WatchParams};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), kube_watch::Error> {
//!     // The service stack owns transport concerns: a real one layers the
//!     // apiserver base url, TLS and a bearer token around the connector.
//!     let client = Client::new(hyper::Client::new());
//!
//!     let params = WatchParams::default().timeout(60);
//!     let events = watch_resource::<DynamicObject>(
//!         client,
//!         "/api/v1/namespaces/default/pods",
//!         params,
//!         None,
//!     )
//!     .await?;
//!
//!     let mut events = Box::pin(events);
//!     while let Some(item) = events.next().await {
//!         match item {
//!             WatchItem::WatchResponse { kind, object } => {
//!                 println!("{} {:?}", kind, object.metadata.name);
//!             }
//!             WatchItem::InvalidResourceVersion(version) => {
//!                 println!("watch window expired, resuming from {:?}", version);
//!             }
//!             WatchItem::NoData => {}
//!             WatchItem::Error(err) => eprintln!("watch error: {}", err),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod client;
pub mod error;
pub mod meta;
pub mod params;
pub mod request;
pub mod response;
pub mod watcher;

#[doc(inline)] pub use client::Client;
pub use error::{ApiError, Error};
pub use params::WatchParams;
pub use request::Request;
pub use response::Status;
#[doc(inline)]
pub use watcher::{watch_resource, WatchItem, Watcher};

/// Convenient alias for `Result<T, Error>`
pub type Result<T, E = Error> = std::result::Result<T, E>;
