// Add `into_stream()` to `http_body::Body`
use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::Stream;
use http_body::Body;
use pin_project::pin_project;

/// Stream of data chunks read off a response body
#[pin_project]
pub(crate) struct IntoStream<B> {
    #[pin]
    body: B,
}

impl<B> IntoStream<B> {
    fn new(body: B) -> Self {
        Self { body }
    }
}

pub(crate) trait BodyStreamExt: Body {
    fn into_stream(self) -> IntoStream<Self>
    where
        Self: Sized,
    {
        IntoStream::new(self)
    }
}

impl<B: Body> BodyStreamExt for B {}

impl<B: Body> Stream for IntoStream<B> {
    type Item = Result<B::Data, B::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().body.poll_data(cx)
    }
}
