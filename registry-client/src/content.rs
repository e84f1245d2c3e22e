//! Content streamed back from a registry.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Frame, SizeHint};
use http_body_util::BodyExt as _;
use hyperdriver::Body;
use pin_project::pin_project;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// An open response body from a registry.
///
/// Owning a `Content` owns the underlying connection stream; dropping it
/// releases the stream. It can be polled as an [`http_body::Body`] or
/// collected with [`Content::bytes`].
#[pin_project]
#[derive(Debug)]
pub struct Content {
    #[pin]
    body: Body,
    media_type: Option<String>,
}

impl Content {
    pub(crate) fn new(body: Body, media_type: Option<String>) -> Self {
        Self { body, media_type }
    }

    /// The `Content-Type` the registry reported, if any.
    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    /// Collect the whole body.
    pub async fn bytes(self) -> Result<Bytes, Error> {
        self.body
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .map_err(|err| Error::Body(err.into()))
    }

    /// Collect the whole body, giving up with [`Error::Cancelled`] once
    /// `cancel` fires.
    pub async fn bytes_until_cancelled(self, cancel: &CancellationToken) -> Result<Bytes, Error> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!("body read cancelled");
                Err(Error::Cancelled)
            }
            result = self.bytes() => result,
        }
    }

    /// Collect the body and deserialize it as JSON.
    pub async fn json<T>(self) -> Result<T, Error>
    where
        T: serde::de::DeserializeOwned,
    {
        let bytes = self.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|err| Error::Body(err.into()))
    }

    /// Unwrap the raw response body.
    pub fn into_body(self) -> Body {
        self.body
    }
}

impl http_body::Body for Content {
    type Data = <Body as http_body::Body>::Data;
    type Error = <Body as http_body::Body>::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        http_body::Body::poll_frame(self.project().body, cx)
    }

    fn is_end_stream(&self) -> bool {
        http_body::Body::is_end_stream(&self.body)
    }

    fn size_hint(&self) -> SizeHint {
        http_body::Body::size_hint(&self.body)
    }
}
