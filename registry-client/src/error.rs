//! Error types for registry requests
use std::fmt;

use http::{StatusCode, Uri};
use http_body_util::BodyExt as _;
use thiserror::Error;

use crate::uri::ParseUriError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Categorizes registry errors by what the caller should do about them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The content is absent from the host that was asked. Another host or
    /// another protocol may still have it.
    NotFound,

    /// The repository authorization scope could not be established.
    Scope,

    /// The request could not be built.
    Invalid,

    /// The request failed in transport.
    Request,

    /// The registry returned an error status.
    Response,

    /// Reading or checking the response body failed.
    Body,

    /// The operation was cancelled by the caller.
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::Scope => write!(f, "scope"),
            ErrorKind::Invalid => write!(f, "invalid request"),
            ErrorKind::Request => write!(f, "request"),
            ErrorKind::Response => write!(f, "response"),
            ErrorKind::Body => write!(f, "body"),
            ErrorKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// An error occured while talking to a registry
#[derive(Debug, Error)]
pub enum Error {
    /// The content is not present where it was looked for.
    #[error("{0}: not found")]
    NotFound(String),

    /// The repository scope for authorization could not be established.
    #[error("invalid repository scope for {locator}")]
    Scope {
        /// The `<host>/<repository>` locator.
        locator: String,
        /// Why the locator could not be parsed.
        #[source]
        source: url::ParseError,
    },

    /// A request URI could not be built.
    #[error(transparent)]
    Uri(#[from] ParseUriError),

    /// A header value could not be encoded.
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    /// A namespace query parameter was requested with no hostname.
    #[error("namespace hostname must not be empty")]
    EmptyNamespace,

    /// An error occured while sending the request
    #[error(transparent)]
    Request(hyperdriver::client::Error),

    /// The registry returned an error response.
    #[error(transparent)]
    Response(HttpResponseError),

    /// An error occured while recieving the response body
    #[error("error reading response body: {0}")]
    Body(#[source] BoxError),

    /// The registry reported a different size than expected.
    #[error("unexpected content length: expected {expected}, got {actual}")]
    SizeMismatch {
        /// The size the caller expected.
        expected: u64,
        /// The size the registry reported.
        actual: u64,
    },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Scope { .. } => ErrorKind::Scope,
            Error::Uri(_) | Error::InvalidHeader(_) | Error::EmptyNamespace => ErrorKind::Invalid,
            Error::Request(_) => ErrorKind::Request,
            Error::Response(_) => ErrorKind::Response,
            Error::Body(_) | Error::SizeMismatch { .. } => ErrorKind::Body,
            Error::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether the content was simply absent, as opposed to any other failure.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// A registry returned an error response
#[derive(Debug, Clone)]
pub struct HttpResponseError {
    /// The URI which was requested
    pub uri: Uri,

    /// The HTTP status code of the response
    pub status: StatusCode,

    /// The message body of the response
    pub message: String,
}

impl HttpResponseError {
    /// Create a new HTTP response error, consuming the response body.
    pub async fn from_response(uri: Uri, response: http::Response<hyperdriver::Body>) -> Self {
        let status = response.status();
        let message = match response.into_body().collect().await {
            Ok(collected) => String::from_utf8_lossy(&collected.to_bytes()).into_owned(),
            Err(err) => format!("failed to read response body: {err}"),
        };

        Self {
            uri,
            status,
            message,
        }
    }
}

impl fmt::Display for HttpResponseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "HTTP {} from {}: {}", self.status, self.uri, self.message.trim())
    }
}

impl std::error::Error for HttpResponseError {}
