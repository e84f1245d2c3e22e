//! URI utilities.

use camino::Utf8Path;
use http::Uri;
use thiserror::Error;
use url::Url;

/// The provided URL cannot be a base URL,
/// and so is not valid as the base part of a registry URL.
#[derive(Debug, Error)]
#[error("cannot be a base URL: {0}")]
pub struct CannotBeABase(url::Url);

/// Errors that can occur when parsing or extending a URI.
#[derive(Debug, Error)]
pub enum ParseUriError {
    /// An error occurred while parsing the URI.
    #[error(transparent)]
    Url(#[from] url::ParseError),

    /// The provided URL cannot be a base URL,
    #[error(transparent)]
    CannotBeABase(#[from] CannotBeABase),

    /// The URI is invalid, but URL parsing succeded.
    #[error("invalid URI: {0}")]
    Invalid(http::uri::InvalidUri),

    /// The URI has no scheme or authority.
    #[error("URI is not absolute: {0}")]
    NotAbsolute(Uri),
}

/// Convert a parsed URL into an absolute URI.
pub(crate) fn url_to_uri(url: Url) -> Result<Uri, ParseUriError> {
    if url.cannot_be_a_base() {
        return Err(CannotBeABase(url).into());
    }

    url.as_str().parse().map_err(ParseUriError::Invalid)
}

/// Extension trait for URIs.
pub trait UriExtension: Sized {
    /// Join a path to a URI.
    fn join<P: AsRef<str>>(self, path: P) -> Uri;

    /// Append a query parameter, keeping any existing parameters
    /// (including ones with the same key) in order.
    fn append_query(self, key: &str, value: &str) -> Result<Uri, ParseUriError>;
}

impl UriExtension for Uri {
    fn join<P: AsRef<str>>(self, path: P) -> Uri {
        let mut parts = self.into_parts();

        parts.path_and_query = parts.path_and_query.as_ref().map(|pq| {
            let joined = Utf8Path::new(pq.path()).join(path.as_ref());
            let joined = match pq.query() {
                Some(query) => format!("{joined}?{query}"),
                None => joined.to_string(),
            };
            http::uri::PathAndQuery::from_maybe_shared(joined).unwrap()
        });
        Uri::from_parts(parts).unwrap()
    }

    fn append_query(self, key: &str, value: &str) -> Result<Uri, ParseUriError> {
        if self.scheme().is_none() || self.authority().is_none() {
            return Err(ParseUriError::NotAbsolute(self));
        }

        let mut url = Url::parse(&self.to_string())?;
        url.query_pairs_mut().append_pair(key, value);
        url_to_uri(url)
    }
}
