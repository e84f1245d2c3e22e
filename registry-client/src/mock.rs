//! An in-memory stand-in for registry hosts.
//!
//! [`MockRegistry`] answers requests for any number of hosts from canned
//! responses keyed by host and path, and records every request it sees so
//! tests can check what was asked for and in which order. Paths with no
//! canned response get a 404 with an OCI error body.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use http::{HeaderMap, Method, StatusCode, header};
use parking_lot::Mutex;

const NOT_FOUND_BODY: &str =
    r#"{"errors":[{"code":"MANIFEST_UNKNOWN","message":"manifest unknown"}]}"#;

#[derive(Debug, Clone)]
enum Reply {
    Respond {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    },
    Fail,
    Hang,
}

/// A request received by a [`MockRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Request method.
    pub method: Method,
    /// Host (authority) the request was sent to.
    pub host: String,
    /// Request path.
    pub path: String,
    /// Raw query string, if any.
    pub query: Option<String>,
    /// The `Accept` header, if any.
    pub accept: Option<String>,
    /// The `Authorization` header, if any.
    pub authorization: Option<String>,
}

impl RecordedRequest {
    /// `host/path?query`, handy for asserting on request order.
    pub fn target(&self) -> String {
        match &self.query {
            Some(query) => format!("{}{}?{}", self.host, self.path, query),
            None => format!("{}{}", self.host, self.path),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    replies: HashMap<(String, String), Reply>,
    requests: Vec<RecordedRequest>,
}

/// A mock transport serving canned registry responses.
///
/// Clones share their responses and request log.
#[derive(Debug, Default, Clone)]
pub struct MockRegistry {
    state: Arc<Mutex<State>>,
}

impl MockRegistry {
    /// An empty mock which answers every request with a 404.
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to requests for `<host><path>` with `status` and `body`.
    pub fn add(&self, host: &str, path: &str, status: StatusCode, body: impl Into<Bytes>) {
        self.add_with_headers(host, path, status, HeaderMap::new(), body)
    }

    /// Respond to `<host><path>` with `status`, extra `headers` and `body`.
    pub fn add_with_headers(
        &self,
        host: &str,
        path: &str,
        status: StatusCode,
        headers: HeaderMap,
        body: impl Into<Bytes>,
    ) {
        self.insert(
            host,
            path,
            Reply::Respond {
                status,
                headers,
                body: body.into(),
            },
        );
    }

    /// Fail requests to `<host><path>` in transport, before any response.
    pub fn fail(&self, host: &str, path: &str) {
        self.insert(host, path, Reply::Fail);
    }

    /// Never answer requests to `<host><path>`.
    pub fn hang(&self, host: &str, path: &str) {
        self.insert(host, path, Reply::Hang);
    }

    fn insert(&self, host: &str, path: &str, reply: Reply) {
        self.state
            .lock()
            .replies
            .insert((host.to_owned(), path.to_owned()), reply);
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// The `host/path?query` target of every request received so far, in order.
    pub fn targets(&self) -> Vec<String> {
        self.state
            .lock()
            .requests
            .iter()
            .map(RecordedRequest::target)
            .collect()
    }
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

fn respond(status: StatusCode, headers: &HeaderMap, body: Bytes) -> http::Response<hyperdriver::Body> {
    let mut builder = http::Response::builder()
        .status(status)
        .version(http::Version::HTTP_11)
        .header(header::CONTENT_LENGTH, body.len());

    for (key, value) in headers.iter() {
        builder = builder.header(key, value);
    }

    builder
        .body(hyperdriver::Body::from(body))
        .expect("mock response is valid")
}

impl tower::Service<http::Request<hyperdriver::Body>> for MockRegistry {
    type Response = http::Response<hyperdriver::Body>;
    type Error = hyperdriver::client::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<hyperdriver::Body>) -> Self::Future {
        let recorded = RecordedRequest {
            method: req.method().clone(),
            host: req
                .uri()
                .authority()
                .map(|authority| authority.as_str().to_owned())
                .unwrap_or_default(),
            path: req.uri().path().to_owned(),
            query: req.uri().query().map(str::to_owned),
            accept: header_string(req.headers(), header::ACCEPT),
            authorization: header_string(req.headers(), header::AUTHORIZATION),
        };

        let reply = {
            let mut state = self.state.lock();
            let reply = state
                .replies
                .get(&(recorded.host.clone(), recorded.path.clone()))
                .cloned();
            tracing::trace!(request = %recorded.target(), "mock registry request");
            state.requests.push(recorded);
            reply
        };

        match reply {
            Some(Reply::Respond {
                status,
                headers,
                body,
            }) => Box::pin(std::future::ready(Ok(respond(status, &headers, body)))),
            Some(Reply::Fail) => Box::pin(std::future::ready(Err(
                hyperdriver::client::Error::RequestTimeout,
            ))),
            Some(Reply::Hang) => Box::pin(std::future::pending()),
            None => {
                let mut headers = HeaderMap::new();
                headers.insert(
                    header::CONTENT_TYPE,
                    http::HeaderValue::from_static("application/json"),
                );
                Box::pin(std::future::ready(Ok(respond(
                    StatusCode::NOT_FOUND,
                    &headers,
                    Bytes::from_static(NOT_FOUND_BODY.as_bytes()),
                ))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tower::ServiceExt as _;

    use super::*;

    fn get(uri: &str) -> http::Request<hyperdriver::Body> {
        http::Request::builder()
            .uri(uri)
            .body(hyperdriver::Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn serves_canned_responses_per_host() {
        let mock = MockRegistry::new();
        mock.add("a.example.com", "/v2/", StatusCode::OK, "a");

        let response = mock
            .clone()
            .oneshot(get("https://a.example.com/v2/"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = mock
            .clone()
            .oneshot(get("https://b.example.com/v2/?ns=a.example.com"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        assert_eq!(
            mock.targets(),
            ["a.example.com/v2/", "b.example.com/v2/?ns=a.example.com"]
        );
    }

    #[tokio::test]
    async fn fails_in_transport() {
        let mock = MockRegistry::new();
        mock.fail("a.example.com", "/v2/");
        let result = mock.clone().oneshot(get("https://a.example.com/v2/")).await;
        assert!(result.is_err());
    }
}
