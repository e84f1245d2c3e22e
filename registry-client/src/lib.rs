//! # Registry client
//!
//! The transport half of talking to an OCI registry which is reachable
//! through several candidate hosts (the origin and its mirrors). A
//! [`RegistryClient`] is bound to one repository and knows its hosts in
//! priority order; callers pick hosts by capability, build a
//! [`RegistryRequest`] for one of them, and [`open`](RegistryClient::open) it
//! to get a [`Content`] stream back.
//!
//! Absence is reported as an error for which [`Error::is_not_found`] is true,
//! so that callers can tell "try somewhere else" apart from real failures.

use std::sync::Arc;

use arc_swap::ArcSwap;
use arc_swap::Guard;
use distribution::Reference;
use http::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, HeaderValue};
use http::{Method, StatusCode};
use hyperdriver::service::SharedService;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

mod content;
mod credentials;
pub mod error;
mod host;
pub mod mock;
mod request;
mod scope;
mod secret;
pub mod uri;

pub use self::content::Content;
pub use self::credentials::{Credentials, CredentialsLayer, CredentialsService, basic_auth};
pub use self::error::{Error, ErrorKind, HttpResponseError};
pub use self::host::{Capability, HostCapabilities, RegistryHost, UnknownCapability};
pub use self::request::RegistryRequest;
pub use self::scope::RepositoryScope;
pub use self::secret::Secret;
use self::uri::UriExtension as _;

/// A client for one repository, reachable through an ordered list of hosts.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    reference: Arc<Reference>,
    hosts: Arc<ArcSwap<Vec<RegistryHost>>>,
    inner: hyperdriver::client::SharedClientService<hyperdriver::Body, hyperdriver::Body>,
    credentials: Arc<ArcSwap<Credentials>>,
}

impl RegistryClient {
    /// Create a client for `reference` using the given hosts, in priority order.
    pub fn new(reference: Reference, hosts: Vec<RegistryHost>, credentials: Credentials) -> Self {
        let credentials = Arc::new(ArcSwap::new(Arc::new(credentials)));
        let inner = hyperdriver::Client::build_tcp_http()
            .with_default_tls()
            .layer(CredentialsLayer::new(credentials.clone()))
            .build_service();

        RegistryClient {
            reference: Arc::new(reference),
            hosts: Arc::new(ArcSwap::new(Arc::new(hosts))),
            inner,
            credentials,
        }
    }

    /// Create a client which sends requests through `inner` instead of the network.
    pub fn new_with_inner_service<S>(
        reference: Reference,
        hosts: Vec<RegistryHost>,
        credentials: Credentials,
        inner: S,
    ) -> Self
    where
        S: tower::Service<
                http::Request<hyperdriver::Body>,
                Response = http::Response<hyperdriver::Body>,
                Error = hyperdriver::client::Error,
            > + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        let credentials = Arc::new(ArcSwap::new(Arc::new(credentials)));

        let service = tower::ServiceBuilder::new()
            .layer(SharedService::layer())
            .layer(CredentialsLayer::new(credentials.clone()))
            .service(inner);

        RegistryClient {
            reference: Arc::new(reference),
            hosts: Arc::new(ArcSwap::new(Arc::new(hosts))),
            inner: service,
            credentials,
        }
    }

    /// The repository this client talks to.
    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    /// All configured hosts, in priority order.
    pub fn hosts(&self) -> Guard<Arc<Vec<RegistryHost>>> {
        self.hosts.load()
    }

    /// Replace the configured hosts.
    pub fn set_hosts(&self, hosts: Vec<RegistryHost>) {
        self.hosts.store(Arc::new(hosts));
    }

    /// Replace the credentials used for subsequent requests.
    pub fn refresh_credentials(&self, credentials: Credentials) {
        self.credentials.store(Arc::new(credentials));
    }

    /// Hosts declaring at least one of `any_of`, in priority order.
    ///
    /// Hosts are neither reordered nor deduplicated.
    pub fn filter_hosts(&self, any_of: HostCapabilities) -> Vec<RegistryHost> {
        self.hosts
            .load()
            .iter()
            .filter(|host| host.capabilities().includes_any(any_of))
            .cloned()
            .collect()
    }

    /// Build a request to `host` for `<repository>/<segments...>` under its API root.
    pub fn request(
        &self,
        host: &RegistryHost,
        method: Method,
        segments: &[&str],
    ) -> RegistryRequest {
        let base = host.base().clone().join(self.reference.repository());
        let uri = segments.iter().fold(base, |uri, segment| uri.join(segment));
        RegistryRequest::new(host.clone(), method, uri)
    }

    /// Send `request` and return the response body with its content length.
    ///
    /// The request asks for `media_type`. A 404 is reported as
    /// [`Error::NotFound`] when `allow_not_found_fallback` is set, so the
    /// caller can try elsewhere; without it the 404 is an ordinary
    /// [`Error::Response`]. A nonzero `expected_size` must match the length
    /// the registry reports, when it reports one.
    ///
    /// Cancelling `cancel` aborts the request with [`Error::Cancelled`].
    /// On every error the response body has been consumed or dropped.
    pub async fn open(
        &self,
        cancel: &CancellationToken,
        request: RegistryRequest,
        media_type: &str,
        expected_size: u64,
        allow_not_found_fallback: bool,
    ) -> Result<(Content, u64), Error> {
        let uri = request.uri().clone();
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(%uri, "request cancelled");
                Err(Error::Cancelled)
            }
            result = self.fetch(request, media_type, expected_size, allow_not_found_fallback) => result,
        }
    }

    async fn fetch(
        &self,
        request: RegistryRequest,
        media_type: &str,
        expected_size: u64,
        allow_not_found_fallback: bool,
    ) -> Result<(Content, u64), Error> {
        let accept = HeaderValue::try_from(format!("{media_type}, */*"))?;
        let request = request.header(ACCEPT, accept);

        let uri = request.uri().clone();
        tracing::trace!(%request, "sending request");

        let response = self
            .inner
            .clone()
            .oneshot(request.into_http())
            .await
            .map_err(Error::Request)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND && allow_not_found_fallback {
            tracing::debug!(%uri, "content not found");
            return Err(Error::NotFound(format!("content at {uri}")));
        }

        if !status.is_success() {
            return Err(Error::Response(
                HttpResponseError::from_response(uri, response).await,
            ));
        }

        let reported = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .or_else(|| http_body::Body::size_hint(response.body()).exact());

        if let Some(actual) = reported {
            if expected_size != 0 && actual != expected_size {
                return Err(Error::SizeMismatch {
                    expected: expected_size,
                    actual,
                });
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let content = Content::new(response.into_body(), content_type);
        Ok((content, reported.unwrap_or(expected_size)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mock::MockRegistry;

    fn client(mock: MockRegistry) -> RegistryClient {
        RegistryClient::new_with_inner_service(
            "registry.example.com/library/app".parse().unwrap(),
            vec![
                RegistryHost::parse("https://mirror.example.com", HostCapabilities::mirror())
                    .unwrap(),
                RegistryHost::parse("https://registry.example.com", HostCapabilities::all())
                    .unwrap(),
            ],
            Credentials::bearer("token"),
            mock,
        )
    }

    #[test]
    fn extensions_produce_send_futures() {
        let client = client(MockRegistry::new());
        let host = client.hosts()[0].clone();
        let request = client.request(&host, Method::GET, &["manifests", "latest"]);
        let cancel = CancellationToken::new();

        fn assert_send<T: Send>(_t: T) {}

        let fut = client.open(&cancel, request, distribution::media_types::IMAGE_INDEX, 0, true);
        assert_send(fut);
    }

    #[test]
    fn request_paths() {
        let client = client(MockRegistry::new());
        let host = client.hosts()[1].clone();
        let request = client.request(&host, Method::GET, &["referrers", "sha256:abc123"]);
        assert_eq!(
            request.uri().to_string(),
            "https://registry.example.com/v2/library/app/referrers/sha256:abc123"
        );
    }

    #[test]
    fn filter_hosts_keeps_order() {
        let client = client(MockRegistry::new());

        let hosts = client.filter_hosts(HostCapabilities::RESOLVE | HostCapabilities::REFERRERS);
        let names: Vec<_> = hosts.iter().map(|host| host.host()).collect();
        assert_eq!(names, ["mirror.example.com", "registry.example.com"]);

        let hosts = client.filter_hosts(HostCapabilities::PUSH);
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].host(), "registry.example.com");
    }

    #[tokio::test]
    async fn open_returns_content_and_length() {
        let mock = MockRegistry::new();
        mock.add(
            "registry.example.com",
            "/v2/library/app/manifests/latest",
            http::StatusCode::OK,
            b"{\"schemaVersion\":2}".to_vec(),
        );

        let client = client(mock.clone());
        let host = client.hosts()[1].clone();
        let request = client.request(&host, Method::GET, &["manifests", "latest"]);

        let (content, length) = client
            .open(
                &CancellationToken::new(),
                request,
                distribution::media_types::IMAGE_INDEX,
                0,
                true,
            )
            .await
            .unwrap();
        assert_eq!(length, 19);
        assert_eq!(content.bytes().await.unwrap().as_ref(), b"{\"schemaVersion\":2}");

        let seen = mock.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0].accept.as_deref(),
            Some("application/vnd.oci.image.index.v1+json, */*")
        );
        assert_eq!(seen[0].authorization.as_deref(), Some("Bearer token"));
    }

    #[tokio::test]
    async fn open_classifies_not_found() {
        let client = client(MockRegistry::new());
        let host = client.hosts()[1].clone();
        let cancel = CancellationToken::new();

        let request = client.request(&host, Method::GET, &["manifests", "missing"]);
        let err = client
            .open(&cancel, request.clone(), "application/json", 0, true)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = client
            .open(&cancel, request, "application/json", 0, false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Response);
    }

    #[tokio::test]
    async fn open_checks_expected_size() {
        let mock = MockRegistry::new();
        mock.add(
            "registry.example.com",
            "/v2/library/app/manifests/latest",
            http::StatusCode::OK,
            b"four".to_vec(),
        );
        let client = client(mock);
        let host = client.hosts()[1].clone();
        let request = client.request(&host, Method::GET, &["manifests", "latest"]);

        let err = client
            .open(&CancellationToken::new(), request, "application/json", 10, true)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::SizeMismatch {
                expected: 10,
                actual: 4
            }
        ));
    }

    #[tokio::test]
    async fn body_read_honors_cancellation() {
        let mock = MockRegistry::new();
        mock.add(
            "registry.example.com",
            "/v2/library/app/manifests/latest",
            http::StatusCode::OK,
            b"{\"schemaVersion\":2}".to_vec(),
        );
        let client = client(mock);
        let host = client.hosts()[1].clone();
        let cancel = CancellationToken::new();

        let request = client.request(&host, Method::GET, &["manifests", "latest"]);
        let (content, _) = client
            .open(&cancel, request, "application/json", 0, true)
            .await
            .unwrap();
        let bytes = content.bytes_until_cancelled(&cancel).await.unwrap();
        assert_eq!(bytes.as_ref(), b"{\"schemaVersion\":2}");

        let request = client.request(&host, Method::GET, &["manifests", "latest"]);
        let (content, _) = client
            .open(&cancel, request, "application/json", 0, true)
            .await
            .unwrap();
        cancel.cancel();
        let err = content.bytes_until_cancelled(&cancel).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn open_honors_cancellation() {
        let mock = MockRegistry::new();
        mock.hang("registry.example.com", "/v2/library/app/manifests/latest");
        let client = client(mock);
        let host = client.hosts()[1].clone();
        let request = client.request(&host, Method::GET, &["manifests", "latest"]);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let err = client
            .open(&cancel, request, "application/json", 0, true)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }
}
