use std::fmt;

use http::header::HeaderValue;
use http::{HeaderMap, HeaderName, Method, Uri};

use crate::error::Error;
use crate::host::RegistryHost;
use crate::scope::RepositoryScope;
use crate::uri::UriExtension as _;

/// Query parameter naming the upstream registry when talking to a mirror.
const NAMESPACE_QUERY: &str = "ns";

/// `host` with the port dropped when it is the default for `scheme`.
fn without_default_port<'a>(host: &'a str, scheme: &str) -> &'a str {
    let port = match scheme {
        "https" => ":443",
        "http" => ":80",
        _ => return host,
    };
    host.strip_suffix(port).unwrap_or(host)
}

/// A request to one registry host, built up before it is opened.
#[derive(Debug, Clone)]
pub struct RegistryRequest {
    host: RegistryHost,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    scope: Option<RepositoryScope>,
}

impl RegistryRequest {
    pub(crate) fn new(host: RegistryHost, method: Method, uri: Uri) -> Self {
        Self {
            host,
            method,
            uri,
            headers: HeaderMap::new(),
            scope: None,
        }
    }

    /// The host this request is addressed to.
    pub fn host(&self) -> &RegistryHost {
        &self.host
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The full request URI, including query parameters.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The headers set so far.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The authorization scope attached to this request.
    pub fn scope(&self) -> Option<&RepositoryScope> {
        self.scope.as_ref()
    }

    /// Append a query parameter. Repeated keys are kept, in order.
    pub fn add_query(&mut self, key: &str, value: &str) -> Result<(), Error> {
        self.uri = self.uri.clone().append_query(key, value)?;
        Ok(())
    }

    /// Tell a mirror which registry this request is really for.
    ///
    /// The `ns` parameter is only added when the request goes to a host other
    /// than `hostname` itself.
    pub fn add_namespace(&mut self, hostname: &str) -> Result<(), Error> {
        if hostname.is_empty() {
            return Err(Error::EmptyNamespace);
        }

        let scheme = self.host.scheme();
        if without_default_port(self.host.host(), scheme) == without_default_port(hostname, scheme)
        {
            return Ok(());
        }

        self.add_query(NAMESPACE_QUERY, hostname)
    }

    /// Attach the authorization scope this request needs.
    pub fn with_scope(mut self, scope: RepositoryScope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Set a header, replacing any previous value.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub(crate) fn into_http(self) -> http::Request<hyperdriver::Body> {
        let mut req = http::Request::new(hyperdriver::Body::empty());
        *req.method_mut() = self.method;
        *req.uri_mut() = self.uri;
        *req.headers_mut() = self.headers;
        if let Some(scope) = self.scope {
            req.extensions_mut().insert(scope);
        }
        req
    }
}

impl fmt::Display for RegistryRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostCapabilities;

    fn request(host: &str) -> RegistryRequest {
        let host = RegistryHost::parse(host, HostCapabilities::all()).unwrap();
        let uri = format!("{}/library/app/referrers/sha256:abc123", host.base())
            .parse()
            .unwrap();
        RegistryRequest::new(host, Method::GET, uri)
    }

    #[test]
    fn queries_keep_order() {
        let mut req = request("https://registry.example.com");
        req.add_query("artifactType", "a").unwrap();
        req.add_query("artifactType", "b").unwrap();
        assert_eq!(req.uri().query(), Some("artifactType=a&artifactType=b"));
    }

    #[test]
    fn namespace_skipped_for_origin() {
        let mut req = request("https://registry.example.com");
        req.add_namespace("registry.example.com").unwrap();
        assert_eq!(req.uri().query(), None);
    }

    #[test]
    fn namespace_added_for_mirror() {
        let mut req = request("https://mirror.example.com");
        req.add_namespace("registry.example.com").unwrap();
        assert_eq!(req.uri().query(), Some("ns=registry.example.com"));
        assert_eq!(
            req.to_string(),
            "GET https://mirror.example.com/v2/library/app/referrers/sha256:abc123?ns=registry.example.com"
        );
    }

    #[test]
    fn namespace_ignores_default_port() {
        let mut req = request("https://registry.example.com");
        req.add_namespace("registry.example.com:443").unwrap();
        assert_eq!(req.uri().query(), None);

        let mut req = request("http://localhost:80");
        req.add_namespace("localhost").unwrap();
        assert_eq!(req.uri().query(), None);

        let mut req = request("https://registry.example.com:5000");
        req.add_namespace("registry.example.com:5000").unwrap();
        assert_eq!(req.uri().query(), None);

        let mut req = request("https://registry.example.com");
        req.add_namespace("registry.example.com:80").unwrap();
        assert_eq!(req.uri().query(), Some("ns=registry.example.com%3A80"));
    }

    #[test]
    fn namespace_must_be_named() {
        let mut req = request("https://mirror.example.com");
        assert!(matches!(req.add_namespace(""), Err(Error::EmptyNamespace)));
    }

    #[test]
    fn scope_travels_as_extension() {
        let reference: distribution::Reference =
            "registry.example.com/library/app".parse().unwrap();
        let scope = RepositoryScope::new(&reference, false).unwrap();
        let req = request("https://registry.example.com")
            .with_scope(scope.clone())
            .into_http();
        assert_eq!(req.extensions().get::<RepositoryScope>(), Some(&scope));
        assert_eq!(req.method(), Method::GET);
    }
}
