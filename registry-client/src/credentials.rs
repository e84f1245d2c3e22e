//! Registry credentials.
//!
//! Credentials are held behind an [`ArcSwap`] so that a long running client
//! can refresh them (for example, after a token is re-issued) without being
//! rebuilt. Token issuance itself happens elsewhere; this layer only attaches
//! whatever credential is current.

use std::sync::Arc;

use arc_swap::ArcSwap;
use http::HeaderValue;
use tower::layer::Layer;

use crate::scope::RepositoryScope;
use crate::secret::Secret;

/// Create a basic authentication header value, with the password being optional.
///
/// # Example
/// ```rust
/// use registry_client::basic_auth;
///
/// let header = basic_auth("username", Some("password"));
/// assert_eq!(header.to_str().unwrap(), "Basic dXNlcm5hbWU6cGFzc3dvcmQ=");
/// ```
pub fn basic_auth<U, P>(username: U, password: Option<P>) -> HeaderValue
where
    U: std::fmt::Display,
    P: std::fmt::Display,
{
    use base64::prelude::BASE64_STANDARD;
    use base64::write::EncoderWriter;
    use std::io::Write;

    let mut buf = b"Basic ".to_vec();
    {
        let mut encoder = EncoderWriter::new(&mut buf, &BASE64_STANDARD);
        let _ = write!(encoder, "{}:", username);
        if let Some(password) = password {
            let _ = write!(encoder, "{}", password);
        }
    }
    let mut header = HeaderValue::from_bytes(&buf).expect("base64 is always valid HeaderValue");
    header.set_sensitive(true);
    header
}

/// How requests to a registry are authorized.
#[derive(Debug, Clone, Default)]
pub enum Credentials {
    /// Send no `Authorization` header.
    #[default]
    Anonymous,

    /// Username and optional password.
    Basic {
        /// Registry username.
        username: String,
        /// Registry password.
        password: Option<Secret>,
    },

    /// A pre-issued bearer token.
    Bearer(Secret),
}

impl Credentials {
    /// Basic credentials.
    pub fn basic<U, P>(username: U, password: Option<P>) -> Self
    where
        U: Into<String>,
        P: Into<Secret>,
    {
        Credentials::Basic {
            username: username.into(),
            password: password.map(Into::into),
        }
    }

    /// Bearer token credentials.
    pub fn bearer<T: Into<Secret>>(token: T) -> Self {
        Credentials::Bearer(token.into())
    }

    fn header_value(&self) -> Option<HeaderValue> {
        match self {
            Credentials::Anonymous => None,
            Credentials::Basic { username, password } => {
                Some(basic_auth(username, password.as_ref().map(Secret::revealed)))
            }
            Credentials::Bearer(token) => match token.bearer() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("bearer token is not a valid header value, sending anonymously");
                    None
                }
            },
        }
    }

    /// Attach these credentials to a request which isn't already authorized.
    pub fn authorize<B>(&self, mut req: http::Request<B>) -> http::Request<B> {
        if req.headers().contains_key(http::header::AUTHORIZATION) {
            tracing::warn!("{} header already set", http::header::AUTHORIZATION);
            return req;
        }

        if let Some(scope) = req.extensions().get::<RepositoryScope>() {
            tracing::trace!(%scope, uri=%req.uri(), "authorizing request");
        }

        if let Some(value) = self.header_value() {
            req.headers_mut()
                .append(http::header::AUTHORIZATION, value);
        }
        req
    }
}

/// A layer which authorizes each request with the current credentials.
#[derive(Debug)]
pub struct CredentialsLayer {
    credentials: Arc<ArcSwap<Credentials>>,
}

impl Clone for CredentialsLayer {
    fn clone(&self) -> Self {
        Self {
            credentials: self.credentials.clone(),
        }
    }
}

impl CredentialsLayer {
    pub(crate) fn new(credentials: Arc<ArcSwap<Credentials>>) -> Self {
        Self { credentials }
    }
}

impl<S> Layer<S> for CredentialsLayer {
    type Service = CredentialsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CredentialsService {
            inner,
            credentials: self.credentials.clone(),
        }
    }
}

/// A service which authorizes each request with the current credentials.
#[derive(Debug)]
pub struct CredentialsService<S> {
    inner: S,
    credentials: Arc<ArcSwap<Credentials>>,
}

impl<S: Clone> Clone for CredentialsService<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            credentials: self.credentials.clone(),
        }
    }
}

impl<S, BIn, BOut> tower::Service<http::Request<BIn>> for CredentialsService<S>
where
    S: tower::Service<http::Request<BIn>, Response = http::Response<BOut>>,
    S::Future: Send + 'static,
{
    type Response = http::Response<BOut>;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<BIn>) -> Self::Future {
        let req = self.credentials.load().authorize(req);
        self.inner.call(req)
    }
}
