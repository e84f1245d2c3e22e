//! Walk a registry's hosts looking for the referrers of a digest.

use distribution::{Descriptor, Digest, media_types};
use http::Method;
use registry_client::{
    Capability, Content, Error, HostCapabilities, RegistryClient, RegistryHost, RegistryRequest,
    RepositoryScope,
};
use tokio_util::sync::CancellationToken;

/// One way of asking a host for the referrers of a digest.
#[derive(Debug)]
pub struct Strategy {
    /// Name used in diagnostics.
    pub name: &'static str,

    /// The host capability required to attempt this strategy.
    pub capability: Capability,

    endpoint: &'static str,
    reference: fn(&Digest) -> String,
    artifact_filters: bool,
}

impl Strategy {
    fn request<S: AsRef<str>>(
        &self,
        client: &RegistryClient,
        host: &RegistryHost,
        digest: &Digest,
        artifact_types: &[S],
        scope: &RepositoryScope,
    ) -> Result<RegistryRequest, Error> {
        let reference = (self.reference)(digest);
        let mut request = client
            .request(host, Method::GET, &[self.endpoint, reference.as_str()])
            .with_scope(scope.clone());

        if self.artifact_filters {
            for artifact_type in artifact_types {
                request.add_query("artifactType", artifact_type.as_ref())?;
            }
        }

        request.add_namespace(client.reference().hostname())?;
        Ok(request)
    }
}

fn digest_reference(digest: &Digest) -> String {
    digest.to_string()
}

/// Strategies in the order they are attempted on each host.
pub const STRATEGIES: &[Strategy] = &[
    // GET <repo>/referrers/<digest>?artifactType=...
    Strategy {
        name: "referrers-api",
        capability: Capability::Referrers,
        endpoint: "referrers",
        reference: digest_reference,
        artifact_filters: true,
    },
    // GET <repo>/manifests/<alg>-<hex>.sig, for registries without the
    // referrers API.
    Strategy {
        name: "signature-tag",
        capability: Capability::Resolve,
        endpoint: "manifests",
        reference: Digest::signature_tag,
        artifact_filters: false,
    },
];

/// Finds the referrers of a digest across a registry's hosts.
///
/// Hosts are tried in priority order. On each host every strategy the host
/// has the capability for is tried in [`STRATEGIES`] order. The first
/// success wins, a not-found moves on to the next strategy or host, and any
/// other error aborts the whole walk.
#[derive(Debug, Clone)]
pub struct Resolver {
    client: RegistryClient,
}

impl Resolver {
    /// Resolve referrers through `client`.
    pub fn new(client: RegistryClient) -> Self {
        Self { client }
    }

    /// The underlying registry client.
    pub fn client(&self) -> &RegistryClient {
        &self.client
    }

    /// Fetch the referrers of `digest`, optionally narrowed to `artifact_types`.
    ///
    /// The returned descriptor always has the image index media type, the
    /// size reported by the host, and no digest: neither strategy gets a
    /// registry-confirmed digest for what it returns.
    #[tracing::instrument(skip(self, cancel, digest, artifact_types), fields(%digest))]
    pub async fn fetch_referrers<S: AsRef<str>>(
        &self,
        cancel: &CancellationToken,
        digest: &Digest,
        artifact_types: &[S],
    ) -> Result<(Content, Descriptor), Error> {
        let mut descriptor = Descriptor::new(media_types::IMAGE_INDEX);

        let hosts = self
            .client
            .filter_hosts(HostCapabilities::RESOLVE | HostCapabilities::REFERRERS);
        if hosts.is_empty() {
            return Err(Error::NotFound("no pull hosts".into()));
        }

        let scope = RepositoryScope::new(self.client.reference(), false)?;

        for host in &hosts {
            tracing::debug!(
                host = %host.host(),
                capabilities = %host.capabilities(),
                "trying host for referrers"
            );

            for strategy in STRATEGIES {
                if !host.capabilities().includes(strategy.capability) {
                    continue;
                }

                let request =
                    strategy.request(&self.client, host, digest, artifact_types, &scope)?;
                tracing::debug!(strategy = strategy.name, %request, "fetching referrers");

                match self
                    .client
                    .open(cancel, request, media_types::IMAGE_INDEX, 0, true)
                    .await
                {
                    Ok((content, length)) => {
                        descriptor.size = length;
                        return Ok((content, descriptor));
                    }
                    Err(err) if err.is_not_found() => {
                        tracing::debug!(strategy = strategy.name, host = %host.host(), "no referrers");
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        Err(Error::NotFound("could not be found at any host".into()))
    }
}
