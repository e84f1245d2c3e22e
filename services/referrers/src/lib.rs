//! # Referrers
//!
//! Find the artifacts (signatures, attestations, SBOMs) which refer to an
//! image manifest, by asking each of a registry's hosts in turn.
//!
//! Registries which implement the OCI referrers API answer
//! `GET /v2/<repository>/referrers/<digest>` with an image index. Older
//! registries get the same information from the `<alg>-<hex>.sig` tag
//! convention instead. [`Resolver::fetch_referrers`] tries both, on every
//! host which is capable of them, and returns the first answer it gets.
//!
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use referrers::{Resolver, default_hosts};
//! use registry_client::{Credentials, RegistryClient};
//! use tokio_util::sync::CancellationToken;
//!
//! let reference: distribution::Reference =
//!     "registry.example.com/library/app@sha256:abc123".parse()?;
//! let digest = reference.digest().cloned().ok_or("missing digest")?;
//!
//! let hosts = default_hosts(&reference)?;
//! let client = RegistryClient::new(reference, hosts, Credentials::Anonymous);
//! let resolver = Resolver::new(client);
//!
//! let (content, descriptor) = resolver
//!     .fetch_referrers(&CancellationToken::new(), &digest, &["application/vnd.dev.sigstore.bundle"])
//!     .await?;
//! println!("{} bytes of referrers", descriptor.size);
//! let _index = content.json::<distribution::ImageIndex>().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod resolver;

pub use self::config::{ConfigError, HostConfig, HostsConfig, default_hosts, origin_url};
pub use self::resolver::{Resolver, STRATEGIES, Strategy};
