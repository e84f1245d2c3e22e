//! Registry hosts and the API surfaces they support.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use http::Uri;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::uri::{ParseUriError, url_to_uri};

const DEFAULT_API_PATH: &str = "/v2";

/// A registry API surface a host may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Fetch blobs and manifests by digest.
    Pull,
    /// Resolve tags to manifests.
    Resolve,
    /// Upload blobs and manifests.
    Push,
    /// Serve the referrers API.
    Referrers,
}

impl Capability {
    const ALL: [Capability; 4] = [
        Capability::Pull,
        Capability::Resolve,
        Capability::Push,
        Capability::Referrers,
    ];

    const fn bit(self) -> u8 {
        match self {
            Capability::Pull => 1 << 0,
            Capability::Resolve => 1 << 1,
            Capability::Push => 1 << 2,
            Capability::Referrers => 1 << 3,
        }
    }

    /// The lowercase name used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Pull => "pull",
            Capability::Resolve => "resolve",
            Capability::Push => "push",
            Capability::Referrers => "referrers",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unrecognized capability name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown host capability {0:?}")]
pub struct UnknownCapability(String);

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|capability| capability.as_str() == s)
            .ok_or_else(|| UnknownCapability(s.to_owned()))
    }
}

/// A set of [`Capability`] flags.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HostCapabilities(u8);

impl HostCapabilities {
    /// Only [`Capability::Pull`].
    pub const PULL: Self = Self(Capability::Pull.bit());
    /// Only [`Capability::Resolve`].
    pub const RESOLVE: Self = Self(Capability::Resolve.bit());
    /// Only [`Capability::Push`].
    pub const PUSH: Self = Self(Capability::Push.bit());
    /// Only [`Capability::Referrers`].
    pub const REFERRERS: Self = Self(Capability::Referrers.bit());

    /// No capabilities.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every capability, as held by the origin registry.
    pub const fn all() -> Self {
        Self(Self::PULL.0 | Self::RESOLVE.0 | Self::PUSH.0 | Self::REFERRERS.0)
    }

    /// Capabilities given to mirrors which don't declare their own.
    pub const fn mirror() -> Self {
        Self(Self::PULL.0 | Self::RESOLVE.0)
    }

    /// Whether `capability` is in this set.
    pub const fn includes(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    /// Whether this set shares at least one capability with `other`.
    pub const fn includes_any(self, other: HostCapabilities) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether the set is empty.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate over the capabilities in this set.
    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL
            .into_iter()
            .filter(move |capability| self.includes(*capability))
    }
}

impl fmt::Debug for HostCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for HostCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, capability) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(capability.as_str())?;
        }
        Ok(())
    }
}

impl From<Capability> for HostCapabilities {
    fn from(capability: Capability) -> Self {
        Self(capability.bit())
    }
}

impl BitOr for HostCapabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitOr<Capability> for HostCapabilities {
    type Output = Self;

    fn bitor(self, rhs: Capability) -> Self::Output {
        Self(self.0 | rhs.bit())
    }
}

impl BitOrAssign<Capability> for HostCapabilities {
    fn bitor_assign(&mut self, rhs: Capability) {
        self.0 |= rhs.bit();
    }
}

impl FromIterator<Capability> for HostCapabilities {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        iter.into_iter()
            .fold(HostCapabilities::empty(), |set, capability| set | capability)
    }
}

/// A candidate endpoint for a registry: the origin or one of its mirrors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryHost {
    base: Uri,
    capabilities: HostCapabilities,
}

impl RegistryHost {
    /// Parse a host from its URL.
    ///
    /// When the URL has no path, the standard `/v2` API root is used.
    pub fn parse(url: &str, capabilities: HostCapabilities) -> Result<Self, ParseUriError> {
        let mut url = Url::parse(url)?;
        if url.path().is_empty() || url.path() == "/" {
            url.set_path(DEFAULT_API_PATH);
        }

        let base = url_to_uri(url)?;
        Ok(RegistryHost { base, capabilities })
    }

    /// Replace the API root path, e.g. for mirrors which proxy under a prefix.
    pub fn with_path(self, path: &str) -> Result<Self, ParseUriError> {
        let mut url = Url::parse(&self.base.to_string())?;
        url.set_path(path);
        Ok(RegistryHost {
            base: url_to_uri(url)?,
            capabilities: self.capabilities,
        })
    }

    /// The API root of this host, e.g. `https://mirror.example.com/v2`.
    pub fn base(&self) -> &Uri {
        &self.base
    }

    /// The URI scheme, `https` or `http`.
    pub fn scheme(&self) -> &str {
        self.base.scheme_str().unwrap_or("https")
    }

    /// The host name, including any port.
    pub fn host(&self) -> &str {
        self.base
            .authority()
            .map(|authority| authority.as_str())
            .unwrap_or_default()
    }

    /// The API root path.
    pub fn path(&self) -> &str {
        self.base.path()
    }

    /// The capabilities this host declares.
    pub fn capabilities(&self) -> HostCapabilities {
        self.capabilities
    }
}

impl fmt::Display for RegistryHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn includes_single_capability() {
        let caps = HostCapabilities::PULL | Capability::Referrers;
        assert!(caps.includes(Capability::Pull));
        assert!(caps.includes(Capability::Referrers));
        assert!(!caps.includes(Capability::Resolve));
        assert!(!caps.includes(Capability::Push));
    }

    #[test]
    fn includes_any_capability() {
        let wanted = HostCapabilities::RESOLVE | HostCapabilities::REFERRERS;
        assert!(HostCapabilities::REFERRERS.includes_any(wanted));
        assert!(HostCapabilities::mirror().includes_any(wanted));
        assert!(!HostCapabilities::PULL.includes_any(wanted));
        assert!(!HostCapabilities::empty().includes_any(wanted));
    }

    #[test]
    fn display_and_collect() {
        let caps: HostCapabilities = ["referrers", "pull"]
            .into_iter()
            .map(|name| name.parse::<Capability>().unwrap())
            .collect();
        assert_eq!(caps.to_string(), "pull,referrers");
        assert_eq!(format!("{caps:?}"), "{Pull, Referrers}");
        assert_eq!(HostCapabilities::all().iter().count(), 4);
    }

    #[test]
    fn unknown_capability() {
        assert_eq!(
            "fetch".parse::<Capability>(),
            Err(UnknownCapability("fetch".into()))
        );
    }

    #[test]
    fn parse_host_defaults_api_path() {
        let host =
            RegistryHost::parse("https://mirror.example.com", HostCapabilities::mirror()).unwrap();
        assert_eq!(host.scheme(), "https");
        assert_eq!(host.host(), "mirror.example.com");
        assert_eq!(host.path(), "/v2");
        assert_eq!(host.to_string(), "https://mirror.example.com/v2");
    }

    #[test]
    fn parse_host_keeps_explicit_path() {
        let host = RegistryHost::parse(
            "http://localhost:5000/proxy/v2",
            HostCapabilities::all(),
        )
        .unwrap();
        assert_eq!(host.host(), "localhost:5000");
        assert_eq!(host.path(), "/proxy/v2");

        let host = host.with_path("/v2").unwrap();
        assert_eq!(host.to_string(), "http://localhost:5000/v2");
    }

    #[test]
    fn parse_host_rejects_non_base() {
        assert!(matches!(
            RegistryHost::parse("mailto:registry@example.com", HostCapabilities::all()),
            Err(ParseUriError::CannotBeABase(_))
        ));
    }
}
