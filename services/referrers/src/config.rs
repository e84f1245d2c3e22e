//! Host configuration for a registry.
//!
//! A hosts file lists the mirrors of a registry in the order they should be
//! tried, optionally followed by the origin server:
//!
//! ```toml
//! server = "https://registry.example.com"
//! capabilities = ["pull", "resolve", "push", "referrers"]
//!
//! [[host]]
//! url = "https://mirror.example.com"
//! capabilities = ["pull", "resolve"]
//! ```

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use distribution::Reference;
use registry_client::uri::ParseUriError;
use registry_client::{Capability, HostCapabilities, RegistryHost};
use serde::Deserialize;

/// Errors loading a hosts file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("reading hosts file {path}")]
    Io {
        /// Path to the hosts file.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The file is not valid TOML, or has unknown keys or capabilities.
    #[error("parsing hosts file: {0}")]
    Toml(#[from] toml::de::Error),

    /// A host URL is not usable.
    #[error("invalid host URL {url:?}")]
    Host {
        /// The URL as configured.
        url: String,
        /// Why it is invalid.
        #[source]
        source: ParseUriError,
    },
}

/// One mirror entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Base URL of the mirror, e.g. `https://mirror.example.com`.
    pub url: String,

    /// API root path, `/v2` when unset.
    #[serde(default)]
    pub path: Option<String>,

    /// Capabilities of the mirror, `pull` and `resolve` when unset.
    #[serde(default)]
    pub capabilities: Option<Vec<Capability>>,
}

/// The hosts of one registry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostsConfig {
    /// The origin server. When unset, it is derived from the reference.
    #[serde(default)]
    pub server: Option<String>,

    /// Capabilities of the origin server, all of them when unset.
    #[serde(default)]
    pub capabilities: Option<Vec<Capability>>,

    /// Mirrors, in priority order.
    #[serde(default, rename = "host")]
    pub hosts: Vec<HostConfig>,
}

fn registry_host(
    url: &str,
    path: Option<&str>,
    capabilities: HostCapabilities,
) -> Result<RegistryHost, ConfigError> {
    let host_error = |source| ConfigError::Host {
        url: url.to_owned(),
        source,
    };

    let host = RegistryHost::parse(url, capabilities).map_err(host_error)?;
    match path {
        Some(path) => host.with_path(path).map_err(host_error),
        None => Ok(host),
    }
}

/// The origin URL for a registry host name.
///
/// Loopback registries are assumed to speak plain HTTP.
pub fn origin_url(hostname: &str) -> String {
    let name = hostname.split(':').next().unwrap_or(hostname);
    if matches!(name, "localhost" | "127.0.0.1") {
        format!("http://{hostname}")
    } else {
        format!("https://{hostname}")
    }
}

/// The hosts to use when no hosts file is given: just the origin, with every capability.
pub fn default_hosts(reference: &Reference) -> Result<Vec<RegistryHost>, ConfigError> {
    Ok(vec![registry_host(
        &origin_url(reference.hostname()),
        None,
        HostCapabilities::all(),
    )?])
}

impl HostsConfig {
    /// Parse a hosts file from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Read and parse a hosts file.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(%path, "loaded hosts file");
        Self::from_toml(&contents)
    }

    /// Candidate hosts for `reference`: mirrors in order, then the origin.
    pub fn hosts(&self, reference: &Reference) -> Result<Vec<RegistryHost>, ConfigError> {
        let mut hosts = Vec::with_capacity(self.hosts.len() + 1);

        for mirror in &self.hosts {
            let capabilities = mirror
                .capabilities
                .as_ref()
                .map(|caps| caps.iter().copied().collect())
                .unwrap_or(HostCapabilities::mirror());
            if capabilities.is_empty() {
                tracing::warn!(url = %mirror.url, "host has no capabilities and will not be used");
            }
            hosts.push(registry_host(
                &mirror.url,
                mirror.path.as_deref(),
                capabilities,
            )?);
        }

        let server = self
            .server
            .clone()
            .unwrap_or_else(|| origin_url(reference.hostname()));
        let capabilities = self
            .capabilities
            .as_ref()
            .map(|caps| caps.iter().copied().collect())
            .unwrap_or(HostCapabilities::all());
        hosts.push(registry_host(&server, None, capabilities)?);

        Ok(hosts)
    }
}
