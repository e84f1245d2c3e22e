use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::{Digest, DigestError};

/// Error parsing a repository reference.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    /// The reference has no registry host component.
    #[error("reference {0:?} has no registry host")]
    MissingHost(String),

    /// The repository path is empty or malformed.
    #[error("invalid repository {0:?}")]
    InvalidRepository(String),

    /// The tag is malformed.
    #[error("invalid tag {0:?}")]
    InvalidTag(String),

    /// The digest after `@` is malformed.
    #[error(transparent)]
    Digest(#[from] DigestError),
}

/// A fully qualified reference to a repository, optionally pinned to a tag
/// and/or digest: `<host>[:port]/<repository>[:tag][@digest]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    hostname: String,
    repository: String,
    tag: Option<String>,
    digest: Option<Digest>,
}

impl Reference {
    /// The registry host, including any port.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// The repository path within the registry.
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// The tag, if any.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// The digest, if any.
    pub fn digest(&self) -> Option<&Digest> {
        self.digest.as_ref()
    }

    /// The `<host>/<repository>` locator without tag or digest.
    pub fn locator(&self) -> String {
        format!("{}/{}", self.hostname, self.repository)
    }
}

fn valid_path_component(component: &str) -> bool {
    // [a-z0-9]+ separated by `.`, `_`, `__` or runs of `-`
    !component.is_empty()
        && component
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'.' | b'_' | b'-'))
        && component
            .bytes()
            .next()
            .is_some_and(|b| b.is_ascii_alphanumeric())
        && component
            .bytes()
            .last()
            .is_some_and(|b| b.is_ascii_alphanumeric())
}

fn valid_tag(tag: &str) -> bool {
    (1..=128).contains(&tag.len())
        && tag
            .bytes()
            .next()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
        && tag
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

impl FromStr for Reference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, digest) = match s.split_once('@') {
            Some((name, digest)) => (name, Some(digest.parse::<Digest>()?)),
            None => (s, None),
        };

        let Some((hostname, remainder)) = name.split_once('/') else {
            return Err(ReferenceError::MissingHost(s.to_owned()));
        };

        if hostname.is_empty() {
            return Err(ReferenceError::MissingHost(s.to_owned()));
        }

        // A colon after the last slash separates the tag.
        let (repository, tag) = match remainder.rsplit_once(':') {
            Some((repository, tag)) if !tag.contains('/') => {
                if !valid_tag(tag) {
                    return Err(ReferenceError::InvalidTag(tag.to_owned()));
                }
                (repository, Some(tag.to_owned()))
            }
            _ => (remainder, None),
        };

        if !repository.split('/').all(valid_path_component) {
            return Err(ReferenceError::InvalidRepository(repository.to_owned()));
        }

        Ok(Reference {
            hostname: hostname.to_owned(),
            repository: repository.to_owned(),
            tag,
            digest,
        })
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.hostname, self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}
