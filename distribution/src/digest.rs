use std::fmt;
use std::str::FromStr;

use sha2::Digest as _;
use thiserror::Error;

/// Error parsing a content digest.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DigestError {
    /// The digest is missing the `algorithm:` prefix.
    #[error("digest {0:?} is missing an algorithm separator")]
    MissingSeparator(String),

    /// The algorithm component is empty or contains invalid characters.
    #[error("invalid digest algorithm {0:?}")]
    InvalidAlgorithm(String),

    /// The encoded component is empty or contains invalid characters.
    #[error("invalid digest encoding {0:?}")]
    InvalidEncoding(String),
}

/// A content-addressed identifier of the form `<algorithm>:<encoded>`.
///
/// Only the grammar is checked when parsing; for the registered `sha256`
/// and `sha512` algorithms the encoded part must be lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    value: String,
    split: usize,
}

impl Digest {
    /// Compute the sha256 digest of some content.
    pub fn sha256(content: impl AsRef<[u8]>) -> Self {
        let encoded = hex::encode(sha2::Sha256::digest(content.as_ref()));
        Digest {
            split: "sha256".len(),
            value: format!("sha256:{encoded}"),
        }
    }

    /// The algorithm, e.g. `sha256`.
    pub fn algorithm(&self) -> &str {
        &self.value[..self.split]
    }

    /// The encoded hash, without the algorithm.
    pub fn encoded(&self) -> &str {
        &self.value[self.split + 1..]
    }

    /// The canonical `<algorithm>:<encoded>` form.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// The legacy tag under which signatures for this digest are stored.
    ///
    /// Only the first `:` is replaced, and `.sig` is appended, so
    /// `sha256:abc123` becomes `sha256-abc123.sig`.
    pub fn signature_tag(&self) -> String {
        format!("{}.sig", self.value.replacen(':', "-", 1))
    }
}

fn valid_algorithm(algorithm: &str) -> bool {
    // alg-component ([+._-] alg-component)*
    !algorithm.is_empty()
        && algorithm
            .split(['+', '.', '_', '-'])
            .all(|component| {
                !component.is_empty()
                    && component
                        .bytes()
                        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
            })
}

fn valid_encoding(algorithm: &str, encoded: &str) -> bool {
    if encoded.is_empty() {
        return false;
    }

    match algorithm {
        "sha256" | "sha512" => encoded
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)),
        _ => encoded
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'=' | b'_' | b'-')),
    }
}

impl FromStr for Digest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((algorithm, encoded)) = s.split_once(':') else {
            return Err(DigestError::MissingSeparator(s.to_owned()));
        };

        if !valid_algorithm(algorithm) {
            return Err(DigestError::InvalidAlgorithm(algorithm.to_owned()));
        }

        if !valid_encoding(algorithm, encoded) {
            return Err(DigestError::InvalidEncoding(encoded.to_owned()));
        }

        Ok(Digest {
            value: s.to_owned(),
            split: algorithm.len(),
        })
    }
}

impl TryFrom<String> for Digest {
    type Error = DigestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.value
    }
}

impl AsRef<str> for Digest {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl serde::Serialize for Digest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.value)
    }
}

impl<'de> serde::Deserialize<'de> for Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}
