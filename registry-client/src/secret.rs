use std::fmt;

use http::HeaderValue;
use http::header::InvalidHeaderValue;
use serde::Deserialize;
use zeroize::Zeroize;

/// A registry password or token.
///
/// The value is wiped from memory on drop and never printed by `Debug`.
/// Use [Secret::revealed] to get the underlying value.
#[derive(Clone, Deserialize)]
#[serde(from = "String")]
pub struct Secret(String);

impl Secret {
    /// Read a secret from an environment variable.
    pub fn from_env(var: &str) -> Result<Self, std::env::VarError> {
        std::env::var(var).map(Secret)
    }

    /// Expose the underlying value.
    pub fn revealed(&self) -> &str {
        &self.0
    }

    /// A sensitive `Bearer <token>` header value.
    pub fn bearer(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut header = HeaderValue::try_from(format!("Bearer {}", self.0))?;
        header.set_sensitive(true);
        Ok(header)
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(****)")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Secret(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Secret(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_is_redacted() {
        let secret = Secret::from("hunter2");
        assert_eq!(format!("{secret:?}"), "Secret(****)");
        assert_eq!(secret.revealed(), "hunter2");
    }

    #[test]
    fn bearer_header_is_sensitive() {
        let header = Secret::from("token").bearer().unwrap();
        assert!(header.is_sensitive());
        assert_eq!(header.to_str().unwrap(), "Bearer token");
    }
}
