use std::fmt;

use distribution::Reference;
use url::Url;

use crate::error::Error;

/// The authorization scope a request needs, e.g. `repository:library/app:pull`.
///
/// Requests carry their scope as an extension so that credential layers can
/// obtain access for the right repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryScope {
    repository: String,
    push: bool,
}

impl RepositoryScope {
    /// Establish the scope for `reference`, with push access when `push` is set.
    pub fn new(reference: &Reference, push: bool) -> Result<Self, Error> {
        let locator = reference.locator();
        let url = Url::parse(&format!("dummy://{locator}")).map_err(|source| Error::Scope {
            locator: locator.clone(),
            source,
        })?;

        Ok(RepositoryScope {
            repository: url.path().trim_start_matches('/').to_owned(),
            push,
        })
    }

    /// The repository this scope grants access to.
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// The actions granted, `pull` or `pull,push`.
    pub fn actions(&self) -> &'static str {
        if self.push { "pull,push" } else { "pull" }
    }
}

impl fmt::Display for RepositoryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "repository:{}:{}", self.repository, self.actions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_scope() {
        let reference: Reference = "registry.example.com/library/app".parse().unwrap();
        let scope = RepositoryScope::new(&reference, false).unwrap();
        assert_eq!(scope.to_string(), "repository:library/app:pull");
    }

    #[test]
    fn push_scope() {
        let reference: Reference = "localhost:5000/app:v1".parse().unwrap();
        let scope = RepositoryScope::new(&reference, true).unwrap();
        assert_eq!(scope.repository(), "app");
        assert_eq!(scope.to_string(), "repository:app:pull,push");
    }

    #[test]
    fn invalid_port_fails() {
        let reference: Reference = "registry.example.com:99999/app".parse().unwrap();
        let err = RepositoryScope::new(&reference, false).unwrap_err();
        assert!(matches!(err, Error::Scope { .. }));
        assert!(!err.is_not_found());
    }
}
