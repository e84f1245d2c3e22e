use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Descriptor;

/// An OCI image index, the document returned by the referrers API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageIndex {
    /// Always 2 for OCI indexes.
    pub schema_version: u32,

    /// Media type, normally the OCI image index type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    /// Descriptors of the referenced manifests.
    #[serde(default)]
    pub manifests: Vec<Descriptor>,

    /// Arbitrary metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

impl ImageIndex {
    /// Parse an index from its JSON encoding.
    pub fn from_slice(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    /// Manifests whose artifact type matches one of `artifact_types`.
    ///
    /// Registries may ignore the `artifactType` query, so callers can filter
    /// again locally. An empty filter keeps every manifest.
    pub fn filter_artifact_type<'a, S>(
        &'a self,
        artifact_types: &'a [S],
    ) -> impl Iterator<Item = &'a Descriptor> + 'a
    where
        S: AsRef<str>,
    {
        self.manifests.iter().filter(move |descriptor| {
            artifact_types.is_empty()
                || descriptor.artifact_type.as_deref().is_some_and(|kind| {
                    artifact_types.iter().any(|wanted| wanted.as_ref() == kind)
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERRERS: &str = indoc::indoc! {r#"
        {
          "schemaVersion": 2,
          "mediaType": "application/vnd.oci.image.index.v1+json",
          "manifests": [
            {
              "mediaType": "application/vnd.oci.image.manifest.v1+json",
              "size": 1234,
              "digest": "sha256:a1a1a1",
              "artifactType": "application/vnd.example.sbom.v1"
            },
            {
              "mediaType": "application/vnd.oci.image.manifest.v1+json",
              "size": 1235,
              "digest": "sha256:b2b2b2",
              "artifactType": "application/vnd.dev.cosign.artifact.sig.v1+json",
              "annotations": {
                "org.opencontainers.image.created": "2024-01-01T00:00:00Z"
              }
            }
          ]
        }
    "#};

    #[test]
    fn parse_referrers_index() {
        let index = ImageIndex::from_slice(REFERRERS.as_bytes()).unwrap();
        assert_eq!(index.schema_version, 2);
        assert_eq!(index.manifests.len(), 2);
        assert_eq!(
            index.manifests[0].digest.as_ref().map(|d| d.as_str()),
            Some("sha256:a1a1a1")
        );
    }

    #[test]
    fn filter_by_artifact_type() {
        let index = ImageIndex::from_slice(REFERRERS.as_bytes()).unwrap();

        let sboms: Vec<_> = index
            .filter_artifact_type(&["application/vnd.example.sbom.v1"])
            .collect();
        assert_eq!(sboms.len(), 1);
        assert_eq!(sboms[0].size, 1234);

        let none: [&str; 0] = [];
        assert_eq!(index.filter_artifact_type(&none).count(), 2);
    }
}
