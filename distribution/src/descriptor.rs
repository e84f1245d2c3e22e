use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Digest;

/// Describes a unit of content: its media type, size and (when known) digest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    /// Media type of the referenced content.
    pub media_type: String,

    /// Size of the content in bytes.
    #[serde(default)]
    pub size: u64,

    /// Digest of the content, when confirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<Digest>,

    /// Artifact type of the referenced manifest, used by referrers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,

    /// Arbitrary metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

impl Descriptor {
    /// A descriptor with only the media type set.
    pub fn new(media_type: impl Into<String>) -> Self {
        Descriptor {
            media_type: media_type.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_fields_are_omitted() {
        let mut descriptor = Descriptor::new(crate::media_types::IMAGE_INDEX);
        descriptor.size = 42;

        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "mediaType": "application/vnd.oci.image.index.v1+json",
                "size": 42,
            })
        );
    }
}
