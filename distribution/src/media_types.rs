//! Media types used when talking to OCI registries.

/// OCI image index, also the document type of the referrers API.
pub const IMAGE_INDEX: &str = "application/vnd.oci.image.index.v1+json";

/// OCI image manifest.
pub const IMAGE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";

/// Docker manifest list.
pub const DOCKER_MANIFEST_LIST: &str = "application/vnd.docker.distribution.manifest.list.v2+json";

/// Docker image manifest.
pub const DOCKER_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// Empty JSON config, used by artifacts which carry no configuration.
pub const EMPTY_JSON: &str = "application/vnd.oci.empty.v1+json";
