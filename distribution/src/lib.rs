//! # OCI distribution value types
//!
//! Plain data types shared by registry clients: content digests, descriptors,
//! the image index document returned by the referrers API, and repository
//! references.
//!
//! ```
//! use distribution::Digest;
//!
//! let digest: Digest = "sha256:abc123".parse().unwrap();
//! assert_eq!(digest.signature_tag(), "sha256-abc123.sig");
//! ```

mod descriptor;
mod digest;
mod index;
pub mod media_types;
mod reference;

pub use self::descriptor::Descriptor;
pub use self::digest::{Digest, DigestError};
pub use self::index::ImageIndex;
pub use self::reference::{Reference, ReferenceError};
