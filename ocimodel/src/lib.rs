pub mod descriptor;
pub mod digest;
pub mod manifest;

// Re-export the main model types for convenience
pub use descriptor::{Descriptor, DescriptorKey, LegacyDescriptor, Platform};
pub use digest::{DigestError, OciDigest};
pub use manifest::{
    ArtifactManifest, ImageIndex, ImageManifest, LegacyArtifactManifest, ManifestVariant,
};
