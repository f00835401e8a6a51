use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::descriptor::{Descriptor, LegacyDescriptor};

/// Media type of an OCI image manifest.
pub const MEDIA_TYPE_IMAGE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
/// Media type of an OCI image index.
pub const MEDIA_TYPE_IMAGE_INDEX: &str = "application/vnd.oci.image.index.v1+json";
/// Media type of a Docker schema 2 image manifest.
pub const MEDIA_TYPE_DOCKER_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";
/// Media type of a Docker schema 2 manifest list.
pub const MEDIA_TYPE_DOCKER_MANIFEST_LIST: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";
/// Media type of an OCI artifact manifest.
pub const MEDIA_TYPE_ARTIFACT_MANIFEST: &str = "application/vnd.oci.artifact.manifest.v1+json";
/// Media type of the retired CNCF ORAS artifact manifest.
pub const MEDIA_TYPE_LEGACY_ARTIFACT_MANIFEST: &str =
    "application/vnd.cncf.oras.artifact.manifest.v1+json";
/// Media type of an OCI image configuration.
pub const MEDIA_TYPE_IMAGE_CONFIG: &str = "application/vnd.oci.image.config.v1+json";
/// Media type used for a config blob whose real type is unknown.
pub const MEDIA_TYPE_UNKNOWN_CONFIG: &str = "application/vnd.unknown.config.v1+json";

/// Annotation key recording the creation time of an artifact, RFC 3339.
pub const ANNOTATION_ARTIFACT_CREATED: &str = "org.opencontainers.artifact.created";

/// Whether the media type names one of the recognized manifest shapes.
pub fn is_manifest_media_type(media_type: &str) -> bool {
    matches!(
        media_type,
        MEDIA_TYPE_DOCKER_MANIFEST
            | MEDIA_TYPE_IMAGE_MANIFEST
            | MEDIA_TYPE_DOCKER_MANIFEST_LIST
            | MEDIA_TYPE_IMAGE_INDEX
            | MEDIA_TYPE_LEGACY_ARTIFACT_MANIFEST
            | MEDIA_TYPE_ARTIFACT_MANIFEST
    )
}

/// Represents an OCI image manifest
///
/// Field order matches the OCI schema so that a single-pass serialization is
/// reproducible bit for bit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    /// Schema version of the manifest, fixed at 2 for Docker compatibility
    pub schema_version: i32,
    /// Media type of the manifest
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub media_type: String,
    /// Descriptor for the config blob
    pub config: Descriptor,
    /// Descriptors for the layer blobs
    #[serde(default)]
    pub layers: Vec<Descriptor>,
    /// Optional annotations on the manifest itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

/// Represents an OCI image index or Docker manifest list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageIndex {
    /// Schema version of the index
    pub schema_version: i32,
    /// Media type of the index
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub media_type: String,
    /// Descriptors for the referenced manifests
    #[serde(default)]
    pub manifests: Vec<Descriptor>,
    /// Optional annotations on the index itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

/// Represents an OCI artifact manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactManifest {
    /// Media type of the manifest
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub media_type: String,
    /// User-declared type of the artifact
    #[serde(default)]
    pub artifact_type: String,
    /// Descriptors for the artifact's blobs
    #[serde(default)]
    pub blobs: Vec<Descriptor>,
    /// Optional descriptor of the manifest this artifact refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Descriptor>,
    /// Optional annotations on the manifest itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

/// Represents a retired CNCF ORAS artifact manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyArtifactManifest {
    /// Media type of the manifest
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub media_type: String,
    /// User-declared type of the artifact
    #[serde(default)]
    pub artifact_type: String,
    /// Descriptors for the artifact's blobs
    #[serde(default)]
    pub blobs: Vec<LegacyDescriptor>,
    /// Optional descriptor of the manifest this artifact refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<LegacyDescriptor>,
    /// Optional annotations on the manifest itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

/// A decoded manifest, tagged by the shape its media type selects.
#[derive(Debug, Clone)]
pub enum ManifestVariant {
    /// OCI image manifest or Docker image manifest
    Image(ImageManifest),
    /// OCI image index or Docker manifest list
    Index(ImageIndex),
    /// OCI artifact manifest
    Artifact(ArtifactManifest),
    /// Retired CNCF ORAS artifact manifest
    LegacyArtifact(LegacyArtifactManifest),
    /// Anything else; has no decodable structure
    Unknown,
}

impl ManifestVariant {
    /// Decode manifest bytes according to their declared media type.
    ///
    /// Docker and OCI image manifests share a shape, as do manifest lists
    /// and indexes. Unrecognized media types decode to [`Self::Unknown`]
    /// without touching the content.
    pub fn decode(media_type: &str, content: &[u8]) -> Result<Self, serde_json::Error> {
        match media_type {
            MEDIA_TYPE_DOCKER_MANIFEST | MEDIA_TYPE_IMAGE_MANIFEST => {
                Ok(Self::Image(serde_json::from_slice(content)?))
            }
            MEDIA_TYPE_DOCKER_MANIFEST_LIST | MEDIA_TYPE_IMAGE_INDEX => {
                Ok(Self::Index(serde_json::from_slice(content)?))
            }
            MEDIA_TYPE_LEGACY_ARTIFACT_MANIFEST => {
                Ok(Self::LegacyArtifact(serde_json::from_slice(content)?))
            }
            MEDIA_TYPE_ARTIFACT_MANIFEST => Ok(Self::Artifact(serde_json::from_slice(content)?)),
            _ => Ok(Self::Unknown),
        }
    }
}
