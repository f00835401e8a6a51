use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::digest::OciDigest;

/// Represents a descriptor for a piece of content in an OCI registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    /// Media type of the referenced content
    pub media_type: String,
    /// Digest of the referenced content
    pub digest: OciDigest,
    /// Size of the referenced content in bytes
    pub size: u64,
    /// Optional annotations attached to the content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
    /// Optional platform information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    /// Optional user-declared type of the referenced artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
}

impl Descriptor {
    /// Describe a piece of content, computing its digest and size.
    pub fn from_bytes(media_type: impl Into<String>, content: &[u8]) -> Self {
        Self {
            media_type: media_type.into(),
            digest: OciDigest::from_bytes(content),
            size: content.len() as u64,
            annotations: None,
            platform: None,
            artifact_type: None,
        }
    }

    /// The identity of the described content in a graph.
    pub fn key(&self) -> DescriptorKey {
        DescriptorKey {
            media_type: self.media_type.clone(),
            digest: self.digest.clone(),
            size: self.size,
        }
    }
}

/// Identity of a node in a content graph, usable as a set or map key.
///
/// Two descriptors naming the same content compare equal even when their
/// annotation or platform metadata differs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorKey {
    media_type: String,
    digest: OciDigest,
    size: u64,
}

/// Represents platform information for a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    /// CPU architecture
    pub architecture: String,
    /// Operating system
    pub os: String,
    /// Optional variant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

/// Descriptor shape used by the retired CNCF ORAS artifact manifests.
///
/// Unlike [`Descriptor`], each entry may carry its own artifact type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyDescriptor {
    /// Media type of the referenced content
    pub media_type: String,
    /// Digest of the referenced content
    pub digest: OciDigest,
    /// Size of the referenced content in bytes
    pub size: u64,
    /// Optional annotations attached to the content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
    /// Optional user-declared type of the referenced artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
}

impl From<LegacyDescriptor> for Descriptor {
    fn from(legacy: LegacyDescriptor) -> Self {
        Self {
            media_type: legacy.media_type,
            digest: legacy.digest,
            size: legacy.size,
            annotations: legacy.annotations,
            platform: None,
            artifact_type: legacy.artifact_type,
        }
    }
}
