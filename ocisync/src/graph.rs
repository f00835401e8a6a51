//! Successor enumeration over heterogeneous manifest shapes.

use ocimodel::manifest::is_manifest_media_type;
use ocimodel::{Descriptor, ManifestVariant};

use crate::error::{Error, Result};
use crate::storage::{fetch_all, Fetcher};

/// Returns the nodes directly pointed at by `node`, in manifest order.
///
/// Image manifests yield their config first, then the layers; indexes yield
/// their manifests; artifact manifests yield their subject (if any) first,
/// then the blobs. Content with an unrecognized media type has no
/// successors and is not fetched.
pub async fn successors<F: Fetcher + ?Sized>(
    fetcher: &F,
    node: &Descriptor,
) -> Result<Vec<Descriptor>> {
    if !is_manifest_media_type(&node.media_type) {
        return Ok(Vec::new());
    }
    let content = fetch_all(fetcher, node).await?;
    successors_of(&node.media_type, &content)
}

/// The parsing half of [`successors`]: enumerate children from raw
/// manifest bytes.
pub fn successors_of(media_type: &str, content: &[u8]) -> Result<Vec<Descriptor>> {
    let variant =
        ManifestVariant::decode(media_type, content).map_err(|source| Error::MalformedManifest {
            media_type: media_type.to_string(),
            source,
        })?;
    Ok(match variant {
        ManifestVariant::Image(manifest) => {
            let mut nodes = Vec::with_capacity(1 + manifest.layers.len());
            nodes.push(manifest.config);
            nodes.extend(manifest.layers);
            nodes
        }
        ManifestVariant::Index(index) => index.manifests,
        ManifestVariant::Artifact(manifest) => {
            let mut nodes = Vec::with_capacity(1 + manifest.blobs.len());
            if let Some(subject) = manifest.subject {
                nodes.push(subject);
            }
            nodes.extend(manifest.blobs);
            nodes
        }
        ManifestVariant::LegacyArtifact(manifest) => {
            let mut nodes: Vec<Descriptor> = Vec::with_capacity(1 + manifest.blobs.len());
            if let Some(subject) = manifest.subject {
                nodes.push(subject.into());
            }
            nodes.extend(manifest.blobs.into_iter().map(Descriptor::from));
            nodes
        }
        ManifestVariant::Unknown => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use ocimodel::manifest::{
        MEDIA_TYPE_ARTIFACT_MANIFEST, MEDIA_TYPE_IMAGE_INDEX, MEDIA_TYPE_IMAGE_MANIFEST,
        MEDIA_TYPE_LEGACY_ARTIFACT_MANIFEST, MEDIA_TYPE_UNKNOWN_CONFIG,
    };
    use ocimodel::{ArtifactManifest, ImageIndex, ImageManifest};

    use super::*;

    #[test]
    fn test_image_manifest_config_first() {
        let config = Descriptor::from_bytes(MEDIA_TYPE_UNKNOWN_CONFIG, b"{}");
        let layers = vec![
            Descriptor::from_bytes("test", b"hello world"),
            Descriptor::from_bytes("test", b"goodbye world"),
        ];
        let manifest = ImageManifest {
            schema_version: 2,
            media_type: MEDIA_TYPE_IMAGE_MANIFEST.to_string(),
            config: config.clone(),
            layers: layers.clone(),
            annotations: None,
        };
        let content = serde_json::to_vec(&manifest).unwrap();

        let nodes = successors_of(MEDIA_TYPE_IMAGE_MANIFEST, &content).unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0], config);
        assert_eq!(&nodes[1..], layers.as_slice());
    }

    #[test]
    fn test_index_manifests_in_order() {
        let manifests = vec![
            Descriptor::from_bytes(MEDIA_TYPE_IMAGE_MANIFEST, b"first"),
            Descriptor::from_bytes(MEDIA_TYPE_IMAGE_MANIFEST, b"second"),
        ];
        let index = ImageIndex {
            schema_version: 2,
            media_type: MEDIA_TYPE_IMAGE_INDEX.to_string(),
            manifests: manifests.clone(),
            annotations: None,
        };
        let content = serde_json::to_vec(&index).unwrap();

        let nodes = successors_of(MEDIA_TYPE_IMAGE_INDEX, &content).unwrap();
        assert_eq!(nodes, manifests);
    }

    #[test]
    fn test_artifact_subject_before_blobs() {
        let subject = Descriptor::from_bytes(MEDIA_TYPE_IMAGE_MANIFEST, b"{\"layers\":[]}");
        let blobs = vec![Descriptor::from_bytes("test", b"hello world")];
        let manifest = ArtifactManifest {
            media_type: MEDIA_TYPE_ARTIFACT_MANIFEST.to_string(),
            artifact_type: "application/vnd.test".to_string(),
            blobs: blobs.clone(),
            subject: Some(subject.clone()),
            annotations: None,
        };
        let content = serde_json::to_vec(&manifest).unwrap();

        let nodes = successors_of(MEDIA_TYPE_ARTIFACT_MANIFEST, &content).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0], subject);
        assert_eq!(nodes[1], blobs[0]);
    }

    #[test]
    fn test_legacy_artifact_normalized() {
        let digest = ocimodel::OciDigest::from_bytes(b"hello world");
        let content = format!(
            "{{\"mediaType\":\"{}\",\"artifactType\":\"application/vnd.test\",\"blobs\":[{{\"mediaType\":\"test\",\"digest\":\"{}\",\"size\":11,\"artifactType\":\"application/vnd.blob\"}}]}}",
            MEDIA_TYPE_LEGACY_ARTIFACT_MANIFEST, digest
        );

        let nodes = successors_of(MEDIA_TYPE_LEGACY_ARTIFACT_MANIFEST, content.as_bytes()).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].media_type, "test");
        assert_eq!(nodes[0].size, 11);
        assert_eq!(
            nodes[0].artifact_type.as_deref(),
            Some("application/vnd.blob")
        );
    }

    #[test]
    fn test_unknown_media_type_has_no_successors() {
        let nodes = successors_of("application/octet-stream", b"opaque bytes").unwrap();
        assert!(nodes.is_empty());
    }

    #[test]
    fn test_malformed_manifest() {
        let err = successors_of(MEDIA_TYPE_IMAGE_MANIFEST, b"not json").unwrap_err();
        assert!(matches!(err, Error::MalformedManifest { .. }));
    }
}
