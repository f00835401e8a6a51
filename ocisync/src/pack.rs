//! Builders for new image and artifact manifests.
//!
//! Manifests are serialized in a single pass with a fixed field order, so
//! the bytes pushed to the store (and therefore their digests) are
//! reproducible across runs.

use std::collections::BTreeMap;
use std::io::Cursor;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use ocimodel::manifest::{
    ANNOTATION_ARTIFACT_CREATED, MEDIA_TYPE_ARTIFACT_MANIFEST, MEDIA_TYPE_IMAGE_MANIFEST,
    MEDIA_TYPE_UNKNOWN_CONFIG,
};
use ocimodel::{ArtifactManifest, Descriptor, ImageManifest};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::storage::Storage;

/// Options for [`pack`].
#[derive(Debug, Clone, Default)]
pub struct PackOptions {
    /// Config descriptor to reference. When absent an empty JSON config is
    /// synthesized and pushed.
    pub config_descriptor: Option<Descriptor>,
    /// Media type of the synthesized config. Ignored when
    /// `config_descriptor` is set.
    pub config_media_type: Option<String>,
    /// Annotations on the synthesized config's descriptor. Ignored when
    /// `config_descriptor` is set.
    pub config_annotations: Option<BTreeMap<String, String>>,
    /// Annotations on the manifest itself.
    pub manifest_annotations: Option<BTreeMap<String, String>>,
}

/// Options for [`pack_artifact`].
#[derive(Debug, Clone, Default)]
pub struct PackArtifactOptions {
    /// Manifest this artifact refers to.
    pub subject: Option<Descriptor>,
    /// Annotations on the manifest itself.
    pub manifest_annotations: Option<BTreeMap<String, String>>,
}

/// Pack the given layers into an OCI image manifest and push it to `dst`.
///
/// Returns the descriptor of the pushed manifest.
pub async fn pack<D: Storage + ?Sized>(
    dst: &D,
    layers: Vec<Descriptor>,
    opts: PackOptions,
) -> Result<Descriptor> {
    let config = match opts.config_descriptor {
        Some(config) => config,
        None => {
            let media_type = opts
                .config_media_type
                .unwrap_or_else(|| MEDIA_TYPE_UNKNOWN_CONFIG.to_string());
            let content = b"{}";
            let mut config = Descriptor::from_bytes(media_type, content);
            config.annotations = opts.config_annotations;
            push_ignoring_existing(dst, &config, Bytes::from_static(content)).await?;
            config
        }
    };

    let manifest = ImageManifest {
        schema_version: 2, // historical value required for Docker compatibility
        media_type: MEDIA_TYPE_IMAGE_MANIFEST.to_string(),
        config,
        layers,
        annotations: opts.manifest_annotations,
    };
    push_manifest(dst, MEDIA_TYPE_IMAGE_MANIFEST, &manifest).await
}

/// Pack the given blobs into an OCI artifact manifest and push it to `dst`.
///
/// The reserved creation-time annotation is validated as RFC 3339 when
/// supplied and inserted as the current UTC time when absent.
///
/// Returns the descriptor of the pushed manifest.
pub async fn pack_artifact<D: Storage + ?Sized>(
    dst: &D,
    artifact_type: &str,
    blobs: Vec<Descriptor>,
    opts: PackArtifactOptions,
) -> Result<Descriptor> {
    if artifact_type.is_empty() {
        return Err(Error::MissingArtifactType);
    }

    let mut annotations = opts.manifest_annotations.unwrap_or_default();
    match annotations.get(ANNOTATION_ARTIFACT_CREATED) {
        Some(value) => {
            DateTime::parse_from_rfc3339(value)
                .map_err(|_| Error::InvalidDateTimeFormat(value.clone()))?;
        }
        None => {
            annotations.insert(
                ANNOTATION_ARTIFACT_CREATED.to_string(),
                Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            );
        }
    }

    let manifest = ArtifactManifest {
        media_type: MEDIA_TYPE_ARTIFACT_MANIFEST.to_string(),
        artifact_type: artifact_type.to_string(),
        blobs,
        subject: opts.subject,
        annotations: Some(annotations),
    };
    push_manifest(dst, MEDIA_TYPE_ARTIFACT_MANIFEST, &manifest).await
}

/// Serialize a manifest canonically, push the bytes, and describe them.
async fn push_manifest<D: Storage + ?Sized, M: Serialize>(
    dst: &D,
    media_type: &str,
    manifest: &M,
) -> Result<Descriptor> {
    let content = serde_json::to_vec(manifest).map_err(|source| Error::MalformedManifest {
        media_type: media_type.to_string(),
        source,
    })?;
    let desc = Descriptor::from_bytes(media_type, &content);
    push_ignoring_existing(dst, &desc, Bytes::from(content)).await?;
    tracing::debug!(media_type = %media_type, digest = %desc.digest, "Packed manifest");
    Ok(desc)
}

async fn push_ignoring_existing<D: Storage + ?Sized>(
    dst: &D,
    desc: &Descriptor,
    content: Bytes,
) -> Result<()> {
    match dst.push(desc, Box::new(Cursor::new(content))).await {
        Ok(()) | Err(Error::AlreadyExists(_)) => Ok(()),
        Err(err) => Err(err),
    }
}
