//! In-memory content-addressable store.
//!
//! Holds all content in a map keyed by descriptor identity, with a tag
//! table and a reverse-edge index maintained on push so predecessor
//! queries are answered without re-parsing manifests.

use std::collections::HashMap;
use std::io::Cursor;

use async_trait::async_trait;
use bytes::Bytes;
use ocimodel::{Descriptor, DescriptorKey, OciDigest};
use tokio::io::AsyncReadExt;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::graph::successors_of;
use crate::storage::{
    ByteStream, Deleter, Fetcher, PredecessorFinder, ReadOnlyGraphStorage, ReadOnlyStorage,
    Resolver, Storage, Tagger,
};

/// In-memory CAS with tag and reverse-edge indexes.
#[derive(Default)]
pub struct MemoryStore {
    content: RwLock<HashMap<DescriptorKey, Bytes>>,
    predecessors: RwLock<HashMap<DescriptorKey, Vec<Descriptor>>>,
    tags: RwLock<HashMap<String, Descriptor>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Fetcher for MemoryStore {
    async fn fetch(&self, target: &Descriptor) -> Result<ByteStream> {
        let content = self.content.read().await;
        match content.get(&target.key()) {
            Some(data) => Ok(Box::new(Cursor::new(data.clone())) as ByteStream),
            None => Err(Error::NotFound(target.digest.to_string())),
        }
    }
}

#[async_trait]
impl ReadOnlyStorage for MemoryStore {
    async fn exists(&self, target: &Descriptor) -> Result<bool> {
        let content = self.content.read().await;
        Ok(content.contains_key(&target.key()))
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn push(&self, expected: &Descriptor, mut content: ByteStream) -> Result<()> {
        let mut buf = Vec::new();
        content.read_to_end(&mut buf).await?;

        if buf.len() as u64 != expected.size {
            return Err(Error::SizeMismatch {
                expected: expected.size,
                actual: buf.len() as u64,
            });
        }
        let actual = OciDigest::from_bytes(&buf);
        if actual != expected.digest {
            return Err(Error::DigestMismatch {
                expected: expected.digest.to_string(),
                actual: actual.to_string(),
            });
        }

        // A malformed manifest must leave the store untouched, so the
        // children are parsed before any lock is taken.
        let children = successors_of(&expected.media_type, &buf)?;

        let key = expected.key();
        {
            let mut map = self.content.write().await;
            if map.contains_key(&key) {
                return Err(Error::AlreadyExists(expected.digest.to_string()));
            }
            map.insert(key, Bytes::from(buf));
        }

        if !children.is_empty() {
            let mut index = self.predecessors.write().await;
            for child in children {
                let entry = index.entry(child.key()).or_default();
                if !entry.iter().any(|d| d.key() == expected.key()) {
                    entry.push(expected.clone());
                }
            }
        }

        tracing::debug!(media_type = %expected.media_type, digest = %expected.digest, "Stored content");
        Ok(())
    }
}

#[async_trait]
impl Deleter for MemoryStore {
    async fn delete(&self, target: &Descriptor) -> Result<()> {
        let key = target.key();
        let data = {
            let mut map = self.content.write().await;
            map.remove(&key)
                .ok_or_else(|| Error::NotFound(target.digest.to_string()))?
        };

        // Unlink the node from the reverse index of its children.
        if let Ok(children) = successors_of(&target.media_type, &data) {
            let mut index = self.predecessors.write().await;
            for child in children {
                if let Some(entry) = index.get_mut(&child.key()) {
                    entry.retain(|d| d.key() != key);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Resolver for MemoryStore {
    async fn resolve(&self, reference: &str) -> Result<Descriptor> {
        let tags = self.tags.read().await;
        tags.get(reference)
            .cloned()
            .ok_or_else(|| Error::NotFound(reference.to_string()))
    }
}

#[async_trait]
impl Tagger for MemoryStore {
    async fn tag(&self, desc: &Descriptor, reference: &str) -> Result<()> {
        {
            let content = self.content.read().await;
            if !content.contains_key(&desc.key()) {
                return Err(Error::NotFound(desc.digest.to_string()));
            }
        }
        let mut tags = self.tags.write().await;
        tags.insert(reference.to_string(), desc.clone());
        Ok(())
    }
}

#[async_trait]
impl PredecessorFinder for MemoryStore {
    async fn predecessors(&self, node: &Descriptor) -> Result<Vec<Descriptor>> {
        let index = self.predecessors.read().await;
        Ok(index.get(&node.key()).cloned().unwrap_or_default())
    }
}

impl ReadOnlyGraphStorage for MemoryStore {}

#[cfg(test)]
mod tests {
    use ocimodel::manifest::{MEDIA_TYPE_IMAGE_MANIFEST, MEDIA_TYPE_UNKNOWN_CONFIG};
    use ocimodel::ImageManifest;

    use super::*;
    use crate::storage::fetch_all;

    fn stream(content: &[u8]) -> ByteStream {
        Box::new(Cursor::new(content.to_vec()))
    }

    #[tokio::test]
    async fn test_push_and_fetch() {
        let store = MemoryStore::new();
        let desc = Descriptor::from_bytes("test", b"hello world");

        store.push(&desc, stream(b"hello world")).await.unwrap();
        assert!(store.exists(&desc).await.unwrap());

        let content = fetch_all(&store, &desc).await.unwrap();
        assert_eq!(content.as_ref(), b"hello world");
    }

    #[tokio::test]
    async fn test_fetch_missing() {
        let store = MemoryStore::new();
        let desc = Descriptor::from_bytes("test", b"hello world");
        assert!(matches!(
            store.fetch(&desc).await.err().unwrap(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_push_rejects_wrong_digest() {
        let store = MemoryStore::new();
        let desc = Descriptor::from_bytes("test", b"hello world");

        let err = store.push(&desc, stream(b"hello w0rld")).await.unwrap_err();
        assert!(matches!(err, Error::DigestMismatch { .. }));
        assert!(!store.exists(&desc).await.unwrap());
    }

    #[tokio::test]
    async fn test_push_rejects_wrong_size() {
        let store = MemoryStore::new();
        let mut desc = Descriptor::from_bytes("test", b"hello world");
        desc.size = 5;

        let err = store.push(&desc, stream(b"hello world")).await.unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { .. }));
    }

    #[tokio::test]
    async fn test_push_duplicate() {
        let store = MemoryStore::new();
        let desc = Descriptor::from_bytes("test", b"hello world");

        store.push(&desc, stream(b"hello world")).await.unwrap();
        let err = store.push(&desc, stream(b"hello world")).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_tag_and_resolve() {
        let store = MemoryStore::new();
        let desc = Descriptor::from_bytes("test", b"hello world");
        store.push(&desc, stream(b"hello world")).await.unwrap();

        store.tag(&desc, "latest").await.unwrap();
        let resolved = store.resolve("latest").await.unwrap();
        assert_eq!(resolved, desc);
    }

    #[tokio::test]
    async fn test_tag_requires_content() {
        let store = MemoryStore::new();
        let desc = Descriptor::from_bytes("test", b"hello world");
        assert!(matches!(
            store.tag(&desc, "latest").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_resolve_unknown_reference() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.resolve("missing").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_delete_unlinks_predecessors() {
        let store = MemoryStore::new();
        let config = Descriptor::from_bytes(MEDIA_TYPE_UNKNOWN_CONFIG, b"{}");
        let layer = Descriptor::from_bytes("test", b"hello world");
        store.push(&config, stream(b"{}")).await.unwrap();
        store.push(&layer, stream(b"hello world")).await.unwrap();

        let manifest = ImageManifest {
            schema_version: 2,
            media_type: MEDIA_TYPE_IMAGE_MANIFEST.to_string(),
            config: config.clone(),
            layers: vec![layer.clone()],
            annotations: None,
        };
        let content = serde_json::to_vec(&manifest).unwrap();
        let manifest_desc = Descriptor::from_bytes(MEDIA_TYPE_IMAGE_MANIFEST, &content);
        store.push(&manifest_desc, stream(&content)).await.unwrap();

        store.delete(&manifest_desc).await.unwrap();
        assert!(!store.exists(&manifest_desc).await.unwrap());
        assert!(store.predecessors(&layer).await.unwrap().is_empty());
        assert!(store.exists(&layer).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_missing() {
        let store = MemoryStore::new();
        let desc = Descriptor::from_bytes("test", b"hello world");
        assert!(matches!(
            store.delete(&desc).await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_push_indexes_predecessors() {
        let store = MemoryStore::new();
        let config = Descriptor::from_bytes(MEDIA_TYPE_UNKNOWN_CONFIG, b"{}");
        let layer = Descriptor::from_bytes("test", b"hello world");
        store.push(&config, stream(b"{}")).await.unwrap();
        store.push(&layer, stream(b"hello world")).await.unwrap();

        let manifest = ImageManifest {
            schema_version: 2,
            media_type: MEDIA_TYPE_IMAGE_MANIFEST.to_string(),
            config: config.clone(),
            layers: vec![layer.clone()],
            annotations: None,
        };
        let content = serde_json::to_vec(&manifest).unwrap();
        let manifest_desc = Descriptor::from_bytes(MEDIA_TYPE_IMAGE_MANIFEST, &content);
        store.push(&manifest_desc, stream(&content)).await.unwrap();

        let parents = store.predecessors(&layer).await.unwrap();
        assert_eq!(parents, vec![manifest_desc.clone()]);
        let parents = store.predecessors(&config).await.unwrap();
        assert_eq!(parents, vec![manifest_desc.clone()]);
        assert!(store.predecessors(&manifest_desc).await.unwrap().is_empty());
    }
}
