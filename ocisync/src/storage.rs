//! Contracts a content-addressable store must satisfy.
//!
//! Stores compose capabilities from small traits: fetching, pushing,
//! tagging, and walking graph edges backwards. The engine only ever talks
//! to these traits; concrete backends live elsewhere.

use async_trait::async_trait;
use bytes::Bytes;
use ocimodel::Descriptor;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};

/// A readable byte stream handed out by a store.
///
/// Dropping the stream releases the underlying resource; every consumer in
/// this crate drains or drops it on all exit paths.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Retrieves content by descriptor.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the content identified by `target`.
    async fn fetch(&self, target: &Descriptor) -> Result<ByteStream>;
}

/// Read-only access to a content-addressable store.
#[async_trait]
pub trait ReadOnlyStorage: Fetcher {
    /// Check whether the described content is present.
    async fn exists(&self, target: &Descriptor) -> Result<bool>;
}

/// A content-addressable store that accepts new content.
#[async_trait]
pub trait Storage: ReadOnlyStorage {
    /// Store the content read from `content` under the expected descriptor.
    ///
    /// Content whose computed digest or length disagrees with `expected`
    /// is rejected with `DigestMismatch` or `SizeMismatch`.
    async fn push(&self, expected: &Descriptor, content: ByteStream) -> Result<()>;
}

/// Removes content from a store.
#[async_trait]
pub trait Deleter: Send + Sync {
    /// Remove the described content. Stores that cannot delete return
    /// `Unsupported`.
    async fn delete(&self, target: &Descriptor) -> Result<()>;
}

/// Resolves a human-readable reference to a descriptor.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, reference: &str) -> Result<Descriptor>;
}

/// Associates a human-readable reference with a descriptor.
#[async_trait]
pub trait Tagger: Send + Sync {
    async fn tag(&self, desc: &Descriptor, reference: &str) -> Result<()>;
}

/// Both halves of the tag service.
pub trait TagResolver: Resolver + Tagger {}
impl<T: Resolver + Tagger + ?Sized> TagResolver for T {}

/// Finds the nodes directly pointing at a given node of a DAG.
#[async_trait]
pub trait PredecessorFinder: Send + Sync {
    /// Returns the nodes directly pointing at `node`.
    ///
    /// Implementations may return duplicates or a superset of the true
    /// predecessors; callers compensate.
    async fn predecessors(&self, node: &Descriptor) -> Result<Vec<Descriptor>>;
}

/// Lists the manifests that name a given descriptor as their subject.
#[async_trait]
pub trait ReferrerFinder: Send + Sync {
    /// Walk the referrers of `subject`, invoking `page` once per page in the
    /// store's native page order. An error returned by `page` aborts the
    /// walk. `artifact_type` is a server-side filter; empty means all.
    async fn referrers(
        &self,
        subject: &Descriptor,
        artifact_type: &str,
        page: &mut (dyn FnMut(Vec<Descriptor>) -> Result<()> + Send),
    ) -> Result<()>;
}

/// A read-only store that can also walk edges backwards.
pub trait ReadOnlyGraphStorage: ReadOnlyStorage + PredecessorFinder {
    /// The referrers fast path, when the backing store speaks the
    /// referrers API. Defaults to `None`.
    fn as_referrer_finder(&self) -> Option<&dyn ReferrerFinder> {
        None
    }
}

/// A writable store that can also walk edges backwards.
pub trait GraphStorage: Storage + PredecessorFinder {}
impl<T: Storage + PredecessorFinder + ?Sized> GraphStorage for T {}

/// A read-only store with reference resolution.
pub trait ReadOnlyTarget: ReadOnlyStorage + Resolver {}
impl<T: ReadOnlyStorage + Resolver + ?Sized> ReadOnlyTarget for T {}

/// A store a graph can be copied into: content plus the tag service.
pub trait Target: Storage + TagResolver {}
impl<T: Storage + TagResolver + ?Sized> Target for T {}

/// A read-only graph store with reference resolution.
pub trait ReadOnlyGraphTarget: ReadOnlyGraphStorage + Resolver {}
impl<T: ReadOnlyGraphStorage + Resolver + ?Sized> ReadOnlyGraphTarget for T {}

/// A writable graph store with the tag service.
pub trait GraphTarget: Storage + PredecessorFinder + TagResolver {}
impl<T: Storage + PredecessorFinder + TagResolver + ?Sized> GraphTarget for T {}

/// Fetch the described content in full.
///
/// The stream is drained to completion; a length disagreeing with
/// `target.size` fails the operation.
pub async fn fetch_all<F: Fetcher + ?Sized>(fetcher: &F, target: &Descriptor) -> Result<Bytes> {
    let mut stream = fetcher.fetch(target).await?;
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    if buf.len() as u64 != target.size {
        return Err(Error::SizeMismatch {
            expected: target.size,
            actual: buf.len() as u64,
        });
    }
    Ok(Bytes::from(buf))
}

/// Read-only view over a store.
///
/// Reads and graph queries are forwarded to the wrapped store; `push`,
/// `delete` and `tag` return `Unsupported`.
pub struct ReadOnly<S> {
    inner: S,
}

impl<S> ReadOnly<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S: Fetcher> Fetcher for ReadOnly<S> {
    async fn fetch(&self, target: &Descriptor) -> Result<ByteStream> {
        self.inner.fetch(target).await
    }
}

#[async_trait]
impl<S: ReadOnlyStorage> ReadOnlyStorage for ReadOnly<S> {
    async fn exists(&self, target: &Descriptor) -> Result<bool> {
        self.inner.exists(target).await
    }
}

#[async_trait]
impl<S: ReadOnlyStorage> Storage for ReadOnly<S> {
    async fn push(&self, expected: &Descriptor, _content: ByteStream) -> Result<()> {
        Err(Error::Unsupported(format!("push {}", expected.digest)))
    }
}

#[async_trait]
impl<S: Send + Sync> Deleter for ReadOnly<S> {
    async fn delete(&self, target: &Descriptor) -> Result<()> {
        Err(Error::Unsupported(format!("delete {}", target.digest)))
    }
}

#[async_trait]
impl<S: Resolver> Resolver for ReadOnly<S> {
    async fn resolve(&self, reference: &str) -> Result<Descriptor> {
        self.inner.resolve(reference).await
    }
}

#[async_trait]
impl<S: Send + Sync> Tagger for ReadOnly<S> {
    async fn tag(&self, _desc: &Descriptor, reference: &str) -> Result<()> {
        Err(Error::Unsupported(format!("tag {reference}")))
    }
}

#[async_trait]
impl<S: PredecessorFinder> PredecessorFinder for ReadOnly<S> {
    async fn predecessors(&self, node: &Descriptor) -> Result<Vec<Descriptor>> {
        self.inner.predecessors(node).await
    }
}

impl<S: ReadOnlyGraphStorage> ReadOnlyGraphStorage for ReadOnly<S> {
    fn as_referrer_finder(&self) -> Option<&dyn ReferrerFinder> {
        self.inner.as_referrer_finder()
    }
}
