//! Extended copy: replicate a node together with every manifest that
//! refers to it, bounded by an optional depth.
//!
//! The engine first walks *upwards* from the starting node to discover the
//! roots of every sub-DAG referring to it, then copies each sub-DAG
//! downwards in discovery order.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use ocimodel::manifest::{is_manifest_media_type, MEDIA_TYPE_LEGACY_ARTIFACT_MANIFEST};
use ocimodel::{Descriptor, DescriptorKey, LegacyArtifactManifest};
use regex::Regex;
use serde::Deserialize;

use crate::copy::copy_graph;
use crate::error::{Error, Result};
use crate::storage::{
    fetch_all, ReadOnlyGraphStorage, ReadOnlyGraphTarget, ReferrerFinder, Storage, Target,
};

/// Finds the predecessors the upward walk will follow.
///
/// Filters wrap the previously installed finder; the last registered one
/// runs outermost.
#[async_trait]
pub trait FindPredecessors: Send + Sync {
    async fn find(
        &self,
        src: &dyn ReadOnlyGraphStorage,
        node: &Descriptor,
    ) -> Result<Vec<Descriptor>>;
}

/// Options for [`extended_copy`] and [`extended_copy_graph`].
#[derive(Default)]
pub struct ExtendedCopyOptions {
    /// Maximum number of upward hops to follow. `0` means unbounded.
    pub depth: usize,
    /// Overrides the source store's own predecessor listing.
    pub find_predecessors: Option<Box<dyn FindPredecessors>>,
}

impl ExtendedCopyOptions {
    /// Keep only predecessors whose artifact type matches `regex`.
    ///
    /// `None` leaves the options untouched. When the source speaks the
    /// referrers API and no other predecessor override is installed, the
    /// walk uses that API directly instead of listing and re-fetching.
    ///
    /// When combining with [`Self::filter_annotation`], register this
    /// filter first so the smaller artifact-type-filtered set feeds the
    /// annotation fetches.
    pub fn filter_artifact_type(&mut self, regex: Option<Regex>) {
        let Some(regex) = regex else { return };
        let inner = self.find_predecessors.take();
        self.find_predecessors = Some(Box::new(ArtifactTypeFilter { regex, inner }));
    }

    /// Keep only predecessors carrying annotation `key`, optionally with a
    /// value matching `regex`.
    ///
    /// Predecessor descriptors arriving without annotations have them
    /// fetched from the manifest content before the check.
    pub fn filter_annotation(&mut self, key: impl Into<String>, regex: Option<Regex>) {
        let inner = self.find_predecessors.take();
        self.find_predecessors = Some(Box::new(AnnotationFilter {
            key: key.into(),
            regex,
            inner,
        }));
    }
}

/// Copy the node resolved from `src_ref`, every manifest referring to it
/// (transitively, within `opts.depth` hops), and all content those
/// manifests reach, then tag the node in `dst`. An empty `dst_ref` reuses
/// `src_ref`.
///
/// Returns the descriptor of the tagged node.
pub async fn extended_copy<S, D>(
    src: &S,
    src_ref: &str,
    dst: &D,
    dst_ref: &str,
    opts: ExtendedCopyOptions,
) -> Result<Descriptor>
where
    S: ReadOnlyGraphTarget,
    D: Target,
{
    let node = src.resolve(src_ref).await?;
    extended_copy_graph(src, dst, &node, &opts).await?;

    let dst_ref = if dst_ref.is_empty() { src_ref } else { dst_ref };
    dst.tag(&node, dst_ref).await?;
    Ok(node)
}

/// Copy every sub-DAG that contains `node`, rooted at the ancestors the
/// upward walk discovers.
pub async fn extended_copy_graph(
    src: &dyn ReadOnlyGraphStorage,
    dst: &dyn Storage,
    node: &Descriptor,
    opts: &ExtendedCopyOptions,
) -> Result<()> {
    let roots = find_roots(src, node, opts).await?;
    tracing::debug!(roots = roots.len(), digest = %node.digest, "Upward walk complete");

    for root in &roots {
        copy_graph(src, dst, root).await?;
    }
    Ok(())
}

/// Depth-first upward walk collecting the roots of every sub-DAG that
/// contains `node`, in first-discovery order.
///
/// A node is a root when it has no predecessors, or when the depth cap is
/// reached at it. Visited nodes are never re-queried, so a cyclic
/// predecessor listing cannot hang the walk.
async fn find_roots(
    src: &dyn ReadOnlyGraphStorage,
    node: &Descriptor,
    opts: &ExtendedCopyOptions,
) -> Result<Vec<Descriptor>> {
    let mut visited: HashSet<DescriptorKey> = HashSet::new();
    let mut root_keys: HashSet<DescriptorKey> = HashSet::new();
    let mut roots: Vec<Descriptor> = Vec::new();
    let mut stack: Vec<(Descriptor, usize)> = vec![(node.clone(), 0)];

    while let Some((current, depth)) = stack.pop() {
        let key = current.key();
        if !visited.insert(key.clone()) {
            continue;
        }

        // The depth cap ends the upward travel here, making the current
        // node the root of its sub-DAG.
        if opts.depth > 0 && depth == opts.depth {
            if root_keys.insert(key) {
                roots.push(current);
            }
            continue;
        }

        let predecessors = match &opts.find_predecessors {
            Some(finder) => finder.find(src, &current).await?,
            None => src.predecessors(&current).await?,
        };

        if predecessors.is_empty() {
            if root_keys.insert(key) {
                roots.push(current);
            }
            continue;
        }

        for predecessor in predecessors {
            if !visited.contains(&predecessor.key()) {
                stack.push((predecessor, depth + 1));
            }
        }
    }
    Ok(roots)
}

struct ArtifactTypeFilter {
    regex: Regex,
    inner: Option<Box<dyn FindPredecessors>>,
}

#[async_trait]
impl FindPredecessors for ArtifactTypeFilter {
    async fn find(
        &self,
        src: &dyn ReadOnlyGraphStorage,
        node: &Descriptor,
    ) -> Result<Vec<Descriptor>> {
        let predecessors = match &self.inner {
            Some(inner) => inner.find(src, node).await?,
            None => {
                // Referrer listings carry the artifact type of each entry,
                // so no per-predecessor fetch is needed on this path.
                if let Some(finder) = src.as_referrer_finder() {
                    return referrers_matching(finder, node, &self.regex).await;
                }
                src.predecessors(node).await?
            }
        };

        let mut filtered = Vec::new();
        for predecessor in predecessors {
            if predecessor.media_type != MEDIA_TYPE_LEGACY_ARTIFACT_MANIFEST {
                continue;
            }
            let content = fetch_all(src, &predecessor).await?;
            let manifest: LegacyArtifactManifest =
                serde_json::from_slice(&content).map_err(|source| Error::MalformedManifest {
                    media_type: predecessor.media_type.clone(),
                    source,
                })?;
            if self.regex.is_match(&manifest.artifact_type) {
                filtered.push(predecessor);
            }
        }
        Ok(filtered)
    }
}

/// Collect the referrers of `subject` whose artifact type matches,
/// preserving the page order of the store.
async fn referrers_matching(
    finder: &dyn ReferrerFinder,
    subject: &Descriptor,
    regex: &Regex,
) -> Result<Vec<Descriptor>> {
    let mut matched = Vec::new();
    finder
        .referrers(subject, "", &mut |page| {
            for referrer in page {
                if regex.is_match(referrer.artifact_type.as_deref().unwrap_or_default()) {
                    matched.push(referrer);
                }
            }
            Ok(())
        })
        .await?;
    Ok(matched)
}

struct AnnotationFilter {
    key: String,
    regex: Option<Regex>,
    inner: Option<Box<dyn FindPredecessors>>,
}

#[derive(Deserialize)]
struct ManifestAnnotations {
    annotations: Option<BTreeMap<String, String>>,
}

#[async_trait]
impl FindPredecessors for AnnotationFilter {
    async fn find(
        &self,
        src: &dyn ReadOnlyGraphStorage,
        node: &Descriptor,
    ) -> Result<Vec<Descriptor>> {
        let predecessors = match &self.inner {
            Some(inner) => inner.find(src, node).await?,
            None => src.predecessors(node).await?,
        };

        let mut filtered = Vec::new();
        for mut predecessor in predecessors {
            if predecessor.annotations.is_none()
                && is_manifest_media_type(&predecessor.media_type)
            {
                let content = fetch_all(src, &predecessor).await?;
                let manifest: ManifestAnnotations = serde_json::from_slice(&content).map_err(
                    |source| Error::MalformedManifest {
                        media_type: predecessor.media_type.clone(),
                        source,
                    },
                )?;
                predecessor.annotations = Some(manifest.annotations.unwrap_or_default());
            }

            let keep = predecessor
                .annotations
                .as_ref()
                .and_then(|annotations| annotations.get(&self.key))
                .map(|value| match &self.regex {
                    Some(regex) => regex.is_match(value),
                    None => true,
                })
                .unwrap_or(false);
            if keep {
                filtered.push(predecessor);
            }
        }
        Ok(filtered)
    }
}
