//! Downward graph copy between content stores.

use futures::future::BoxFuture;
use futures::FutureExt;
use ocimodel::Descriptor;

use crate::error::{Error, Result};
use crate::graph::successors;
use crate::storage::{ReadOnlyStorage, ReadOnlyTarget, Storage, Target};

/// Copy the sub-DAG rooted at the resolved reference from `src` to `dst`
/// and tag it there. An empty `dst_ref` reuses `src_ref`.
///
/// Returns the descriptor of the tagged node.
pub async fn copy<S, D>(src: &S, src_ref: &str, dst: &D, dst_ref: &str) -> Result<Descriptor>
where
    S: ReadOnlyTarget + ?Sized,
    D: Target + ?Sized,
{
    let node = src.resolve(src_ref).await?;
    copy_graph(src, dst, &node).await?;

    let dst_ref = if dst_ref.is_empty() { src_ref } else { dst_ref };
    dst.tag(&node, dst_ref).await?;
    Ok(node)
}

/// Copy the sub-DAG rooted at `root` from `src` to `dst`.
///
/// Children are fully copied before their parent manifest is pushed, so a
/// concurrent reader of `dst` never observes a manifest whose children are
/// missing. Content already present in `dst` is skipped, which makes the
/// copy idempotent.
pub async fn copy_graph<S, D>(src: &S, dst: &D, root: &Descriptor) -> Result<()>
where
    S: ReadOnlyStorage + ?Sized,
    D: Storage + ?Sized,
{
    copy_node(src, dst, root.clone()).await
}

fn copy_node<'a, S, D>(src: &'a S, dst: &'a D, node: Descriptor) -> BoxFuture<'a, Result<()>>
where
    S: ReadOnlyStorage + ?Sized,
    D: Storage + ?Sized,
{
    async move {
        if dst.exists(&node).await? {
            tracing::debug!(digest = %node.digest, "Content already present, skipping");
            return Ok(());
        }

        for child in successors(src, &node).await? {
            copy_node(src, dst, child).await?;
        }

        let stream = src.fetch(&node).await?;
        match dst.push(&node, stream).await {
            // A concurrent writer beat us to it; the content is there.
            Err(Error::AlreadyExists(_)) | Ok(()) => {
                tracing::debug!(media_type = %node.media_type, digest = %node.digest, "Copied node");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
    .boxed()
}
