//! Distribution engine for OCI content graphs.
//!
//! Operates on content-addressable stores holding manifests, artifacts and
//! blobs: enumerates graph edges, copies whole DAGs between stores
//! (including the manifests referring to a node), and packs new image and
//! artifact manifests.

pub mod copy;
pub mod error;
pub mod extendedcopy;
pub mod graph;
pub mod memory;
pub mod pack;
pub mod storage;

// Re-export the main entry points for convenience
pub use copy::{copy, copy_graph};
pub use error::{Error, Result};
pub use extendedcopy::{extended_copy, extended_copy_graph, ExtendedCopyOptions, FindPredecessors};
pub use graph::{successors, successors_of};
pub use memory::MemoryStore;
pub use pack::{pack, pack_artifact, PackArtifactOptions, PackOptions};
pub use storage::{
    fetch_all, ByteStream, Deleter, Fetcher, GraphStorage, GraphTarget, PredecessorFinder,
    ReadOnly, ReadOnlyGraphStorage, ReadOnlyGraphTarget, ReadOnlyStorage, ReadOnlyTarget,
    ReferrerFinder, Resolver, Storage, TagResolver, Tagger, Target,
};
