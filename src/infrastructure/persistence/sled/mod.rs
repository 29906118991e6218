//! Sled 嵌入式存储

mod artifact_index;

pub use artifact_index::{ArtifactIndex, IndexEntry, INDEX_DIR_NAME};
