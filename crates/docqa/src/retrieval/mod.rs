//! Vector retrieval: the flat index and its shared handle

pub mod index;
pub mod store;

pub use index::{cosine_similarity, IndexEntry, VectorIndex};
pub use store::VectorStore;
