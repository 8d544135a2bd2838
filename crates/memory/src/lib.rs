//! Memory implementations for Convoke agents.

pub mod in_memory;
pub mod vector;

pub use in_memory::InMemoryStore;
pub use vector::{InMemoryVectorStore, cosine_similarity};
