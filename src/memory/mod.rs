//! Long-term memory: embedding generation and the conversation summarizer

mod embedding;
mod summarizer;

pub use embedding::{Embedder, EmbeddingService, EMBEDDING_DIMENSIONS};
pub use summarizer::{MemoryJob, MemoryJobReport};
