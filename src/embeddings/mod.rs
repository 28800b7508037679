// Embeddings module
// Word-window chunking, the embedder abstraction and the Ollama client

pub mod chunking;
pub mod embedder;
pub mod ollama;

pub use chunking::{ChunkingConfig, chunk_text, chunk_title, truncate_chars};
pub use embedder::{Embedder, Embedding, embed_query, embed_texts, embed_texts_with_progress};
pub use ollama::OllamaClient;
