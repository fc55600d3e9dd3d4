//! Course retrieval: parsing, embeddings, the vector store and the RAG pipeline.

pub mod document;
pub mod embedding;
pub mod models;
mod sqlite;
pub mod store;
mod system;

pub use document::DocumentProcessor;
pub use embedding::{build_embedder, Embedder, HashEmbedder};
pub use sqlite::SqliteCourseStore;
pub use store::{CourseStore, SearchResults};
pub use system::{CourseAnalytics, RagSystem};
