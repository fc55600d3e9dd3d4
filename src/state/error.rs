use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[source] anyhow::Error),

    #[error("Failed to initialize embedding model: {0}")]
    Embedder(#[source] anyhow::Error),

    #[error("Failed to initialize vector store: {0}")]
    Store(#[source] anyhow::Error),

    #[error("Failed to initialize LLM client: {0}")]
    Llm(#[source] anyhow::Error),

    #[error("Failed to assemble RAG system: {0}")]
    Rag(#[source] anyhow::Error),
}
