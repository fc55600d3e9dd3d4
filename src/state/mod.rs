use std::sync::Arc;

use crate::core::config::{AppPaths, ConfigService, Settings};
use crate::llm::{AnthropicClient, MessagesClient};
use crate::rag::{build_embedder, CourseStore, RagSystem, SqliteCourseStore};

pub mod error;

use error::InitializationError;

/// Application state shared across all routes.
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub settings: Settings,
    pub rag: RagSystem,
}

impl AppState {
    pub fn new(paths: Arc<AppPaths>, settings: Settings, rag: RagSystem) -> Arc<Self> {
        Arc::new(Self {
            paths,
            settings,
            rag,
        })
    }

    /// Loads settings for `paths`, then builds the components in order:
    /// embedder, vector store, Anthropic client, RAG system.
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let settings = ConfigService::new(paths.clone())
            .load()
            .map_err(|e| InitializationError::Config(e.into()))?;
        Self::with_settings(paths, settings).await
    }

    pub async fn with_settings(
        paths: Arc<AppPaths>,
        settings: Settings,
    ) -> Result<Arc<Self>, InitializationError> {
        tracing::info!(settings = %settings.redacted(), "Configuration loaded");

        let embedder = build_embedder(&settings.embedding, paths.as_ref())
            .map_err(|e| InitializationError::Embedder(e.into()))?;

        let store: Arc<dyn CourseStore> = Arc::new(
            SqliteCourseStore::open(&paths.db_path, embedder, &settings.rag)
                .await
                .map_err(|e| InitializationError::Store(e.into()))?,
        );

        let client: Arc<dyn MessagesClient> = Arc::new(
            AnthropicClient::new(&settings.anthropic)
                .map_err(|e| InitializationError::Llm(e.into()))?,
        );

        let rag = RagSystem::new(&settings, store, client)
            .map_err(|e| InitializationError::Rag(e.into()))?;

        Ok(Self::new(paths, settings, rag))
    }
}
