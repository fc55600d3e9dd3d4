//! Wires document processing, the vector store, the tools and the generator.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::document::DocumentProcessor;
use super::models::{Course, CourseChunk};
use super::store::CourseStore;
use crate::core::config::Settings;
use crate::core::errors::ApiError;
use crate::history::SessionManager;
use crate::llm::{AiGenerator, Generation, MessagesClient};
use crate::tools::{CourseOutlineTool, CourseSearchTool, ToolManager};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseAnalytics {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}

pub struct RagSystem {
    processor: DocumentProcessor,
    store: Arc<dyn CourseStore>,
    generator: AiGenerator,
    tools: ToolManager,
    sessions: SessionManager,
}

impl RagSystem {
    pub fn new(
        settings: &Settings,
        store: Arc<dyn CourseStore>,
        client: Arc<dyn MessagesClient>,
    ) -> Result<Self, ApiError> {
        let mut tools = ToolManager::new();
        tools.register(Arc::new(CourseSearchTool::new(store.clone())))?;
        tools.register(Arc::new(CourseOutlineTool::new(store.clone())))?;

        Ok(Self {
            processor: DocumentProcessor::new(settings.rag.chunk_size, settings.rag.chunk_overlap),
            store,
            generator: AiGenerator::new(client, &settings.anthropic),
            tools,
            sessions: SessionManager::new(settings.rag.max_history),
        })
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn store(&self) -> &Arc<dyn CourseStore> {
        &self.store
    }

    pub fn tool_manager(&self) -> &ToolManager {
        &self.tools
    }

    /// Parses one course file and stores its catalog entry and chunks.
    pub async fn add_course_document(&self, path: &Path) -> Result<(Course, usize), ApiError> {
        let (course, chunks) = self.processor.process_course_document(path)?;
        self.store_course(&course, &chunks).await?;
        Ok((course, chunks.len()))
    }

    /// Chunks go in before the catalog row: a title only counts as ingested
    /// once its content is searchable.
    async fn store_course(&self, course: &Course, chunks: &[CourseChunk]) -> Result<(), ApiError> {
        self.store.add_course_content(chunks).await?;
        self.store.add_course_metadata(course).await
    }

    /// Ingests every course file in `folder`, skipping titles already stored.
    /// Returns `(courses_added, chunks_added)`.
    pub async fn add_course_folder(
        &self,
        folder: &Path,
        clear_existing: bool,
    ) -> Result<(usize, usize), ApiError> {
        if clear_existing {
            tracing::info!("Clearing existing course data");
            self.store.clear_all_data().await?;
        }

        if !folder.is_dir() {
            tracing::warn!(folder = %folder.display(), "Course folder does not exist");
            return Ok((0, 0));
        }

        let mut files: Vec<_> = std::fs::read_dir(folder)
            .map_err(ApiError::internal)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && DocumentProcessor::is_course_file(path))
            .collect();
        files.sort();

        let mut existing = self.store.existing_course_titles().await?;
        let mut courses_added = 0;
        let mut chunks_added = 0;

        for file in files {
            let (course, chunks) = match self.processor.process_course_document(&file) {
                Ok(parsed) => parsed,
                Err(err) => {
                    tracing::warn!(file = %file.display(), error = %err, "Skipping unreadable course file");
                    continue;
                }
            };

            if existing.contains(&course.title) {
                tracing::info!(course = %course.title, "Course already exists, skipping");
                continue;
            }

            if let Err(err) = self.store_course(&course, &chunks).await {
                tracing::error!(
                    file = %file.display(),
                    course = %course.title,
                    error = %err,
                    "Failed to store course, continuing with the next file"
                );
                continue;
            }
            tracing::info!(course = %course.title, chunks = chunks.len(), "Added course");

            courses_added += 1;
            chunks_added += chunks.len();
            existing.push(course.title);
        }

        Ok((courses_added, chunks_added))
    }

    /// Answers a question, using and then extending the session's history.
    pub async fn query(&self, query: &str, session_id: Option<&str>) -> Result<Generation, ApiError> {
        let prompt = format!("Answer this question about course materials: {}", query);

        let history = match session_id {
            Some(id) => self.sessions.get_conversation_history(id)?,
            None => None,
        };

        let definitions = self.tools.definitions();
        let generation = self
            .generator
            .generate_response(&prompt, history.as_deref(), &definitions, Some(&self.tools))
            .await?;

        if let Some(id) = session_id {
            self.sessions.add_exchange(id, query, &generation.answer)?;
        }

        Ok(generation)
    }

    pub async fn course_analytics(&self) -> Result<CourseAnalytics, ApiError> {
        let course_titles = self.store.existing_course_titles().await?;
        Ok(CourseAnalytics {
            total_courses: course_titles.len(),
            course_titles,
        })
    }
}
