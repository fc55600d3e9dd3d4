//! CourseStore trait: the vector-store seam used by ingestion and the search tools.
//!
//! Two collections live behind it: the course catalog (one record per course,
//! used to resolve fuzzy course names) and the course content (one record per
//! chunk, used for semantic search).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::models::{Course, CourseChunk, Lesson};
use crate::core::errors::ApiError;

/// Metadata stored with every content chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub course_title: String,
    pub lesson_number: Option<i64>,
    pub chunk_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub document: String,
    pub metadata: ChunkMetadata,
    /// `1 - cosine similarity`, lower is closer.
    pub distance: f32,
}

/// Outcome of a content search. Failures are carried in `error` instead of
/// an `Err` so the search tool can hand them to the model verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    pub error: Option<String>,
}

impl SearchResults {
    pub fn empty(error: impl Into<String>) -> Self {
        Self {
            hits: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Catalog record of a course as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseMetadata {
    pub title: String,
    pub instructor: Option<String>,
    pub course_link: Option<String>,
    pub lessons: Vec<Lesson>,
    pub lesson_count: usize,
}

impl From<&Course> for CourseMetadata {
    fn from(course: &Course) -> Self {
        Self {
            title: course.title.clone(),
            instructor: course.instructor.clone(),
            course_link: course.course_link.clone(),
            lessons: course.lessons.clone(),
            lesson_count: course.lessons.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionCounts {
    pub courses: usize,
    pub chunks: usize,
}

#[async_trait]
pub trait CourseStore: Send + Sync {
    /// Semantic search over the course content.
    ///
    /// `course_name` is resolved against the catalog first; `limit` defaults
    /// to the configured maximum number of results.
    async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<i64>,
        limit: Option<usize>,
    ) -> SearchResults;

    /// Maps a possibly partial course name to a stored course title.
    async fn resolve_course_name(&self, course_name: &str) -> Result<Option<String>, ApiError>;

    async fn add_course_metadata(&self, course: &Course) -> Result<(), ApiError>;

    async fn add_course_content(&self, chunks: &[CourseChunk]) -> Result<(), ApiError>;

    /// Empties both collections.
    async fn clear_all_data(&self) -> Result<(), ApiError>;

    async fn existing_course_titles(&self) -> Result<Vec<String>, ApiError>;

    async fn course_count(&self) -> Result<usize, ApiError>;

    async fn course_metadata(&self, title: &str) -> Result<Option<CourseMetadata>, ApiError>;

    async fn all_courses_metadata(&self) -> Result<Vec<CourseMetadata>, ApiError>;

    async fn course_link(&self, title: &str) -> Result<Option<String>, ApiError>;

    async fn lesson_link(&self, title: &str, lesson_number: i64)
        -> Result<Option<String>, ApiError>;

    async fn collection_counts(&self) -> Result<CollectionCounts, ApiError>;
}
