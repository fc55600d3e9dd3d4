use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::errors::ApiError;
use crate::rag::models::{Course, CourseChunk};
use crate::rag::store::{CollectionCounts, CourseMetadata, CourseStore, SearchResults};

/// Canned store for tool tests. Records the last search call.
#[derive(Default)]
pub struct FakeStore {
    pub results: SearchResults,
    pub courses: Vec<CourseMetadata>,
    pub last_search: Mutex<Option<(String, Option<String>, Option<i64>)>>,
}

impl FakeStore {
    fn find(&self, title: &str) -> Option<&CourseMetadata> {
        self.courses.iter().find(|c| c.title == title)
    }
}

#[async_trait]
impl CourseStore for FakeStore {
    async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<i64>,
        _limit: Option<usize>,
    ) -> SearchResults {
        if let Ok(mut last) = self.last_search.lock() {
            *last = Some((
                query.to_string(),
                course_name.map(str::to_string),
                lesson_number,
            ));
        }
        self.results.clone()
    }

    async fn resolve_course_name(&self, course_name: &str) -> Result<Option<String>, ApiError> {
        let needle = course_name.to_lowercase();
        Ok(self
            .courses
            .iter()
            .find(|c| c.title.to_lowercase().contains(&needle))
            .map(|c| c.title.clone()))
    }

    async fn add_course_metadata(&self, _course: &Course) -> Result<(), ApiError> {
        Ok(())
    }

    async fn add_course_content(&self, _chunks: &[CourseChunk]) -> Result<(), ApiError> {
        Ok(())
    }

    async fn clear_all_data(&self) -> Result<(), ApiError> {
        Ok(())
    }

    async fn existing_course_titles(&self) -> Result<Vec<String>, ApiError> {
        Ok(self.courses.iter().map(|c| c.title.clone()).collect())
    }

    async fn course_count(&self) -> Result<usize, ApiError> {
        Ok(self.courses.len())
    }

    async fn course_metadata(&self, title: &str) -> Result<Option<CourseMetadata>, ApiError> {
        Ok(self.find(title).cloned())
    }

    async fn all_courses_metadata(&self) -> Result<Vec<CourseMetadata>, ApiError> {
        Ok(self.courses.clone())
    }

    async fn course_link(&self, title: &str) -> Result<Option<String>, ApiError> {
        Ok(self.find(title).and_then(|c| c.course_link.clone()))
    }

    async fn lesson_link(
        &self,
        title: &str,
        lesson_number: i64,
    ) -> Result<Option<String>, ApiError> {
        Ok(self.find(title).and_then(|c| {
            c.lessons
                .iter()
                .find(|l| l.lesson_number == lesson_number)
                .and_then(|l| l.lesson_link.clone())
        }))
    }

    async fn collection_counts(&self) -> Result<CollectionCounts, ApiError> {
        Ok(CollectionCounts {
            courses: self.courses.len(),
            chunks: self.results.hits.len(),
        })
    }
}
