use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Tool, ToolDefinition, ToolOutput};
use crate::core::errors::ApiError;
use crate::rag::models::Source;
use crate::rag::store::{CourseStore, SearchResults};

pub const SEARCH_TOOL_NAME: &str = "search_course_content";

/// Semantic search over course content with optional course and lesson filters.
pub struct CourseSearchTool {
    store: Arc<dyn CourseStore>,
}

impl CourseSearchTool {
    pub fn new(store: Arc<dyn CourseStore>) -> Self {
        Self { store }
    }

    async fn format_results(&self, results: &SearchResults) -> ToolOutput {
        let mut blocks = Vec::with_capacity(results.hits.len());
        let mut sources = Vec::with_capacity(results.hits.len());

        for hit in &results.hits {
            let course_title = &hit.metadata.course_title;
            let mut header = course_title.clone();
            let mut link = None;

            if let Some(lesson_number) = hit.metadata.lesson_number {
                header.push_str(&format!(" - Lesson {}", lesson_number));
                link = match self.store.lesson_link(course_title, lesson_number).await {
                    Ok(link) => link,
                    Err(err) => {
                        tracing::warn!(error = %err, course = %course_title, "Lesson link lookup failed");
                        None
                    }
                };
            }

            blocks.push(format!("[{}]\n{}", header, hit.document));
            sources.push(Source { text: header, link });
        }

        ToolOutput {
            content: blocks.join("\n\n"),
            sources,
        }
    }
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: SEARCH_TOOL_NAME.to_string(),
            description: "Search course materials with smart course name matching and lesson filtering"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to search for in the course content"
                    },
                    "course_name": {
                        "type": "string",
                        "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                    },
                    "lesson_number": {
                        "type": "integer",
                        "description": "Specific lesson number to search within (e.g. 1, 2, 3)"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, input: &Value) -> Result<ToolOutput, ApiError> {
        let query = input
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ApiError::BadRequest("query is required".to_string()))?;
        let course_name = input.get("course_name").and_then(|v| v.as_str());
        let lesson_number = input.get("lesson_number").and_then(|v| v.as_i64());

        let results = self
            .store
            .search(query, course_name, lesson_number, None)
            .await;

        if let Some(error) = results.error {
            return Ok(ToolOutput::text(error));
        }

        if results.is_empty() {
            let mut message = "No relevant content found".to_string();
            if let Some(course) = course_name {
                message.push_str(&format!(" in course '{}'", course));
            }
            if let Some(lesson) = lesson_number {
                message.push_str(&format!(" in lesson {}", lesson));
            }
            message.push('.');
            return Ok(ToolOutput::text(message));
        }

        Ok(self.format_results(&results).await)
    }
}
