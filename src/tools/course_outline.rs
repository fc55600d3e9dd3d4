use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Tool, ToolDefinition, ToolOutput};
use crate::core::errors::ApiError;
use crate::rag::store::{CourseMetadata, CourseStore};

pub const OUTLINE_TOOL_NAME: &str = "get_course_outline";

/// Returns a course's title, link, instructor and lesson list.
pub struct CourseOutlineTool {
    store: Arc<dyn CourseStore>,
}

impl CourseOutlineTool {
    pub fn new(store: Arc<dyn CourseStore>) -> Self {
        Self { store }
    }
}

fn render_outline(course: &CourseMetadata) -> String {
    let mut lines = vec![format!("**{}**", course.title)];

    if let Some(link) = course.course_link.as_deref().filter(|l| !l.is_empty()) {
        lines.push(format!("🔗 [View Course]({})", link));
    }
    if let Some(instructor) = course.instructor.as_deref().filter(|i| !i.is_empty()) {
        lines.push(format!("Instructor: {}", instructor));
    }

    lines.push(String::new());
    lines.push("**Lessons:**".to_string());

    if course.lessons.is_empty() {
        lines.push("*No lessons available*".to_string());
    } else {
        let mut lessons = course.lessons.clone();
        lessons.sort_by_key(|l| l.lesson_number);
        lines.extend(
            lessons
                .iter()
                .map(|lesson| format!("{}. {}", lesson.lesson_number, lesson.title)),
        );
    }

    lines.join("\n")
}

#[async_trait]
impl Tool for CourseOutlineTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: OUTLINE_TOOL_NAME.to_string(),
            description: "Get the complete outline of a course: title, link, instructor and every lesson"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "course_name": {
                        "type": "string",
                        "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                    }
                },
                "required": ["course_name"]
            }),
        }
    }

    async fn execute(&self, input: &Value) -> Result<ToolOutput, ApiError> {
        let course_name = input
            .get("course_name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ApiError::BadRequest("course_name is required".to_string()))?;

        let not_found = || ToolOutput::text(format!("No course found matching '{}'", course_name));

        let Some(title) = self.store.resolve_course_name(course_name).await? else {
            return Ok(not_found());
        };
        let Some(course) = self.store.course_metadata(&title).await? else {
            return Ok(not_found());
        };

        Ok(ToolOutput::text(render_outline(&course)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::models::Lesson;
    use crate::tools::fake_store::FakeStore;

    fn lesson(number: i64, title: &str) -> Lesson {
        Lesson {
            lesson_number: number,
            title: title.to_string(),
            lesson_link: None,
        }
    }

    fn course(link: Option<&str>, lessons: Vec<Lesson>) -> CourseMetadata {
        CourseMetadata {
            title: "Python Basics Course".to_string(),
            instructor: Some("Jane Doe".to_string()),
            course_link: link.map(str::to_string),
            lesson_count: lessons.len(),
            lessons,
        }
    }

    fn tool_for(courses: Vec<CourseMetadata>) -> CourseOutlineTool {
        CourseOutlineTool::new(Arc::new(FakeStore {
            courses,
            ..FakeStore::default()
        }))
    }

    #[test]
    fn definition_requires_course_name() {
        let definition = tool_for(Vec::new()).definition();
        assert_eq!(definition.name, "get_course_outline");
        assert_eq!(definition.input_schema["required"], json!(["course_name"]));
    }

    #[tokio::test]
    async fn unknown_course_is_reported() {
        let output = tool_for(Vec::new())
            .execute(&json!({ "course_name": "NonExistent" }))
            .await
            .unwrap();
        assert_eq!(output.content, "No course found matching 'NonExistent'");
    }

    #[tokio::test]
    async fn outline_lists_link_instructor_and_lessons() {
        let tool = tool_for(vec![course(
            Some("http://example.com/python"),
            vec![lesson(2, "Variables"), lesson(1, "Introduction")],
        )]);

        let output = tool
            .execute(&json!({ "course_name": "Python" }))
            .await
            .unwrap();

        assert_eq!(
            output.content,
            "**Python Basics Course**\n\
             🔗 [View Course](http://example.com/python)\n\
             Instructor: Jane Doe\n\
             \n\
             **Lessons:**\n\
             1. Introduction\n\
             2. Variables"
        );
        assert!(output.sources.is_empty());
    }

    #[tokio::test]
    async fn outline_without_link_or_lessons() {
        let tool = tool_for(vec![course(None, Vec::new())]);

        let output = tool
            .execute(&json!({ "course_name": "python basics" }))
            .await
            .unwrap();

        assert!(output.content.starts_with("**Python Basics Course**"));
        assert!(!output.content.contains('🔗'));
        assert!(output.content.ends_with("*No lessons available*"));
    }
}
