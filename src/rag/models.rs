//! Course domain types shared by ingestion, storage and the search tools.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub lesson_number: i64,
    pub title: String,
    pub lesson_link: Option<String>,
}

/// A course parsed from a transcript file. The title doubles as its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub title: String,
    pub course_link: Option<String>,
    pub instructor: Option<String>,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseChunk {
    pub content: String,
    pub course_title: String,
    pub lesson_number: Option<i64>,
    /// Position of the chunk within its course, contiguous from 0.
    pub chunk_index: usize,
}

/// A citation shown under an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub text: String,
    pub link: Option<String>,
}
