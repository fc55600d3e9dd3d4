//! Course transcript parsing and sentence-aware chunking.
//!
//! A course file looks like:
//!
//! ```text
//! Course Title: Building Towards Computer Use
//! Course Link: https://example.com/course
//! Course Instructor: Jane Doe
//!
//! Lesson 0: Introduction
//! Lesson Link: https://example.com/lesson0
//! <transcript>
//! Lesson 1: ...
//! ```

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::models::{Course, CourseChunk, Lesson};
use crate::core::errors::ApiError;

static COURSE_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Course Title:\s*(.+)$").expect("valid regex"));
static COURSE_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Course Link:\s*(.+)$").expect("valid regex"));
static COURSE_INSTRUCTOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Course Instructor:\s*(.+)$").expect("valid regex"));
static LESSON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Lesson\s+(\d+):\s*(.+)$").expect("valid regex"));
static LESSON_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Lesson Link:\s*(.+)$").expect("valid regex"));

/// File extensions picked up when ingesting a folder.
pub const COURSE_FILE_EXTENSIONS: [&str; 2] = ["txt", "md"];

#[derive(Debug, Clone)]
pub struct DocumentProcessor {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl DocumentProcessor {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
        }
    }

    pub fn is_course_file(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                COURSE_FILE_EXTENSIONS
                    .iter()
                    .any(|allowed| ext.eq_ignore_ascii_case(allowed))
            })
            .unwrap_or(false)
    }

    pub fn read_file(path: &Path) -> Result<String, ApiError> {
        let bytes = std::fs::read(path)
            .map_err(|e| ApiError::internal(format!("Failed to read {}: {}", path.display(), e)))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn process_course_document(
        &self,
        path: &Path,
    ) -> Result<(Course, Vec<CourseChunk>), ApiError> {
        let content = Self::read_file(path)?;
        let fallback_title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(self.parse_course_document(&fallback_title, &content))
    }

    /// Parses a course transcript. `fallback_title` is used when the file has
    /// no `Course Title:` header.
    pub fn parse_course_document(
        &self,
        fallback_title: &str,
        content: &str,
    ) -> (Course, Vec<CourseChunk>) {
        let lines: Vec<&str> = content.trim().lines().collect();

        let course_title = lines
            .first()
            .and_then(|line| capture(&COURSE_TITLE_RE, line))
            .unwrap_or_else(|| fallback_title.to_string());

        let mut course_link = None;
        let mut instructor = None;
        for line in lines.iter().skip(1).take(3) {
            if let Some(link) = capture(&COURSE_LINK_RE, line) {
                course_link = Some(link);
            } else if let Some(name) = capture(&COURSE_INSTRUCTOR_RE, line) {
                instructor = Some(name);
            }
        }

        let mut course = Course {
            title: course_title,
            course_link,
            instructor,
            lessons: Vec::new(),
        };

        let start_index = header_len(&lines);
        let mut chunks = Vec::new();
        let mut current: Option<Lesson> = None;
        let mut lesson_body: Vec<&str> = Vec::new();

        let mut i = start_index;
        while i < lines.len() {
            let line = lines[i];
            if let Some(caps) = LESSON_RE.captures(line.trim()) {
                if let Some(lesson) = current.take() {
                    self.close_lesson(&mut course, lesson, &lesson_body, &mut chunks);
                }

                let lesson_number = caps[1].parse::<i64>().unwrap_or_default();
                let title = caps[2].trim().to_string();
                let mut lesson_link = None;
                if let Some(link) = lines.get(i + 1).and_then(|next| capture(&LESSON_LINK_RE, next)) {
                    lesson_link = Some(link);
                    i += 1;
                }

                current = Some(Lesson {
                    lesson_number,
                    title,
                    lesson_link,
                });
                lesson_body.clear();
            } else {
                lesson_body.push(line);
            }
            i += 1;
        }

        if let Some(lesson) = current.take() {
            self.close_lesson(&mut course, lesson, &lesson_body, &mut chunks);
        }

        // No lesson markers: treat the whole body as one unnumbered block
        if chunks.is_empty() && course.lessons.is_empty() && lines.len() > start_index {
            let remaining = lines[start_index..].join("\n");
            for chunk in self.chunk_text(remaining.trim()) {
                let chunk_index = chunks.len();
                chunks.push(CourseChunk {
                    content: chunk,
                    course_title: course.title.clone(),
                    lesson_number: None,
                    chunk_index,
                });
            }
        }

        (course, chunks)
    }

    fn close_lesson(
        &self,
        course: &mut Course,
        lesson: Lesson,
        body: &[&str],
        chunks: &mut Vec<CourseChunk>,
    ) {
        let text = body.join("\n");
        for (idx, chunk) in self.chunk_text(text.trim()).into_iter().enumerate() {
            let content = if idx == 0 {
                format!(
                    "Course {} Lesson {} content: {}",
                    course.title, lesson.lesson_number, chunk
                )
            } else {
                chunk
            };
            let chunk_index = chunks.len();
            chunks.push(CourseChunk {
                content,
                course_title: course.title.clone(),
                lesson_number: Some(lesson.lesson_number),
                chunk_index,
            });
        }
        course.lessons.push(lesson);
    }

    /// Splits text into sentence-aligned chunks of at most `chunk_size`
    /// characters, carrying up to `chunk_overlap` characters of trailing
    /// sentences into the next chunk.
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let sentences = split_sentences(&normalized);

        let mut chunks = Vec::new();
        let mut i = 0;
        while i < sentences.len() {
            let mut current: Vec<&str> = Vec::new();
            let mut current_size = 0;

            for sentence in &sentences[i..] {
                let addition = sentence.chars().count() + usize::from(!current.is_empty());
                if current_size + addition > self.chunk_size && !current.is_empty() {
                    break;
                }
                current.push(sentence);
                current_size += addition;
            }

            chunks.push(current.join(" "));

            if i + current.len() >= sentences.len() {
                break;
            }

            let mut overlap_size = 0;
            let mut overlap_sentences = 0;
            for (k, sentence) in current.iter().enumerate().rev() {
                let len = sentence.chars().count() + usize::from(k + 1 < current.len());
                if overlap_size + len > self.chunk_overlap {
                    break;
                }
                overlap_size += len;
                overlap_sentences += 1;
            }

            let next_start = i + current.len() - overlap_sentences;
            i = next_start.max(i + 1);
        }

        chunks
    }
}

fn capture(re: &Regex, line: &str) -> Option<String> {
    re.captures(line.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Number of leading lines that belong to the course header.
fn header_len(lines: &[&str]) -> usize {
    let mut start = 3.min(lines.len());
    if lines.get(3).is_some_and(|line| line.trim().is_empty()) {
        start = 4;
    }
    start
}

/// Splits at whitespace after `.`, `!` or `?` when the next word is
/// capitalised, keeping abbreviations such as `e.g.` or `Dr.` intact.
pub(crate) fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        if matches!(chars[i], '.' | '!' | '?') {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            let has_gap = j > i + 1;
            if has_gap && j < chars.len() && chars[j].is_uppercase() && !is_abbreviation(&chars, i)
            {
                push_sentence(&mut sentences, &chars[start..=i]);
                start = j;
                i = j;
                continue;
            }
        }
        i += 1;
    }

    if start < chars.len() {
        push_sentence(&mut sentences, &chars[start..]);
    }

    sentences
}

fn push_sentence(sentences: &mut Vec<String>, chars: &[char]) {
    let sentence: String = chars.iter().collect();
    let sentence = sentence.trim();
    if !sentence.is_empty() {
        sentences.push(sentence.to_string());
    }
}

fn is_abbreviation(chars: &[char], punct: usize) -> bool {
    let word = |idx: usize| chars[idx].is_alphanumeric() || chars[idx] == '_';

    // "e.g." / "i.e.": letter, dot, letter, punct
    if punct >= 3 && word(punct - 3) && chars[punct - 2] == '.' && word(punct - 1) {
        return true;
    }

    // "Mr." / "Dr.": capital, lowercase, dot
    punct >= 2
        && chars[punct] == '.'
        && chars[punct - 2].is_uppercase()
        && chars[punct - 1].is_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Course Title: Python Fundamentals
Course Link: http://example.com/course
Course Instructor: Dr. Python

Lesson 1: Introduction to Python
Lesson Link: http://example.com/lesson1
Python is a high-level programming language. It is known for its simplicity.
Lesson 2: Variables and Data Types
Variables in Python are used to store data values.
Lesson 3: Control Structures
Lesson Link: http://example.com/lesson3
Control structures like if-else statements control program flow.";

    #[test]
    fn splits_on_sentence_boundaries_only() {
        let sentences =
            split_sentences("Tools help, e.g. Search. Mr. Smith agrees! Does it work? yes it does.");
        assert_eq!(
            sentences,
            vec![
                "Tools help, e.g. Search.",
                "Mr. Smith agrees!",
                "Does it work? yes it does."
            ]
        );
    }

    #[test]
    fn chunks_respect_size_and_carry_overlap() {
        let processor = DocumentProcessor::new(40, 20);
        let chunks = processor.chunk_text("First sentence here. Second one. Third sentence is longer.");

        assert_eq!(
            chunks,
            vec![
                "First sentence here. Second one.",
                "Second one. Third sentence is longer."
            ]
        );
        assert!(chunks.iter().all(|c| c.chars().count() <= 40));
    }

    #[test]
    fn oversized_sentence_becomes_its_own_chunk() {
        let processor = DocumentProcessor::new(10, 0);
        let chunks = processor.chunk_text("This sentence is far too long. Ok.");
        assert_eq!(chunks, vec!["This sentence is far too long.", "Ok."]);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        let processor = DocumentProcessor::new(800, 100);
        assert!(processor.chunk_text("   \n ").is_empty());
    }

    #[test]
    fn parses_header_lessons_and_links() {
        let processor = DocumentProcessor::new(800, 100);
        let (course, chunks) = processor.parse_course_document("fallback", SAMPLE);

        assert_eq!(course.title, "Python Fundamentals");
        assert_eq!(course.course_link.as_deref(), Some("http://example.com/course"));
        assert_eq!(course.instructor.as_deref(), Some("Dr. Python"));
        assert_eq!(course.lessons.len(), 3);
        assert_eq!(course.lessons[0].lesson_link.as_deref(), Some("http://example.com/lesson1"));
        assert_eq!(course.lessons[1].lesson_link, None);
        assert_eq!(course.lessons[2].title, "Control Structures");

        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks[0].content,
            "Course Python Fundamentals Lesson 1 content: Python is a high-level programming language. It is known for its simplicity."
        );
        assert_eq!(chunks[1].lesson_number, Some(2));
        let indices: Vec<usize> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn only_first_chunk_of_a_lesson_gets_context_prefix() {
        let processor = DocumentProcessor::new(30, 0);
        let doc = "Course Title: Tiny\n\n\nLesson 1: Intro\nAlpha beta gamma. Delta epsilon zeta.";
        let (_, chunks) = processor.parse_course_document("x", doc);

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].content.starts_with("Course Tiny Lesson 1 content: "));
        assert_eq!(chunks[1].content, "Delta epsilon zeta.");
    }

    #[test]
    fn missing_header_falls_back_to_file_name_and_unnumbered_chunks() {
        let processor = DocumentProcessor::new(800, 100);
        let doc = "line one\nline two\nline three\nSome body text. More body text.";
        let (course, chunks) = processor.parse_course_document("notes", doc);

        assert_eq!(course.title, "notes");
        assert!(course.lessons.is_empty());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].lesson_number, None);
        assert_eq!(chunks[0].content, "Some body text. More body text.");
    }

    #[test]
    fn reads_course_files_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("python.txt");
        std::fs::write(&path, SAMPLE).unwrap();

        let processor = DocumentProcessor::new(800, 100);
        let (course, chunks) = processor.process_course_document(&path).unwrap();

        assert_eq!(course.title, "Python Fundamentals");
        assert_eq!(chunks.len(), 3);
        assert!(DocumentProcessor::is_course_file(&path));
        assert!(!DocumentProcessor::is_course_file(&dir.path().join("slides.pdf")));
    }
}
