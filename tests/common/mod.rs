#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use course_rag::core::config::{AppPaths, EmbeddingProvider, Settings};
use course_rag::core::errors::ApiError;
use course_rag::llm::types::{ContentBlock, MessagesRequest, MessagesResponse, StopReason, Usage};
use course_rag::llm::MessagesClient;
use course_rag::rag::{CourseStore, HashEmbedder, RagSystem, SqliteCourseStore};
use course_rag::state::AppState;

pub const COMPUTER_USE_COURSE: &str = "Course Title: Building Towards Computer Use with Anthropic
Course Link: https://example.com/computer-use
Course Instructor: Colt Steele

Lesson 0: Introduction
Lesson Link: https://example.com/computer-use/lesson0
Welcome to the course. You will learn how a model can operate a computer through screenshots and mouse actions.

Lesson 1: Tool Use Basics
Lesson Link: https://example.com/computer-use/lesson1
Tool use lets the model call functions that you define. The model answers with a tool use block and your code returns a tool result.
";

pub const MCP_COURSE: &str = "Course Title: MCP: Build Rich-Context AI Apps
Course Link: https://example.com/mcp
Course Instructor: Elie Schoppik

Lesson 1: Why MCP
Lesson Link: https://example.com/mcp/lesson1
The Model Context Protocol standardizes how applications expose tools and resources to language models.
";

/// Replays canned Messages API responses and records each request.
#[derive(Default)]
pub struct ScriptedClient {
    responses: Mutex<VecDeque<Result<MessagesResponse, ApiError>>>,
    requests: Mutex<Vec<MessagesRequest>>,
}

impl ScriptedClient {
    pub fn new(responses: Vec<Result<MessagesResponse, ApiError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<MessagesRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagesClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn create_message(
        &self,
        request: &MessagesRequest,
    ) -> Result<MessagesResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Upstream("no scripted response left".to_string())))
    }
}

pub fn text_response(text: &str) -> Result<MessagesResponse, ApiError> {
    Ok(MessagesResponse {
        id: "msg_test".to_string(),
        model: "test-model".to_string(),
        content: vec![ContentBlock::Text {
            text: text.to_string(),
        }],
        stop_reason: Some(StopReason::EndTurn),
        usage: Usage::default(),
    })
}

pub fn tool_response(id: &str, name: &str, input: Value) -> Result<MessagesResponse, ApiError> {
    Ok(MessagesResponse {
        id: "msg_test".to_string(),
        model: "test-model".to_string(),
        content: vec![ContentBlock::ToolUse {
            id: id.to_string(),
            name: name.to_string(),
            input,
        }],
        stop_reason: Some(StopReason::ToolUse),
        usage: Usage::default(),
    })
}

pub fn write_course(dir: &Path, file_name: &str, contents: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(file_name), contents).unwrap();
}

pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.embedding.provider = EmbeddingProvider::Hash;
    settings.embedding.dimension = 256;
    settings
}

/// Builds state rooted at `root` with a hash embedder and the scripted client.
pub async fn build_state(root: &Path, client: Arc<ScriptedClient>) -> Arc<AppState> {
    let paths = Arc::new(AppPaths::from_dirs(root.to_path_buf(), root.join("data")));
    let settings = test_settings();

    let store: Arc<dyn CourseStore> = Arc::new(
        SqliteCourseStore::open(
            &paths.db_path,
            Arc::new(HashEmbedder::new(settings.embedding.dimension)),
            &settings.rag,
        )
        .await
        .unwrap(),
    );
    let rag = RagSystem::new(&settings, store, client).unwrap();

    AppState::new(paths, settings, rag)
}
