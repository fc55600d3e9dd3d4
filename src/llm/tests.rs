use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use super::generator::{AiGenerator, NO_TOOL_MANAGER_MESSAGE};
use super::prompt::SYSTEM_PROMPT;
use super::provider::MessagesClient;
use super::types::{
    ContentBlock, MessageContent, MessagesRequest, MessagesResponse, Role, StopReason, ToolChoice,
    Usage,
};
use crate::core::config::AnthropicSettings;
use crate::core::errors::ApiError;
use crate::rag::models::Source;
use crate::tools::{Tool, ToolDefinition, ToolManager, ToolOutput};

/// Replays canned responses and records every request it sees.
#[derive(Default)]
struct ScriptedClient {
    responses: Mutex<VecDeque<Result<MessagesResponse, ApiError>>>,
    requests: Mutex<Vec<MessagesRequest>>,
}

impl ScriptedClient {
    fn new(responses: Vec<Result<MessagesResponse, ApiError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<MessagesRequest> {
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
            .unwrap_or_else(|| Err(ApiError::Internal("script exhausted".to_string())))
    }
}

fn text_response(text: &str) -> Result<MessagesResponse, ApiError> {
    Ok(MessagesResponse {
        id: "msg".to_string(),
        model: "test-model".to_string(),
        content: vec![ContentBlock::Text {
            text: text.to_string(),
        }],
        stop_reason: Some(StopReason::EndTurn),
        usage: Usage::default(),
    })
}

fn tool_response(id: &str, name: &str, input: Value) -> Result<MessagesResponse, ApiError> {
    Ok(MessagesResponse {
        id: "msg".to_string(),
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

struct LookupTool;

#[async_trait]
impl Tool for LookupTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "search_course_content".to_string(),
            description: "lookup".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": { "query": { "type": "string" } },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, input: &Value) -> Result<ToolOutput, ApiError> {
        let query = input["query"].as_str().unwrap_or_default();
        Ok(ToolOutput {
            content: format!("results for {}", query),
            sources: vec![Source {
                text: format!("Course - {}", query),
                link: None,
            }],
        })
    }
}

struct BrokenTool;

#[async_trait]
impl Tool for BrokenTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_course_outline".to_string(),
            description: "always fails".to_string(),
            input_schema: json!({ "type": "object" }),
        }
    }

    async fn execute(&self, _input: &Value) -> Result<ToolOutput, ApiError> {
        Err(ApiError::Internal("Database timeout".to_string()))
    }
}

fn manager() -> ToolManager {
    let mut manager = ToolManager::new();
    manager.register(Arc::new(LookupTool)).unwrap();
    manager.register(Arc::new(BrokenTool)).unwrap();
    manager
}

fn generator(client: Arc<ScriptedClient>, max_rounds: usize) -> AiGenerator {
    let settings = AnthropicSettings {
        model: "test-model".to_string(),
        max_tool_rounds: max_rounds,
        ..AnthropicSettings::default()
    };
    AiGenerator::new(client, &settings)
}

#[tokio::test]
async fn direct_answer_uses_one_call() {
    let client = ScriptedClient::new(vec![text_response("Python is a language.")]);
    let manager = manager();
    let tools = manager.definitions();

    let generation = generator(client.clone(), 2)
        .generate_response("What is Python?", None, &tools, Some(&manager))
        .await
        .unwrap();

    assert_eq!(generation.answer, "Python is a language.");
    assert!(generation.sources.is_empty());

    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.model, "test-model");
    assert_eq!(request.max_tokens, 800);
    assert_eq!(request.temperature, 0.0);
    assert_eq!(request.system.as_deref(), Some(SYSTEM_PROMPT));
    assert_eq!(request.tool_choice, Some(ToolChoice::Auto));
    assert_eq!(request.tools.as_ref().map(Vec::len), Some(2));
    assert_eq!(
        request.messages[0].content,
        MessageContent::Text("What is Python?".to_string())
    );
}

#[tokio::test]
async fn history_extends_the_system_prompt() {
    let client = ScriptedClient::new(vec![text_response("ok")]);

    generator(client.clone(), 2)
        .generate_response("q", Some("User: hi\nAssistant: hello"), &[], None)
        .await
        .unwrap();

    let request = &client.requests()[0];
    let system = request.system.clone().unwrap();
    assert!(system.ends_with("Previous conversation:\nUser: hi\nAssistant: hello"));
    assert!(request.tools.is_none());
    assert!(request.tool_choice.is_none());
}

#[tokio::test]
async fn single_tool_round_then_answer() {
    let client = ScriptedClient::new(vec![
        tool_response("toolu_1", "search_course_content", json!({ "query": "MCP" })),
        text_response("MCP connects models to tools."),
    ]);
    let manager = manager();
    let tools = manager.definitions();

    let generation = generator(client.clone(), 2)
        .generate_response("Explain MCP", None, &tools, Some(&manager))
        .await
        .unwrap();

    assert_eq!(generation.answer, "MCP connects models to tools.");
    assert_eq!(generation.sources[0].text, "Course - MCP");

    let requests = client.requests();
    assert_eq!(requests.len(), 2);

    let second = &requests[1];
    assert_eq!(second.messages.len(), 3);
    assert_eq!(second.messages[1].role, Role::Assistant);
    assert_eq!(second.messages[2].role, Role::User);
    assert_eq!(
        second.messages[2].content,
        MessageContent::Blocks(vec![ContentBlock::ToolResult {
            tool_use_id: "toolu_1".to_string(),
            content: "results for MCP".to_string(),
        }])
    );
    assert_eq!(second.tool_choice, Some(ToolChoice::Auto));
}

#[tokio::test]
async fn two_rounds_end_with_a_call_without_tools() {
    let client = ScriptedClient::new(vec![
        tool_response("toolu_1", "search_course_content", json!({ "query": "lesson 4" })),
        tool_response("toolu_2", "search_course_content", json!({ "query": "related" })),
        text_response("Final synthesis."),
    ]);
    let manager = manager();
    let tools = manager.definitions();

    let generation = generator(client.clone(), 2)
        .generate_response("Compare lessons", None, &tools, Some(&manager))
        .await
        .unwrap();

    assert_eq!(generation.answer, "Final synthesis.");
    assert_eq!(generation.sources[0].text, "Course - related");

    let requests = client.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests[1].tools.is_some());

    let last = &requests[2];
    assert!(last.tools.is_none());
    assert!(last.tool_choice.is_none());
    assert_eq!(last.messages.len(), 5);
    assert_eq!(last.system, requests[0].system);
}

#[tokio::test]
async fn sources_survive_a_later_round_without_sources() {
    let client = ScriptedClient::new(vec![
        tool_response("toolu_1", "search_course_content", json!({ "query": "lesson 4" })),
        tool_response("toolu_2", "no_such_tool", json!({})),
        text_response("Answer from the first search."),
    ]);
    let manager = manager();
    let tools = manager.definitions();

    let generation = generator(client.clone(), 2)
        .generate_response("What is in lesson 4?", None, &tools, Some(&manager))
        .await
        .unwrap();

    assert_eq!(generation.answer, "Answer from the first search.");
    assert_eq!(
        generation.sources,
        vec![Source {
            text: "Course - lesson 4".to_string(),
            link: None,
        }]
    );
    assert_eq!(client.requests().len(), 3);
}

#[tokio::test]
async fn tool_use_stop_without_tool_call_returns_text() {
    let mut response = text_response("Partial answer.").unwrap();
    response.stop_reason = Some(StopReason::ToolUse);
    response.content.push(ContentBlock::Unknown);
    let client = ScriptedClient::new(vec![Ok(response)]);
    let manager = manager();
    let tools = manager.definitions();

    let generation = generator(client.clone(), 2)
        .generate_response("q", None, &tools, Some(&manager))
        .await
        .unwrap();

    assert_eq!(generation.answer, "Partial answer.");
    assert!(generation.sources.is_empty());
    assert_eq!(client.requests().len(), 1);
}

#[tokio::test]
async fn single_round_budget_stops_after_first_tool_call() {
    let client = ScriptedClient::new(vec![
        tool_response("toolu_1", "search_course_content", json!({ "query": "x" })),
        text_response("Answer after one round."),
    ]);
    let manager = manager();
    let tools = manager.definitions();

    let generation = generator(client.clone(), 1)
        .generate_response("q", None, &tools, Some(&manager))
        .await
        .unwrap();

    assert_eq!(generation.answer, "Answer after one round.");
    let requests = client.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].tools.is_none());
}

#[tokio::test]
async fn failing_tool_ends_the_loop() {
    let client = ScriptedClient::new(vec![tool_response(
        "toolu_1",
        "get_course_outline",
        json!({ "course_name": "MCP" }),
    )]);
    let manager = manager();
    let tools = manager.definitions();

    let generation = generator(client.clone(), 2)
        .generate_response("Outline MCP", None, &tools, Some(&manager))
        .await
        .unwrap();

    assert_eq!(
        generation.answer,
        "Tool execution failed: Database timeout. Unable to provide complete response."
    );
    assert_eq!(client.requests().len(), 1);
}

#[tokio::test]
async fn unknown_tool_result_is_fed_back() {
    let client = ScriptedClient::new(vec![
        tool_response("toolu_1", "no_such_tool", json!({})),
        text_response("Sorry."),
    ]);
    let manager = manager();
    let tools = manager.definitions();

    let generation = generator(client.clone(), 2)
        .generate_response("q", None, &tools, Some(&manager))
        .await
        .unwrap();

    assert_eq!(generation.answer, "Sorry.");
    let requests = client.requests();
    assert_eq!(
        requests[1].messages[2].content,
        MessageContent::Blocks(vec![ContentBlock::ToolResult {
            tool_use_id: "toolu_1".to_string(),
            content: "Tool 'no_such_tool' not found".to_string(),
        }])
    );
}

#[tokio::test]
async fn tool_request_without_manager() {
    let client = ScriptedClient::new(vec![tool_response(
        "toolu_1",
        "search_course_content",
        json!({ "query": "x" }),
    )]);

    let generation = generator(client, 2)
        .generate_response("q", None, &[], None)
        .await
        .unwrap();
    assert_eq!(generation.answer, NO_TOOL_MANAGER_MESSAGE);

    let mut with_text = tool_response("toolu_1", "search_course_content", json!({})).unwrap();
    with_text.content.insert(
        0,
        ContentBlock::Text {
            text: "Here is what I know.".to_string(),
        },
    );
    let client = ScriptedClient::new(vec![Ok(with_text)]);

    let generation = generator(client, 2)
        .generate_response("q", None, &[], None)
        .await
        .unwrap();
    assert_eq!(generation.answer, "Here is what I know.");
}

#[tokio::test]
async fn api_errors_propagate() {
    let client = ScriptedClient::new(vec![Err(ApiError::Upstream("overloaded".to_string()))]);

    let err = generator(client, 2)
        .generate_response("q", None, &[], None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Upstream(_)));
}
