//! Bounded sequential tool calling on top of the Messages API.
//!
//! Each round the model sees the conversation so far and may request tools.
//! Results go back as a single user message of `tool_result` blocks. Once the
//! round budget is spent, one last call is made without tools so the model
//! has to answer from what it has gathered.

use std::sync::Arc;

use super::prompt::build_system_prompt;
use super::provider::MessagesClient;
use super::types::{
    ContentBlock, Message, MessagesRequest, MessagesResponse, Role, ToolChoice,
};
use crate::core::config::AnthropicSettings;
use crate::core::errors::ApiError;
use crate::rag::models::Source;
use crate::tools::{ToolDefinition, ToolManager};

pub const NO_TOOL_MANAGER_MESSAGE: &str = "Tool requested but no tool manager available";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generation {
    pub answer: String,
    /// Sources from the most recent tool call that produced any.
    pub sources: Vec<Source>,
}

pub struct AiGenerator {
    client: Arc<dyn MessagesClient>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    max_rounds: usize,
}

impl AiGenerator {
    pub fn new(client: Arc<dyn MessagesClient>, settings: &AnthropicSettings) -> Self {
        Self {
            client,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            max_rounds: settings.max_tool_rounds.max(1),
        }
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    fn request(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> MessagesRequest {
        let (tools, tool_choice) = if tools.is_empty() {
            (None, None)
        } else {
            (Some(tools.to_vec()), Some(ToolChoice::Auto))
        };

        MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: Some(system.to_string()),
            messages: messages.to_vec(),
            tools,
            tool_choice,
        }
    }

    pub async fn generate_response(
        &self,
        query: &str,
        history: Option<&str>,
        tools: &[ToolDefinition],
        tool_manager: Option<&ToolManager>,
    ) -> Result<Generation, ApiError> {
        let system = build_system_prompt(history);
        let mut messages = vec![Message::user_text(query)];
        let mut sources = Vec::new();
        let mut round = 1;

        loop {
            let request = self.request(&system, &messages, tools);
            let response = self.client.create_message(&request).await?;

            if !response.wants_tools() {
                tracing::debug!(round, "Model answered without tools");
                return Ok(Generation {
                    answer: response.text(),
                    sources,
                });
            }

            // nothing executable, the text is the answer
            if !response.has_tool_use() {
                tracing::warn!(round, "Tool use requested without a tool_use block");
                return Ok(Generation {
                    answer: response.text(),
                    sources,
                });
            }

            let Some(manager) = tool_manager else {
                let text = response.text();
                let answer = if text.trim().is_empty() {
                    NO_TOOL_MANAGER_MESSAGE.to_string()
                } else {
                    text
                };
                return Ok(Generation { answer, sources });
            };

            if let Err(err) = run_tools(&response, manager, &mut messages, &mut sources).await {
                tracing::warn!(round, error = %err, "Tool execution failed");
                return Ok(Generation {
                    answer: format!(
                        "Tool execution failed: {}. Unable to provide complete response.",
                        err.detail()
                    ),
                    sources,
                });
            }

            if round >= self.max_rounds {
                tracing::info!(round, "Tool round budget spent, requesting final answer");
                let request = self.request(&system, &messages, &[]);
                let response = self.client.create_message(&request).await?;
                return Ok(Generation {
                    answer: response.text(),
                    sources,
                });
            }

            round += 1;
        }
    }
}

/// Appends the assistant turn and the results of every `tool_use` block.
async fn run_tools(
    response: &MessagesResponse,
    manager: &ToolManager,
    messages: &mut Vec<Message>,
    sources: &mut Vec<Source>,
) -> Result<(), ApiError> {
    let assistant_blocks: Vec<ContentBlock> = response
        .content
        .iter()
        .filter(|block| !matches!(block, ContentBlock::Unknown))
        .cloned()
        .collect();

    let mut results = Vec::new();
    for block in &assistant_blocks {
        let ContentBlock::ToolUse { id, name, input } = block else {
            continue;
        };

        tracing::info!(tool = %name, "Running tool requested by model");
        let output = manager.execute(name, input).await?;
        if !output.sources.is_empty() {
            *sources = output.sources;
        }
        results.push(ContentBlock::ToolResult {
            tool_use_id: id.clone(),
            content: output.content,
        });
    }

    messages.push(Message::blocks(Role::Assistant, assistant_blocks));
    if !results.is_empty() {
        messages.push(Message::blocks(Role::User, results));
    }
    Ok(())
}
