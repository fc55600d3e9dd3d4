//! Tools the model can call during generation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use jsonschema::Validator;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::ApiError;
use crate::rag::models::Source;

mod course_outline;
mod course_search;
#[cfg(test)]
pub(crate) mod fake_store;

pub use course_outline::CourseOutlineTool;
pub use course_search::CourseSearchTool;

/// Tool description in the shape the Messages API expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    pub content: String,
    pub sources: Vec<Source>,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sources: Vec::new(),
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn execute(&self, input: &Value) -> Result<ToolOutput, ApiError>;
}

struct RegisteredTool {
    tool: Arc<dyn Tool>,
    definition: ToolDefinition,
    validator: Validator,
}

/// Registry that dispatches model tool calls by name.
#[derive(Default)]
pub struct ToolManager {
    tools: HashMap<String, RegisteredTool>,
    order: Vec<String>,
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ApiError> {
        let definition = tool.definition();
        let name = definition.name.trim().to_string();
        if name.is_empty() {
            return Err(ApiError::BadRequest(
                "Tool must have a 'name' in its definition".to_string(),
            ));
        }

        let validator = jsonschema::validator_for(&definition.input_schema).map_err(|e| {
            ApiError::BadRequest(format!("Invalid input schema for tool '{}': {}", name, e))
        })?;

        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(
            name,
            RegisteredTool {
                tool,
                definition,
                validator,
            },
        );
        Ok(())
    }

    /// Definitions in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|entry| entry.definition.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Runs a tool by name. An unknown name is reported back as the tool's
    /// text so the model can recover; invalid input is an error.
    pub async fn execute(&self, name: &str, input: &Value) -> Result<ToolOutput, ApiError> {
        let Some(entry) = self.tools.get(name) else {
            tracing::warn!(tool = %name, "Model requested an unknown tool");
            return Ok(ToolOutput::text(format!("Tool '{}' not found", name)));
        };

        if let Err(err) = entry.validator.validate(input) {
            return Err(ApiError::BadRequest(format!(
                "Invalid input for tool '{}': {}",
                name, err
            )));
        }

        tracing::debug!(tool = %name, input = %input, "Executing tool");
        entry.tool.execute(input).await
    }
}
