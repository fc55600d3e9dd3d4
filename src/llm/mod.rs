pub mod anthropic;
pub mod generator;
pub mod prompt;
pub mod provider;
pub mod types;

#[cfg(test)]
mod tests;

pub use anthropic::AnthropicClient;
pub use generator::{AiGenerator, Generation};
pub use provider::MessagesClient;
