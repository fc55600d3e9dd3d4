use async_trait::async_trait;

use super::types::{MessagesRequest, MessagesResponse};
use crate::core::errors::ApiError;

#[async_trait]
pub trait MessagesClient: Send + Sync {
    /// return the provider name (e.g. "anthropic")
    fn name(&self) -> &str;

    /// one non-streaming Messages API call
    async fn create_message(&self, request: &MessagesRequest)
        -> Result<MessagesResponse, ApiError>;
}
