pub mod paths;
pub mod service;
pub mod validation;

pub use paths::AppPaths;
pub use service::{
    AnthropicSettings, ConfigService, EmbeddingProvider, EmbeddingSettings, RagSettings,
    ServerSettings, Settings,
};
