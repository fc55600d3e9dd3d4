use std::net::IpAddr;

use super::service::{EmbeddingProvider, Settings};
use crate::core::errors::ApiError;

pub fn validate_settings(settings: &Settings) -> Result<(), ApiError> {
    let rag = &settings.rag;
    validate_range("rag.chunk_size", rag.chunk_size, 1, 100_000)?;
    validate_range("rag.max_results", rag.max_results, 1, 100)?;
    validate_range("rag.max_history", rag.max_history, 0, 1_000)?;
    if rag.chunk_overlap >= rag.chunk_size {
        return Err(ApiError::BadRequest(format!(
            "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
            rag.chunk_overlap, rag.chunk_size
        )));
    }
    if !(0.0..=1.0).contains(&rag.course_match_threshold) {
        return Err(ApiError::BadRequest(
            "rag.course_match_threshold must be between 0 and 1".to_string(),
        ));
    }

    let anthropic = &settings.anthropic;
    validate_range("anthropic.max_tool_rounds", anthropic.max_tool_rounds, 1, 10)?;
    validate_range("anthropic.max_tokens", anthropic.max_tokens as usize, 1, 200_000)?;
    validate_range("anthropic.timeout_secs", anthropic.timeout_secs as usize, 1, 3_600)?;
    if !(0.0..=1.0).contains(&anthropic.temperature) {
        return Err(ApiError::BadRequest(
            "anthropic.temperature must be between 0 and 1".to_string(),
        ));
    }
    validate_url("anthropic.base_url", &anthropic.base_url)?;

    let embedding = &settings.embedding;
    validate_range("embedding.dimension", embedding.dimension, 1, 16_384)?;
    validate_range("embedding.timeout_secs", embedding.timeout_secs as usize, 1, 3_600)?;
    if embedding.provider == EmbeddingProvider::Http {
        let base_url = embedding.base_url.as_deref().unwrap_or("");
        validate_url("embedding.base_url", base_url)?;
    }

    if settings.server.host.parse::<IpAddr>().is_err() && settings.server.host != "localhost" {
        return Err(ApiError::BadRequest(format!(
            "server.host is not an IP address: {}",
            settings.server.host
        )));
    }

    Ok(())
}

fn validate_range(path: &str, value: usize, min: usize, max: usize) -> Result<(), ApiError> {
    if value < min || value > max {
        return Err(ApiError::BadRequest(format!(
            "{} must be between {} and {} (got {})",
            path, min, max, value
        )));
    }
    Ok(())
}

fn validate_url(path: &str, value: &str) -> Result<(), ApiError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        return Ok(());
    }
    Err(ApiError::BadRequest(format!(
        "{} must be an http(s) URL (got '{}')",
        path, value
    )))
}
