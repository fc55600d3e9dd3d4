//! Text embedding backends.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::config::{AppPaths, EmbeddingProvider, EmbeddingSettings};
use crate::core::errors::ApiError;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier stored alongside vectors; changing it invalidates the index.
    fn model_name(&self) -> &str;

    fn dimension(&self) -> usize;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Internal("Embedder returned no vector".to_string()))
    }
}

pub fn build_embedder(
    settings: &EmbeddingSettings,
    paths: &AppPaths,
) -> Result<Arc<dyn Embedder>, ApiError> {
    match settings.provider {
        EmbeddingProvider::Hash => Ok(Arc::new(HashEmbedder::new(settings.dimension))),
        EmbeddingProvider::Http => {
            let base_url = settings.base_url.clone().ok_or_else(|| {
                ApiError::BadRequest("embedding.base_url is required for the http provider".into())
            })?;
            Ok(Arc::new(HttpEmbedder::new(
                base_url,
                settings.model.clone(),
                settings.dimension,
                settings.api_key.clone(),
                Duration::from_secs(settings.timeout_secs),
            )?))
        }
        #[cfg(feature = "fastembed")]
        EmbeddingProvider::Fastembed => Ok(Arc::new(local::FastEmbedder::from_model_str(
            &settings.model,
            paths.model_cache_dir.clone(),
        )?)),
        #[cfg(not(feature = "fastembed"))]
        EmbeddingProvider::Fastembed => {
            let _ = paths;
            Err(ApiError::BadRequest(
                "embedding.provider 'fastembed' needs the `fastembed` cargo feature".to_string(),
            ))
        }
    }
}

/// Feature-hashing bag-of-words embedder.
///
/// Lower-cased alphanumeric tokens are hashed (FNV-1a) into `dimension`
/// buckets and the vector is L2-normalised, so texts sharing words score a
/// positive cosine similarity and disjoint texts score zero.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    name: String,
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            name: format!("hash-{}", dimension),
            dimension,
        }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
        {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            // top bit picks the sign so bucket collisions tend to cancel
            let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Client for OpenAI-compatible `/v1/embeddings` endpoints (LM Studio,
/// Ollama, text-embeddings-inference, ...).
#[derive(Clone)]
pub struct HttpEmbedder {
    base_url: String,
    model: String,
    dimension: usize,
    api_key: Option<String>,
    client: Client,
}

impl HttpEmbedder {
    pub fn new(
        base_url: String,
        model: String,
        dimension: usize,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::internal)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            dimension,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": texts,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }

        let res = request.send().await.map_err(|e| {
            ApiError::Upstream(format!("Embedding request to {} failed: {}", url, e))
        })?;
        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "Embedding request failed ({}): {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::internal)?;
        parse_embeddings_payload(&payload, texts.len())
    }
}

fn parse_embeddings_payload(payload: &Value, expected: usize) -> Result<Vec<Vec<f32>>, ApiError> {
    let data = payload["data"]
        .as_array()
        .ok_or_else(|| ApiError::Upstream("Embedding response has no data array".to_string()))?;

    let mut indexed: Vec<(usize, Vec<f32>)> = data
        .iter()
        .enumerate()
        .filter_map(|(position, item)| {
            let values = item["embedding"].as_array()?;
            let index = item["index"].as_u64().map(|i| i as usize).unwrap_or(position);
            let vector = values
                .iter()
                .filter_map(|v| v.as_f64().map(|f| f as f32))
                .collect();
            Some((index, vector))
        })
        .collect();
    indexed.sort_by_key(|(index, _)| *index);

    if indexed.len() != expected {
        return Err(ApiError::Upstream(format!(
            "Expected {} embeddings, got {}",
            expected,
            indexed.len()
        )));
    }

    Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}

#[cfg(feature = "fastembed")]
mod local {
    use std::path::PathBuf;
    use std::sync::Arc;

    use async_trait::async_trait;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use tokio::sync::OnceCell;

    use super::Embedder;
    use crate::core::errors::ApiError;

    /// Local sentence-transformer embeddings through ONNX Runtime.
    ///
    /// The model is downloaded and loaded on first use and shared afterwards.
    pub struct FastEmbedder {
        name: String,
        model_id: EmbeddingModel,
        dimension: usize,
        cache_dir: PathBuf,
        model: OnceCell<Arc<TextEmbedding>>,
    }

    impl FastEmbedder {
        pub fn from_model_str(name: &str, cache_dir: PathBuf) -> Result<Self, ApiError> {
            let (model_id, dimension) = match name {
                "all-MiniLM-L6-v2" => (EmbeddingModel::AllMiniLML6V2, 384),
                "all-MiniLM-L12-v2" => (EmbeddingModel::AllMiniLML12V2, 384),
                "bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384),
                "bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 768),
                "nomic-embed-text-v1.5" => (EmbeddingModel::NomicEmbedTextV15, 768),
                _ => {
                    return Err(ApiError::BadRequest(format!(
                        "Unknown embedding model '{}'",
                        name
                    )))
                }
            };

            Ok(Self {
                name: name.to_string(),
                model_id,
                dimension,
                cache_dir,
                model: OnceCell::new(),
            })
        }

        async fn model(&self) -> Result<Arc<TextEmbedding>, ApiError> {
            self.model
                .get_or_try_init(|| async {
                    tracing::info!(model = %self.name, "Loading embedding model");
                    let options = InitOptions::new(self.model_id.clone())
                        .with_cache_dir(self.cache_dir.clone())
                        .with_show_download_progress(false);
                    let model = tokio::task::spawn_blocking(move || TextEmbedding::try_new(options))
                        .await
                        .map_err(ApiError::internal)?
                        .map_err(|e| {
                            ApiError::Internal(format!("Failed to load embedding model: {}", e))
                        })?;
                    Ok::<_, ApiError>(Arc::new(model))
                })
                .await
                .cloned()
        }
    }

    #[async_trait]
    impl Embedder for FastEmbedder {
        fn model_name(&self) -> &str {
            &self.name
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            let model = self.model().await?;
            let texts = texts.to_vec();
            tokio::task::spawn_blocking(move || model.embed(texts, None))
                .await
                .map_err(ApiError::internal)?
                .map_err(|e| ApiError::Internal(format!("Embedding failed: {}", e)))
        }
    }
}
