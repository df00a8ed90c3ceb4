//! Embedding collaborator abstraction and implementations.
//!
//! Defines the [`Embedder`] trait consumed by the index store and two
//! concrete backends:
//! - **[`GeminiEmbedder`]**: calls the Google Generative Language
//!   `batchEmbedContents` endpoint with batching, retry, and backoff.
//! - **[`HashingEmbedder`]**: deterministic offline feature hashing, used
//!   by tests and air-gapped runs.
//!
//! Also provides the vector helpers the on-disk index format relies on:
//! [`cosine_similarity`], [`vec_to_blob`], and [`blob_to_vec`].
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// Environment variable holding the Google API key.
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Request header carrying the API key. Keys never go into URLs.
pub(crate) const API_KEY_HEADER: &str = "x-goog-api-key";

/// Maps text to fixed-dimension vectors.
///
/// All vectors produced by one embedder share [`dims`](Embedder::dims);
/// the index store rejects anything else.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier recorded in every index built with this embedder.
    fn model_name(&self) -> &str;
    fn dims(&self) -> usize;
    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single query text.
pub async fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    let results = embedder.embed(&[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| Error::Embedding("empty embedding response".to_string()))
}

/// Check that `vectors` holds `expected` non-empty vectors of one shared
/// dimensionality, and return that dimensionality.
pub fn check_vectors(vectors: &[Vec<f32>], expected: usize) -> Result<usize> {
    if vectors.len() != expected {
        return Err(Error::Embedding(format!(
            "expected {} vectors, got {}",
            expected,
            vectors.len()
        )));
    }
    let dims = vectors.first().map(|v| v.len()).unwrap_or(0);
    if expected > 0 && dims == 0 {
        return Err(Error::Embedding("received zero-length vector".to_string()));
    }
    if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dims) {
        return Err(Error::Embedding(format!(
            "dimension mismatch: vector {} has {} dims, expected {}",
            i,
            v.len(),
            dims
        )));
    }
    if vectors.iter().flatten().any(|x| !x.is_finite()) {
        return Err(Error::Embedding("vector contains non-finite values".to_string()));
    }
    Ok(dims)
}

// ============ Gemini ============

/// Embedder backed by the Google Generative Language API.
///
/// Requires the `GOOGLE_API_KEY` environment variable.
pub struct GeminiEmbedder {
    model: String,
    dims: usize,
    batch_size: usize,
    max_retries: u32,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| Error::Embedding(format!("{} environment variable not set", API_KEY_ENV)))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &EmbeddingConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Embedding(e.to_string()))?;
        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            batch_size: config.batch_size.clamp(1, 100),
            max_retries: config.max_retries,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let requests: Vec<serde_json::Value> = texts
            .iter()
            .map(|t| {
                serde_json::json!({
                    "model": self.model,
                    "content": { "parts": [{ "text": t }] },
                })
            })
            .collect();
        let body = serde_json::json!({ "requests": requests });
        let url = format!("{}/{}:batchEmbedContents", self.base_url, self.model);

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .header(API_KEY_HEADER, &self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| Error::Embedding(e.to_string()))?;
                        return parse_gemini_response(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        tracing::debug!(%status, attempt, "embedding request will be retried");
                        last_err = Some(Error::Embedding(format!(
                            "Gemini API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    return Err(Error::Embedding(format!(
                        "Gemini API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(Error::Embedding(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Embedding("embedding failed after retries".to_string())))
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            out.extend(self.embed_batch(batch).await?);
        }
        check_vectors(&out, texts.len())?;
        Ok(out)
    }
}

/// Extract `embeddings[].values` in order.
fn parse_gemini_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("embeddings")
        .and_then(|d| d.as_array())
        .ok_or_else(|| Error::Embedding("invalid response: missing embeddings array".to_string()))?;

    data.iter()
        .map(|item| {
            let values = item
                .get("values")
                .and_then(|e| e.as_array())
                .ok_or_else(|| Error::Embedding("invalid response: missing values".to_string()))?;
            values
                .iter()
                .map(|v| {
                    v.as_f64()
                        .map(|f| f as f32)
                        .ok_or_else(|| Error::Embedding("invalid response: non-numeric value".to_string()))
                })
                .collect()
        })
        .collect()
}

// ============ Hashing ============

/// Offline embedder: lowercase alphanumeric tokens hashed into `dims`
/// signed buckets, then L2-normalised.
///
/// Texts sharing words land close together, which is enough for
/// deterministic tests and keyword-ish retrieval without network access.
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        let lower = text.to_lowercase();
        for token in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let idx = (u64::from_le_bytes(bucket) % self.dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        "hashing"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Create the configured [`Embedder`].
///
/// | Config Value | Embedder |
/// |-------------|----------|
/// | `"gemini"` | [`GeminiEmbedder`] |
/// | `"hashing"` | [`HashingEmbedder`] |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiEmbedder::new(config)?)),
        "hashing" => Ok(Arc::new(HashingEmbedder::new(config.dims))),
        other => Err(Error::Embedding(format!("unknown embedding provider: {}", other))),
    }
}

/// Encode a float vector as little-endian f32 bytes.
///
/// # Example
///
/// ```rust
/// use marinereg::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode little-endian f32 bytes. Trailing bytes that do not form a
/// whole value are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`.
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or a
/// zero-norm input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
