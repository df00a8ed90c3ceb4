//! Inference collaborator: turns a rendered prompt into answer text.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::embedding::{API_KEY_ENV, API_KEY_HEADER};
use crate::error::{Error, Result};

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Chat completion via the Gemini `generateContent` endpoint.
pub struct GeminiGenerator {
    model: String,
    temperature: f32,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| Error::Generation(format!("{} environment variable not set", API_KEY_ENV)))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &GenerationConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Generation(e.to_string()))?;
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": self.temperature },
        });

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!("Gemini API error {}: {}", status, text)));
        }
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;
        parse_generate_response(&json)
    }
}

/// Concatenate the text parts of the first candidate.
fn parse_generate_response(json: &serde_json::Value) -> Result<String> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| Error::Generation("invalid response: no candidate content".to_string()))?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    if text.is_empty() {
        return Err(Error::Generation("invalid response: empty candidate".to_string()));
    }
    Ok(text)
}

/// Returns the prompt unchanged. Offline runs and tests.
pub struct EchoGenerator;

#[async_trait]
impl Generator for EchoGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        Ok(prompt.to_string())
    }
}

pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiGenerator::new(config)?)),
        "echo" => Ok(Arc::new(EchoGenerator)),
        other => Err(Error::Generation(format!("unknown generation provider: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generate_response() {
        let json = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "YES. " }, { "text": "Reg 14." }] } }]
        });
        assert_eq!(parse_generate_response(&json).unwrap(), "YES. Reg 14.");
    }

    #[test]
    fn test_parse_generate_response_blocked() {
        let json = serde_json::json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        assert!(matches!(parse_generate_response(&json), Err(Error::Generation(_))));
    }

    #[tokio::test]
    async fn test_gemini_error_does_not_leak_api_key() {
        let config = GenerationConfig {
            base_url: "http://127.0.0.1:9/v1beta".to_string(),
            timeout_secs: 5,
            ..Default::default()
        };
        let g = GeminiGenerator::with_api_key(&config, "SECRET_KEY_12345".to_string()).unwrap();
        let err = g.generate("Can we discharge oil?").await.unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
        assert!(!err.to_string().contains("SECRET_KEY_12345"), "{}", err);
    }

    #[tokio::test]
    async fn test_echo() {
        assert_eq!(EchoGenerator.generate("hi").await.unwrap(), "hi");
    }
}
