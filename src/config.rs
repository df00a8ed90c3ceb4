//! TOML configuration.
//!
//! Every section has defaults matching the reference deployment, so an
//! empty file is a valid configuration. [`load_config`] validates the
//! values the core relies on before anything touches disk.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Root directory holding one `<name>_index` directory per document.
    #[serde(default = "default_custom_dir")]
    pub custom_dir: PathBuf,
    /// Directory of the shared/domain index.
    #[serde(default = "default_shared_dir")]
    pub shared_dir: PathBuf,
    /// Number of index versions kept on disk per location.
    #[serde(default = "default_retain_versions")]
    pub retain_versions: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            custom_dir: default_custom_dir(),
            shared_dir: default_shared_dir(),
            retain_versions: default_retain_versions(),
        }
    }
}

fn default_custom_dir() -> PathBuf {
    PathBuf::from("faiss_indexes")
}
fn default_shared_dir() -> PathBuf {
    PathBuf::from("marine_faiss_index")
}
fn default_retain_versions() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    3000
}
fn default_overlap_chars() -> usize {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    4
}

/// What `create_or_replace` does with an existing index when the caller
/// did not ask for a replace.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WhenPresent {
    /// Build, then atomically swap the new version in.
    #[default]
    Overwrite,
    /// Refuse with `IndexExists`.
    Reject,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LifecycleConfig {
    /// Default for `ingest`: delete any existing index before rebuilding.
    #[serde(default = "default_true")]
    pub replace_existing: bool,
    #[serde(default)]
    pub when_present: WhenPresent,
    /// Skip chunks whose text is already in the shared index when promoting.
    /// Off by default: repeated promotes accumulate duplicate chunks.
    #[serde(default)]
    pub merge_dedup: bool,
    #[serde(default = "default_uploaded_by")]
    pub uploaded_by: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            replace_existing: true,
            when_present: WhenPresent::default(),
            merge_dedup: false,
            uploaded_by: default_uploaded_by(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_uploaded_by() -> String {
    "admin".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct BootstrapConfig {
    #[serde(default = "default_seed_documents")]
    pub seed_documents: Vec<PathBuf>,
    /// Source label attached to every seed chunk.
    #[serde(default = "default_shared_label")]
    pub shared_label: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            seed_documents: default_seed_documents(),
            shared_label: default_shared_label(),
        }
    }
}

fn default_seed_documents() -> Vec<PathBuf> {
    vec![
        PathBuf::from("data/MARPOL.pdf"),
        PathBuf::from("data/SOLAS 2020.pdf"),
    ]
}
fn default_shared_label() -> String {
    "MARPOL_SOLAS".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            base_url: default_base_url(),
        }
    }
}

fn default_embedding_provider() -> String {
    "gemini".to_string()
}
fn default_embedding_model() -> String {
    "models/embedding-001".to_string()
}
fn default_dims() -> usize {
    768
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_generation_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            base_url: default_base_url(),
        }
    }
}

fn default_generation_provider() -> String {
    "gemini".to_string()
}
fn default_generation_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_temperature() -> f32 {
    0.3
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,
    #[serde(default = "default_metadata_path")]
    pub metadata_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            history_path: default_history_path(),
            metadata_path: default_metadata_path(),
        }
    }
}

fn default_history_path() -> PathBuf {
    PathBuf::from("data/chat_history.jsonl")
}
fn default_metadata_path() -> PathBuf {
    PathBuf::from("data/pdf_metadata.json")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.max_chars {
        anyhow::bail!("chunking.overlap_chars must be smaller than chunking.max_chars");
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if config.index.retain_versions < 2 {
        anyhow::bail!("index.retain_versions must be >= 2");
    }
    if config.index.custom_dir == config.index.shared_dir {
        anyhow::bail!("index.custom_dir and index.shared_dir must differ");
    }

    if config.bootstrap.shared_label.trim().is_empty() {
        anyhow::bail!("bootstrap.shared_label must not be empty");
    }

    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    match config.embedding.provider.as_str() {
        "gemini" | "hashing" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be gemini or hashing.",
            other
        ),
    }

    match config.generation.provider.as_str() {
        "gemini" | "echo" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be gemini or echo.",
            other
        ),
    }
    if !(0.0..=2.0).contains(&config.generation.temperature) {
        anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}
