//! CLI command implementations.
//!
//! Each `run_*` function wires the configured collaborators, performs one
//! operation, and prints a human-readable report to stdout.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::bootstrap::{bootstrap_from_paths, BootstrapOutcome};
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::extract::{document_from_path, PdfExtractor};
use crate::generation::create_generator;
use crate::history::{HistoryStore, JsonlHistoryStore};
use crate::manager::IndexManager;
use crate::metadata::JsonMetadataStore;
use crate::models::{IndexTarget, SHARED_KEY};
use crate::prompt::Language;
use crate::retrieval::RetrievalPipeline;
use crate::session::SessionContext;

fn build_manager(config: &Config) -> Result<Arc<IndexManager>> {
    let embedder = create_embedder(&config.embedding)?;
    let metadata = Arc::new(JsonMetadataStore::new(&config.store.metadata_path));
    Ok(Arc::new(IndexManager::from_config(config, embedder, metadata)?))
}

pub async fn run_bootstrap(config: &Config) -> Result<()> {
    let manager = build_manager(config)?;
    let outcome = bootstrap_from_paths(
        &manager,
        &PdfExtractor,
        &config.bootstrap.seed_documents,
        &config.bootstrap.shared_label,
    )
    .await
    .context("Failed to bootstrap shared index")?;

    match outcome {
        BootstrapOutcome::AlreadyPresent => println!(
            "Shared index already present at {}.",
            config.index.shared_dir.display()
        ),
        BootstrapOutcome::Built { chunks, version } => println!(
            "Shared index built: {} chunks (version {}).",
            chunks, version
        ),
    }
    Ok(())
}

pub async fn run_ingest(config: &Config, paths: &[PathBuf], keep_existing: bool) -> Result<()> {
    if paths.is_empty() {
        bail!("No PDF files given.");
    }
    let manager = build_manager(config)?;
    let replace_existing = config.lifecycle.replace_existing && !keep_existing;

    for path in paths {
        let doc = document_from_path(&PdfExtractor, path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let summary = manager
            .ingest(&doc, replace_existing)
            .await
            .with_context(|| format!("Failed to index {}", doc.name))?;

        println!("{}", summary.name);
        println!("    pages: {}", summary.page_count);
        println!("    words: {}", summary.word_count);
        println!("    chunks: {}", summary.chunk_count);
        println!("    version: {}", summary.version);
        println!("    preview: {}", summary.preview.replace('\n', " "));
        println!();
    }
    Ok(())
}

pub async fn run_promote(config: &Config, name: &str) -> Result<()> {
    let manager = build_manager(config)?;
    let outcome = manager
        .promote_to_shared(name)
        .await
        .with_context(|| format!("Failed to promote '{}' into the shared index", name))?;
    println!(
        "Promoted {}: {} chunks appended, shared index now {} chunks (version {}).",
        name, outcome.appended, outcome.shared_chunks, outcome.version
    );
    Ok(())
}

pub async fn run_ask(
    config: &Config,
    question: &str,
    doc: Option<String>,
    language: &str,
    compliance: bool,
    penalty: bool,
    scenario: bool,
) -> Result<()> {
    if question.trim().is_empty() {
        bail!("Question is empty.");
    }
    let language: Language = language.parse().map_err(anyhow::Error::msg)?;

    let manager = build_manager(config)?;
    let generator = create_generator(&config.generation)?;
    let history = Arc::new(JsonlHistoryStore::new(&config.store.history_path));
    let pipeline = RetrievalPipeline::new(manager, generator, history, config.retrieval.top_k);

    let mut session = SessionContext::new();
    session.select_document(doc);
    session.set_options(language, compliance, penalty, scenario);

    let answer = pipeline.answer_in(&session, question).await?;
    println!("{}", answer.text.trim());
    println!();
    let sources: Vec<&str> = answer.sources.iter().map(String::as_str).collect();
    println!("Sources: {}", sources.join(", "));
    Ok(())
}

pub fn run_list(config: &Config) -> Result<()> {
    let manager = build_manager(config)?;
    let names = manager.list_documents()?;
    let shared = manager.load(&IndexTarget::Shared).map(|i| i.len());

    match shared {
        Ok(count) => println!("{} (shared): {} chunks", SHARED_KEY, count),
        Err(e) if e.is_not_found() => println!("{} (shared): not built", SHARED_KEY),
        Err(e) => println!("{} (shared): {}", SHARED_KEY, e),
    }
    if names.is_empty() {
        println!("No document indexes.");
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

pub async fn run_delete_all(config: &Config, yes: bool) -> Result<()> {
    if !yes {
        bail!("Refusing to delete every document index without --yes.");
    }
    let manager = build_manager(config)?;
    let removed = manager.delete_all().await?;
    println!("Deleted {} document indexes.", removed);
    Ok(())
}

pub async fn run_history(config: &Config, name: &str) -> Result<()> {
    let history = JsonlHistoryStore::new(&config.store.history_path);
    let records = history.for_document(name).await?;
    if records.is_empty() {
        println!("No history for {}.", name);
        return Ok(());
    }
    for (i, record) in records.iter().enumerate() {
        println!(
            "{}. [{}] ({}, {})",
            i + 1,
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.mode,
            record.language
        );
        println!("    Q: {}", record.question);
        println!("    A: {}", record.answer.trim());
        if !record.sources.is_empty() {
            println!("    sources: {}", record.sources.join(", "));
        }
        println!();
    }
    Ok(())
}
