//! Question answering over one index.
//!
//! The pipeline loads the target index, runs a top-k similarity search,
//! renders the `(mode, language)` prompt with the retrieved passages, and
//! hands it to the [`Generator`]. Retrieval does not depend on the mode;
//! only the prompt does.
//!
//! Each answer is appended to the [`HistoryStore`]. That append is
//! best-effort: a failure is logged and the answer is still returned.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use crate::error::Result;
use crate::generation::Generator;
use crate::history::{HistoryStore, QaRecord};
use crate::manager::IndexManager;
use crate::models::IndexTarget;
use crate::prompt::{render, Language, Mode};
use crate::session::SessionContext;
use crate::store::SearchHit;

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    /// Distinct source labels among the retrieved chunks.
    pub sources: BTreeSet<String>,
    pub hits: Vec<SearchHit>,
}

pub struct RetrievalPipeline {
    manager: Arc<IndexManager>,
    generator: Arc<dyn Generator>,
    history: Arc<dyn HistoryStore>,
    top_k: usize,
}

impl RetrievalPipeline {
    pub fn new(
        manager: Arc<IndexManager>,
        generator: Arc<dyn Generator>,
        history: Arc<dyn HistoryStore>,
        top_k: usize,
    ) -> Self {
        Self {
            manager,
            generator,
            history,
            top_k,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Answer `question` against `target`.
    ///
    /// A missing index surfaces as [`Error::IndexNotFound`](crate::error::Error::IndexNotFound).
    pub async fn answer(
        &self,
        question: &str,
        target: &IndexTarget,
        mode: Mode,
        language: Language,
    ) -> Result<Answer> {
        let index = self.manager.load(target)?;
        let hits = index
            .similarity_search(self.manager.embedder(), question, self.top_k)
            .await?;

        let passages: Vec<&str> = hits.iter().map(|h| h.chunk.text.as_str()).collect();
        let prompt = render(mode, language, &passages, question);
        let text = self.generator.generate(&prompt).await?;
        let sources: BTreeSet<String> = hits.iter().map(|h| h.chunk.source.clone()).collect();

        tracing::info!(
            document = target.key(),
            mode = %mode,
            language = %language,
            hits = hits.len(),
            version = index.version(),
            "answered question"
        );

        let record = QaRecord {
            document: target.key().to_string(),
            question: question.to_string(),
            answer: text.clone(),
            mode: mode.to_string(),
            language: language.to_string(),
            sources: sources.iter().cloned().collect(),
            timestamp: Utc::now(),
        };
        if let Err(e) = self.history.append(record).await {
            tracing::warn!(document = target.key(), error = %e, "failed to record history");
        }

        Ok(Answer { text, sources, hits })
    }

    /// Answer using the session's selected index, mode and language.
    pub async fn answer_in(&self, session: &SessionContext, question: &str) -> Result<Answer> {
        self.answer(question, &session.target(), session.mode, session.language)
            .await
    }
}
