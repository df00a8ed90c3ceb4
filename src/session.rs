//! Per-session question context.
//!
//! Each interactive session carries its own selection, so two sessions
//! never see each other's document choice.

use uuid::Uuid;

use crate::models::IndexTarget;
use crate::prompt::{Language, Mode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub session_id: String,
    /// `None` means the shared index.
    pub selected_document: Option<String>,
    pub language: Language,
    pub mode: Mode,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    /// A fresh session on the shared index, English, professional mode.
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            selected_document: None,
            language: Language::English,
            mode: Mode::Professional,
        }
    }

    pub fn target(&self) -> IndexTarget {
        match &self.selected_document {
            Some(name) => IndexTarget::Document(name.clone()),
            None => IndexTarget::Shared,
        }
    }

    pub fn select_document(&mut self, name: Option<String>) {
        self.selected_document = name;
    }

    /// Set language and derive the mode from the question form's toggles.
    pub fn set_options(&mut self, language: Language, compliance: bool, penalty: bool, scenario: bool) {
        self.language = language;
        self.mode = Mode::from_flags(compliance, penalty, scenario, language);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sessions_are_independent() {
        let mut a = SessionContext::new();
        let b = SessionContext::new();
        a.select_document(Some("doc1".to_string()));
        assert_ne!(a.session_id, b.session_id);
        assert_eq!(a.target(), IndexTarget::Document("doc1".to_string()));
        assert_eq!(b.target(), IndexTarget::Shared);
    }

    #[test]
    fn test_set_options_derives_mode() {
        let mut s = SessionContext::new();
        s.set_options(Language::Hindi, false, false, false);
        assert_eq!(s.mode, Mode::Simple);
        s.set_options(Language::Hindi, false, true, false);
        assert_eq!(s.mode, Mode::Penalty);
        assert_eq!(s.language, Language::Hindi);
    }
}
