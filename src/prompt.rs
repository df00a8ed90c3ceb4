//! Response modes, languages, and the prompt template table.
//!
//! Template selection is a lookup in [`TEMPLATES`], keyed by
//! `(mode, language)`. A `None` language matches any language, so
//! language-invariant modes need a single row. Adding a combination is a
//! new row, not a new branch.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Professional,
    Compliance,
    Penalty,
    Scenario,
    Simple,
}

impl Mode {
    pub const ALL: [Mode; 5] = [
        Mode::Professional,
        Mode::Compliance,
        Mode::Penalty,
        Mode::Scenario,
        Mode::Simple,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Professional => "professional",
            Mode::Compliance => "compliance",
            Mode::Penalty => "penalty",
            Mode::Scenario => "scenario",
            Mode::Simple => "simple",
        }
    }

    /// Resolve the mode from the question form's toggles.
    ///
    /// Precedence: compliance, penalty, scenario; otherwise a non-English
    /// language selects `simple`, and English stays `professional`.
    pub fn from_flags(compliance: bool, penalty: bool, scenario: bool, language: Language) -> Mode {
        if compliance {
            Mode::Compliance
        } else if penalty {
            Mode::Penalty
        } else if scenario {
            Mode::Scenario
        } else if language != Language::English {
            Mode::Simple
        } else {
            Mode::Professional
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown mode '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    English,
    #[serde(rename = "Simple English")]
    SimpleEnglish,
    Hindi,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::English, Language::SimpleEnglish, Language::Hindi];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::SimpleEnglish => "Simple English",
            Language::Hindi => "Hindi",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace(['-', '_'], " ");
        Language::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| format!("unknown language '{}'", s))
    }
}

const PROFESSIONAL: &str = "
Provide a precise professional compliance answer with regulation reference.

Context:
{context}

Question:
{question}

Answer:
";

const SIMPLE_ENGLISH: &str = "
Explain in simple English for a general audience, but also mention regulation numbers if possible.

Context:
{context}

Question:
{question}

Answer:
";

const HINDI: &str = "
उत्तर हिंदी में दें। नियम संख्या (Annex / Chapter / Regulation) भी बताएँ यदि संभव हो।
यदि उत्तर उपलब्ध नहीं है तो कहें: \"उत्तर संदर्भ में उपलब्ध नहीं है।\"

संदर्भ:
{context}

प्रश्न:
{question}

उत्तर:
";

const COMPLIANCE: &str = "
Answer YES or NO first. Then explain briefly with regulation reference (e.g., MARPOL Annex I Reg 14).
If the answer is not available, say \"Answer not available in the context\".

Context:
{context}

Question:
{question}

Answer:
";

const PENALTY: &str = "
Explain the possible penalties or consequences for non-compliance as per MARPOL or SOLAS.
Mention fines, detention, or other enforcement actions if available.

Context:
{context}

Question:
{question}

Answer:
";

const SCENARIO: &str = "
Answer as step-by-step guidance suitable for crew training. Use numbered points for clarity.

Context:
{context}

Question:
{question}

Answer:
";

/// `(mode, language or any, template)`. The first matching row wins.
pub const TEMPLATES: &[(Mode, Option<Language>, &str)] = &[
    (Mode::Compliance, None, COMPLIANCE),
    (Mode::Penalty, None, PENALTY),
    (Mode::Scenario, None, SCENARIO),
    (Mode::Professional, Some(Language::English), PROFESSIONAL),
    (Mode::Professional, Some(Language::SimpleEnglish), SIMPLE_ENGLISH),
    (Mode::Professional, Some(Language::Hindi), HINDI),
    (Mode::Simple, Some(Language::English), PROFESSIONAL),
    (Mode::Simple, Some(Language::SimpleEnglish), SIMPLE_ENGLISH),
    (Mode::Simple, Some(Language::Hindi), HINDI),
];

/// Template for `(mode, language)`. Every combination has a row.
pub fn template_for(mode: Mode, language: Language) -> &'static str {
    TEMPLATES
        .iter()
        .find(|(m, l, _)| *m == mode && l.map_or(true, |l| l == language))
        .map(|(_, _, t)| *t)
        .unwrap_or(PROFESSIONAL)
}

const PLACEHOLDERS: [&str; 2] = ["{context}", "{question}"];

/// Fill a template with the retrieved passages and the question.
///
/// Placeholders are substituted in a single pass over the template, so
/// braces inside passages or the question are copied through verbatim.
pub fn render(mode: Mode, language: Language, passages: &[&str], question: &str) -> String {
    let context = passages.join("\n\n");
    let mut rest = template_for(mode, language);
    let mut out = String::with_capacity(rest.len() + context.len() + question.len());
    loop {
        let next = PLACEHOLDERS
            .iter()
            .filter_map(|p| rest.find(p).map(|at| (at, *p)))
            .min_by_key(|(at, _)| *at);
        let Some((at, placeholder)) = next else {
            out.push_str(rest);
            return out;
        };
        out.push_str(&rest[..at]);
        out.push_str(if placeholder == "{context}" { context.as_str() } else { question });
        rest = &rest[at + placeholder.len()..];
    }
}
