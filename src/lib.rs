//! # marinereg
//!
//! Retrieval-augmented question answering over maritime regulation PDFs
//! (MARPOL, SOLAS, and user uploads).
//!
//! Uploaded documents are chunked, embedded, and stored as per-document
//! vector indexes. A shared index seeded from the bundled regulations
//! answers general questions; a per-document index can be promoted into it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌──────────┐   ┌─────────────┐
//! │ Extract  │──▶│ Chunker │──▶│ Embedder │──▶│ VectorIndex │
//! │  (PDF)   │   └─────────┘   └──────────┘   │  (on disk)  │
//! └──────────┘                                └──────┬──────┘
//!                        IndexManager ───────────────┤
//!                                                    ▼
//!                 ┌───────────┐   prompt    ┌─────────────────┐
//!                 │ Generator │◀────────────│RetrievalPipeline│
//!                 └───────────┘             └─────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! mreg bootstrap                    # seed the shared index
//! mreg ingest ./circular.pdf        # index an uploaded PDF
//! mreg ask "Can we discharge oily water?" --compliance
//! mreg ask "What is in section 2?" --doc circular.pdf --language hindi
//! mreg promote circular.pdf         # merge it into the shared index
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`chunk`] | Boundary-aware text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`generation`] | Inference provider abstraction |
//! | [`extract`] | PDF text extraction |
//! | [`store`] | Versioned on-disk vector index |
//! | [`manager`] | Index lifecycle |
//! | [`bootstrap`] | Shared index seeding |
//! | [`prompt`] | Modes, languages, templates |
//! | [`retrieval`] | Question answering |
//! | [`history`] | Q&A history records |
//! | [`metadata`] | Per-document index records |
//! | [`session`] | Per-session selection |
//! | [`commands`] | CLI command implementations |

pub mod bootstrap;
pub mod chunk;
pub mod commands;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod history;
pub mod manager;
pub mod metadata;
pub mod models;
pub mod prompt;
pub mod retrieval;
pub mod session;
pub mod store;
