//! ```text
//! URLs / upload ──► fetch ──► chunking ──► indexer ──► stores::sqlite
//!                                              │
//! question ──► retrieval ◄─────────────────────┘
//!                  │
//!                  ▼
//!             generation ──► answer / report ──► export
//!                  ▲
//!                  └── session (history, memory window, sources)
//! ```
//!
//! A retrieval-augmented research assistant: paste article URLs or upload a
//! text file, have the content fetched, chunked, and embedded into a
//! per-session vector index, then ask questions answered by a hosted
//! chat-completion model grounded in the retrieved context.
//!
//! [`pipeline::ResearchPipeline`] is the entry point; everything else is a
//! component it wires together.

pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod export;
pub mod fetch;
pub mod generation;
pub mod indexer;
pub mod message;
pub mod pipeline;
pub mod retrieval;
pub mod retry;
pub mod session;
pub mod stores;
pub mod types;
