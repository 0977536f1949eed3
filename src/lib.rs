#![deny(missing_docs)]

//! Core library for the docqa PDF question-answering service.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Source document directory management.
pub mod documents;
/// Paper catalog and downloader used to seed the source directory.
pub mod download;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Text generation client abstraction and adapters.
pub mod generation;
/// Persisted vector index.
pub mod index;
/// PDF discovery and page extraction.
pub mod loader;
/// Structured logging and tracing setup.
pub mod logging;
/// Model Context Protocol server implementation.
pub mod mcp;
/// Pipeline counters.
pub mod metrics;
/// Chunking, indexing, and query orchestration.
pub mod pipeline;
/// Grounded answer synthesis.
pub mod synthesis;
