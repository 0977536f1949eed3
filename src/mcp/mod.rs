//! Model Context Protocol (MCP) integration for docqa.
//!
//! This module exposes the question-answering pipeline to editors and agent hosts over stdio.
//! The surface area consists of:
//!
//! - Tools: `status`, `index`, `query`, `documents`, and `metrics`.
//! - Resources: `mcp://settings` (chunking and retrieval defaults) and `mcp://prompt` (the
//!   grounded answer template and its version).
//!
//! Handlers, schemas, and formatting helpers live in focused submodules.

mod format;
pub mod handlers;
mod registry;
mod schemas;
mod server;

pub use server::DocQaMcpServer;
