//! Formatting helpers shared across MCP handlers and resources.

use crate::pipeline::PipelineSettings;
use crate::synthesis::{INSUFFICIENT_CONTEXT_ANSWER, PROMPT_TEMPLATE, PROMPT_VERSION};
use rmcp::model::ResourceContents;
use schemars::JsonSchema;
use serde::Serialize;

pub(crate) const APPLICATION_JSON: &str = "application/json";

/// Serialize a value to JSON, falling back to compact formatting on error.
pub(crate) fn serialize_json<T: Serialize>(value: &T, context_uri: &str) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|error| {
        tracing::warn!(uri = context_uri, %error, "Failed to serialize JSON prettily");
        serde_json::to_string(value).unwrap_or_else(|_| "{}".into())
    })
}

/// Build JSON resource contents for MCP resource responses.
pub(crate) fn json_resource_contents(uri: &str, text: String) -> ResourceContents {
    ResourceContents::TextResourceContents {
        uri: uri.to_string(),
        mime_type: Some(APPLICATION_JSON.into()),
        text,
        meta: None,
    }
}

/// Effective chunking and retrieval settings exposed via `mcp://settings`.
#[derive(Debug, Serialize, JsonSchema)]
pub(crate) struct SettingsSnapshot {
    /// Directory indexed when callers omit `source_dir`.
    pub(crate) source_dir: String,
    /// Chunking parameters.
    pub(crate) chunking: ChunkingSettingsSnapshot,
    /// Retrieval parameters.
    pub(crate) retrieval: RetrievalSettingsSnapshot,
}

/// Chunk window configuration.
#[derive(Debug, Serialize, JsonSchema)]
pub(crate) struct ChunkingSettingsSnapshot {
    /// Maximum chunk length in characters.
    pub(crate) chunk_size: usize,
    /// Characters shared between adjacent chunks.
    pub(crate) chunk_overlap: usize,
    /// Texts sent per embedding request.
    pub(crate) embedding_batch_size: usize,
}

/// Retrieval configuration.
#[derive(Debug, Serialize, JsonSchema)]
pub(crate) struct RetrievalSettingsSnapshot {
    /// Passages retrieved per question.
    pub(crate) top_k: usize,
    /// Passages scoring at or below this value are discarded.
    pub(crate) min_score: f32,
    /// Length of source previews in characters.
    pub(crate) preview_chars: usize,
}

impl From<&PipelineSettings> for SettingsSnapshot {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            source_dir: settings.source_dir.display().to_string(),
            chunking: ChunkingSettingsSnapshot {
                chunk_size: settings.chunk_size,
                chunk_overlap: settings.chunk_overlap,
                embedding_batch_size: settings.embedding_batch_size,
            },
            retrieval: RetrievalSettingsSnapshot {
                top_k: settings.top_k,
                min_score: settings.min_score,
                preview_chars: settings.preview_chars,
            },
        }
    }
}

/// Prompt manifest exposed via `mcp://prompt`.
#[derive(Debug, Serialize, JsonSchema)]
pub(crate) struct PromptSnapshot {
    /// Identifier bumped whenever the template wording changes.
    pub(crate) version: &'static str,
    /// Template with `{language}`, `{context}`, and `{question}` placeholders.
    pub(crate) template: &'static str,
    /// Answer returned when no passage is relevant.
    pub(crate) insufficient_context_answer: &'static str,
}

pub(crate) fn prompt_snapshot() -> PromptSnapshot {
    PromptSnapshot {
        version: PROMPT_VERSION,
        template: PROMPT_TEMPLATE,
        insufficient_context_answer: INSUFFICIENT_CONTEXT_ANSWER,
    }
}
