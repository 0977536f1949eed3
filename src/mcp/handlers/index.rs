//! MCP handler for the `index` tool.

use std::{path::PathBuf, sync::Arc};

use crate::pipeline::PipelineApi;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, JsonObject},
};
use serde::Deserialize;
use serde_json::json;

use super::{map_index_error, parse_arguments};

/// Request payload accepted by the `index` tool.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct IndexToolRequest {
    /// Directory to index instead of the configured one.
    #[serde(default)]
    pub(crate) source_dir: Option<PathBuf>,
}

/// Handle the `index` tool by rebuilding the vector index from the PDF directory.
pub(crate) async fn handle_index(
    pipeline: &Arc<dyn PipelineApi>,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: IndexToolRequest = parse_arguments(arguments)?;
    let outcome = pipeline
        .index(args.source_dir)
        .await
        .map_err(map_index_error)?;

    Ok(CallToolResult::structured(json!({
        "status": "ok",
        "chunkCount": outcome.chunk_count,
        "documents": outcome.documents,
        "pages": outcome.pages,
        "dimension": outcome.dimension,
    })))
}
