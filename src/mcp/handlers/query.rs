//! MCP handler for the `query` tool.

use std::sync::Arc;

use crate::pipeline::PipelineApi;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, JsonObject},
};
use serde::Deserialize;

use super::{map_query_error, parse_arguments};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct QueryToolRequest {
    pub(crate) question: String,
}

/// Answer a question against the current index.
///
/// Language-model failures still produce a structured result carrying the retrieved sources and
/// an `error` field, matching the HTTP surface.
pub(crate) async fn handle_query(
    pipeline: &Arc<dyn PipelineApi>,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: QueryToolRequest = parse_arguments(arguments)?;
    let result = pipeline
        .query(&args.question)
        .await
        .map_err(map_query_error)?;

    let value = serde_json::to_value(&result)
        .map_err(|err| McpError::internal_error(err.to_string(), None))?;
    Ok(CallToolResult::structured(value))
}
