//! Handlers for the read-only `status` and `documents` tools.

use std::sync::Arc;

use crate::pipeline::PipelineApi;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde_json::json;

pub(crate) async fn handle_status(
    pipeline: &Arc<dyn PipelineApi>,
) -> Result<CallToolResult, McpError> {
    let status = pipeline.status().await;
    let value = serde_json::to_value(&status)
        .map_err(|err| McpError::internal_error(err.to_string(), None))?;
    Ok(CallToolResult::structured(value))
}

/// List the PDFs currently present in the source directory.
pub(crate) async fn handle_list_documents(
    pipeline: &Arc<dyn PipelineApi>,
) -> Result<CallToolResult, McpError> {
    let documents = pipeline
        .list_documents()
        .await
        .map_err(|err| McpError::internal_error(err.to_string(), None))?;
    Ok(CallToolResult::structured(json!({
        "count": documents.len(),
        "documents": documents,
    })))
}
