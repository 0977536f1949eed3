//! Handler for the metrics tool.

use std::sync::Arc;

use crate::pipeline::PipelineApi;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde_json::json;

/// Handle the `metrics` tool, returning the current pipeline counters.
pub(crate) async fn handle_metrics(
    pipeline: &Arc<dyn PipelineApi>,
) -> Result<CallToolResult, McpError> {
    let snapshot = pipeline.metrics_snapshot();
    Ok(CallToolResult::structured(json!({
        "indexRuns": snapshot.index_runs,
        "documentsIndexed": snapshot.documents_indexed,
        "chunksIndexed": snapshot.chunks_indexed,
        "lastIndexDurationMs": snapshot.last_index_duration_ms,
        "queriesServed": snapshot.queries_served,
        "degradedAnswers": snapshot.degraded_answers,
    })))
}
