//! Tool handlers for the MCP server.

use rmcp::{ErrorData as McpError, model::JsonObject};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::pipeline::{IndexError, QueryError};

pub mod index;
pub mod metrics;
pub mod query;
pub mod status;

/// Parse structured arguments supplied to a tool invocation.
pub(crate) fn parse_arguments<T: DeserializeOwned>(
    arguments: Option<JsonObject>,
) -> Result<T, McpError> {
    let value = arguments
        .map(Value::Object)
        .unwrap_or_else(|| Value::Object(JsonObject::new()));
    serde_json::from_value(value)
        .map_err(|err| McpError::invalid_params(format!("Invalid arguments: {err}"), None))
}

/// Caller-correctable failures become `invalid_params`; everything else is internal.
pub(crate) fn map_index_error(error: IndexError) -> McpError {
    match error {
        IndexError::NoDocumentsFound(_) | IndexError::NoChunks => {
            McpError::invalid_params(error.to_string(), None)
        }
        other => McpError::internal_error(other.to_string(), None),
    }
}

pub(crate) fn map_query_error(error: QueryError) -> McpError {
    match error {
        QueryError::NotReady | QueryError::EmptyQuestion => {
            McpError::invalid_params(error.to_string(), None)
        }
        other => McpError::internal_error(other.to_string(), None),
    }
}
