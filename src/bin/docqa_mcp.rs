//! MCP server entrypoint (stdio transport).
//!
//! Serves docqa's tools and resources over stdio for editor and agent integrations. Logs go to
//! the log file only, since stdout carries the protocol. Configuration is shared with the HTTP
//! binary.
use anyhow::{Context, Result};
use docqa::{config::Config, logging, mcp::DocQaMcpServer, pipeline::RagPipeline};
use rmcp::{service::ServiceExt, transport::stdio};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    logging::init_file_tracing();

    let pipeline = Arc::new(RagPipeline::from_config(&config).await?);
    let server = DocQaMcpServer::new(pipeline);

    let service = server
        .serve(stdio())
        .await
        .context("failed to start MCP server over stdio")?;

    service
        .waiting()
        .await
        .context("MCP server terminated unexpectedly")?;

    Ok(())
}
