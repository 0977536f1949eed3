//! MCP server bootstrap and request dispatch.

use std::{borrow::Cow, sync::Arc};

use crate::{
    mcp::{
        format::{SettingsSnapshot, json_resource_contents, prompt_snapshot, serialize_json},
        handlers::{
            index::handle_index,
            metrics::handle_metrics,
            query::handle_query,
            status::{handle_list_documents, handle_status},
        },
        registry, schemas,
    },
    pipeline::PipelineApi,
};
use rmcp::{
    ErrorData as McpError,
    handler::server::ServerHandler,
    model::{
        AnnotateAble, CallToolRequestParam, CallToolResult, ListResourcesResult, ListToolsResult,
        RawResource, ReadResourceRequestParam, ReadResourceResult, Resource, ServerCapabilities,
        ServerInfo, Tool, ToolAnnotations,
    },
};

const SETTINGS_URI: &str = "mcp://settings";
const PROMPT_URI: &str = "mcp://prompt";

/// MCP server exposing the question-answering pipeline.
#[derive(Clone)]
pub struct DocQaMcpServer {
    pipeline: Arc<dyn PipelineApi>,
    registry: Arc<registry::Registry>,
}

impl DocQaMcpServer {
    /// Create a new MCP server backed by `pipeline`.
    pub fn new(pipeline: Arc<dyn PipelineApi>) -> Self {
        let mut registry = registry::Registry::default();
        registry.register_resource(SETTINGS_URI, resource_settings);
        registry.register_resource(PROMPT_URI, resource_prompt);

        registry.register_tool("status", tool_status);
        registry.register_tool("index", tool_index);
        registry.register_tool("query", tool_query);
        registry.register_tool("documents", tool_documents);
        registry.register_tool("metrics", tool_metrics);

        Self {
            pipeline,
            registry: Arc::new(registry),
        }
    }

    pub(crate) fn describe_tools(&self) -> Vec<Tool> {
        vec![
            read_only_tool(
                "status",
                "Pipeline Status",
                "Check whether documents are indexed (READY) before asking questions.",
                schemas::empty_object_schema(),
            ),
            Tool {
                name: Cow::Borrowed("index"),
                title: Some("Index Documents".to_string()),
                description: Some(Cow::Borrowed(
                    "Load every PDF in the source directory, then chunk, embed, and replace the vector index. Queries keep using the previous index until the rebuild succeeds.",
                )),
                input_schema: Arc::new(schemas::index_input_schema()),
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Index Documents")
                        .destructive(true)
                        .idempotent(true)
                        .open_world(false),
                ),
                icons: None,
            },
            read_only_tool(
                "query",
                "Ask Documents",
                "Answer a question using only the indexed PDFs; returns the answer with cited source previews.",
                schemas::query_input_schema(),
            ),
            read_only_tool(
                "documents",
                "List Documents",
                "See which PDFs are present in the source directory.",
                schemas::empty_object_schema(),
            ),
            read_only_tool(
                "metrics",
                "Metrics Snapshot",
                "Check index size and query counters at a glance.",
                schemas::empty_object_schema(),
            ),
        ]
    }

    fn describe_resources(&self) -> Vec<Resource> {
        let mut settings = RawResource::new(SETTINGS_URI, "settings");
        settings.description = Some("Effective chunking and retrieval settings".into());

        let mut prompt = RawResource::new(PROMPT_URI, "prompt");
        prompt.description = Some("Grounded answer prompt template and version".into());

        vec![settings.no_annotation(), prompt.no_annotation()]
    }
}

fn read_only_tool(
    name: &'static str,
    title: &'static str,
    description: &'static str,
    schema: serde_json::Map<String, serde_json::Value>,
) -> Tool {
    Tool {
        name: Cow::Borrowed(name),
        title: Some(title.to_string()),
        description: Some(Cow::Borrowed(description)),
        input_schema: Arc::new(schema),
        output_schema: None,
        annotations: Some(
            ToolAnnotations::with_title(title)
                .read_only(true)
                .idempotent(true)
                .open_world(false),
        ),
        icons: None,
    }
}

fn resource_settings(
    server: &DocQaMcpServer,
    _request: ReadResourceRequestParam,
) -> registry::ResourceFuture {
    let payload = SettingsSnapshot::from(server.pipeline.settings());
    Box::pin(async move {
        Ok(ReadResourceResult {
            contents: vec![json_resource_contents(
                SETTINGS_URI,
                serialize_json(&payload, SETTINGS_URI),
            )],
        })
    })
}

fn resource_prompt(
    _server: &DocQaMcpServer,
    _request: ReadResourceRequestParam,
) -> registry::ResourceFuture {
    Box::pin(async move {
        Ok(ReadResourceResult {
            contents: vec![json_resource_contents(
                PROMPT_URI,
                serialize_json(&prompt_snapshot(), PROMPT_URI),
            )],
        })
    })
}

fn tool_status(server: &DocQaMcpServer, _request: CallToolRequestParam) -> registry::ToolFuture {
    let pipeline = server.pipeline.clone();
    Box::pin(async move { handle_status(&pipeline).await })
}

fn tool_index(server: &DocQaMcpServer, request: CallToolRequestParam) -> registry::ToolFuture {
    let pipeline = server.pipeline.clone();
    Box::pin(async move { handle_index(&pipeline, request.arguments).await })
}

fn tool_query(server: &DocQaMcpServer, request: CallToolRequestParam) -> registry::ToolFuture {
    let pipeline = server.pipeline.clone();
    Box::pin(async move { handle_query(&pipeline, request.arguments).await })
}

fn tool_documents(
    server: &DocQaMcpServer,
    _request: CallToolRequestParam,
) -> registry::ToolFuture {
    let pipeline = server.pipeline.clone();
    Box::pin(async move { handle_list_documents(&pipeline).await })
}

fn tool_metrics(server: &DocQaMcpServer, _request: CallToolRequestParam) -> registry::ToolFuture {
    let pipeline = server.pipeline.clone();
    Box::pin(async move { handle_metrics(&pipeline).await })
}

impl DocQaMcpServer {
    /// Dispatch a tool call through the registry.
    pub async fn dispatch_tool(
        &self,
        request: CallToolRequestParam,
    ) -> Result<CallToolResult, McpError> {
        match self.registry.tools.get(request.name.as_ref()) {
            Some(handler) => handler(self, request).await,
            None => Err(McpError::invalid_params(
                format!("Unknown tool: {}", request.name),
                None,
            )),
        }
    }

    /// Resolve a resource read through the registry.
    pub async fn dispatch_resource(
        &self,
        request: ReadResourceRequestParam,
    ) -> Result<ReadResourceResult, McpError> {
        match self.registry.resources.get(request.uri.as_str()) {
            Some(handler) => handler(self, request).await,
            None => Err(McpError::invalid_params(
                format!("Unknown resource URI: {}", request.uri),
                None,
            )),
        }
    }
}

impl ServerHandler for DocQaMcpServer {
    fn get_info(&self) -> ServerInfo {
        let mut implementation = rmcp::model::Implementation::from_build_env();
        implementation.name = "docqa".to_string();
        implementation.title = Some("DocQA MCP".to_string());
        implementation.version = env!("CARGO_PKG_VERSION").to_string();

        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_resources()
                .enable_tools()
                .build(),
            server_info: implementation,
            instructions: Some(
                "Answer questions about a local collection of PDF papers. Call `status` first; if the pipeline is UNINDEXED call `index`, then use `query` with a concise question. Answers cite numbered source passages.".into(),
            ),
            ..ServerInfo::default()
        }
    }

    fn list_resources(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        let resources = self.describe_resources();
        std::future::ready(Ok(ListResourcesResult::with_all_items(resources)))
    }

    fn list_tools(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools = self.describe_tools();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        self.dispatch_resource(request)
    }

    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        self.dispatch_tool(request)
    }
}
