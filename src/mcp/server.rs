//! RAG MCP Server implementation

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::RagError;
use crate::rag::RagPipeline;
use crate::server::{run_bounded, ApiOk};

/// Parameters for rag_ask tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct AskParams {
    #[schemars(description = "Question about the indexed codebase")]
    pub question: String,
    #[schemars(description = "Number of passages to retrieve (default: configured topK)")]
    #[serde(default, rename = "topK")]
    pub top_k: Option<usize>,
}

/// Parameters for rag_index tool
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct IndexParams {
    #[schemars(description = "Drop the existing index before rebuilding")]
    #[serde(default)]
    pub force: bool,
}

/// Parameters for rag_eval tool
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct EvalParams {
    #[schemars(description = "Number of passages retrieved per question")]
    #[serde(default, rename = "topK")]
    pub top_k: Option<usize>,
}

#[derive(Clone)]
pub struct RagService {
    pipeline: Arc<RagPipeline>,
    request_timeout: Duration,
    tool_router: ToolRouter<Self>,
}

impl RagService {
    pub fn new(pipeline: Arc<RagPipeline>) -> Self {
        let request_timeout = pipeline.config().request_timeout;
        Self {
            pipeline,
            request_timeout,
            tool_router: Self::tool_router(),
        }
    }

    async fn call<T, F>(&self, op: F) -> Result<CallToolResult, McpError>
    where
        T: Serialize + Send + 'static,
        F: FnOnce(&RagPipeline) -> crate::error::Result<T> + Send + 'static,
    {
        let value = run_bounded(Arc::clone(&self.pipeline), self.request_timeout, op)
            .await
            .map_err(to_mcp_error)?;
        Ok(CallToolResult::success(vec![Content::text(tool_payload(value)?)]))
    }
}

/// Same `{"ok": true, ...}` envelope the HTTP routes answer with.
fn tool_payload<T: Serialize>(value: T) -> Result<String, McpError> {
    serde_json::to_string_pretty(&ApiOk::new(value))
        .map_err(|e| McpError::internal_error(format!("JSON serialization failed: {}", e), None))
}

fn to_mcp_error(err: RagError) -> McpError {
    match err {
        RagError::Validation(message) => McpError::invalid_params(message, None),
        other => McpError::internal_error(other.to_string(), None),
    }
}

#[tool_router]
impl RagService {
    #[tool(description = "Answer a question about the indexed codebase. Returns the synthesized answer and the retrieved passages with relative file paths and scores.")]
    async fn rag_ask(&self, params: Parameters<AskParams>) -> Result<CallToolResult, McpError> {
        let AskParams { question, top_k } = params.0;
        self.call(move |pipeline| pipeline.ask(&question, top_k)).await
    }

    #[tool(description = "Build the codebase index. Incremental unless force is set.")]
    async fn rag_index(&self, params: Parameters<IndexParams>) -> Result<CallToolResult, McpError> {
        let force = params.0.force;
        self.call(move |pipeline| pipeline.build_index(force)).await
    }

    #[tool(description = "Run the QA evaluation set and report retrieval hit rate, keyword recall and pass rate.")]
    async fn rag_eval(&self, params: Parameters<EvalParams>) -> Result<CallToolResult, McpError> {
        let top_k = params.0.top_k;
        self.call(move |pipeline| pipeline.run_evaluation(top_k)).await
    }
}

#[tool_handler]
impl ServerHandler for RagService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Codebase RAG MCP Server. Answers questions over an indexed source tree and evaluates retrieval quality.".to_string()
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Run the MCP server over stdio
pub async fn run_mcp_server(pipeline: Arc<RagPipeline>) -> Result<()> {
    use tokio::io::{stdin, stdout};

    info!("starting MCP server on stdio");
    let service = RagService::new(pipeline);
    let transport = (stdin(), stdout());
    let server = service.serve(transport).await?;
    server.waiting().await?;

    Ok(())
}
