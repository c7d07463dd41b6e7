//! rmcp server handler over a [`Bridge`].

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam,
    ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::transport::stdio;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler, ServiceExt};

use super::Bridge;

#[derive(Clone)]
pub struct BridgeServer {
    bridge: Arc<Bridge>,
}

impl BridgeServer {
    pub fn new(bridge: Bridge) -> Self {
        BridgeServer {
            bridge: Arc::new(bridge),
        }
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }
}

impl ServerHandler for BridgeServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Implementation::from_build_env()
            },
            instructions: Some(format!(
                "Each tool runs one `{root}` subcommand. Tool names are the command path \
                 joined with underscores; parameters are the command's flags, and `args` \
                 (when present) holds positional arguments in order.",
                root = self.bridge.root_name()
            )),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult::with_all_items(self.bridge.tools())))
    }

    fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            tracing::debug!(tool = %request.name, "call_tool");
            self.bridge
                .call(&request.name, request.arguments, context.ct.clone())
                .await
        }
    }
}

/// Serve `server` on stdin/stdout until the client disconnects.
pub async fn serve_stdio(server: BridgeServer) -> Result<()> {
    tracing::info!(
        tools = server.bridge().registry().len(),
        "serving MCP on stdio"
    );
    let service = server
        .serve(stdio())
        .await
        .context("failed to start MCP server on stdio")?;
    let reason = service
        .waiting()
        .await
        .context("MCP server task failed")?;
    tracing::info!(?reason, "MCP session ended");
    Ok(())
}
