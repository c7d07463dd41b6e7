//! MCP surface of the bridge.
//!
//! [`Bridge`] is built once from a command tree and a rule list: walk, build
//! definitions, register. After that it only answers "list tools" and
//! "call tool". [`server::BridgeServer`] puts it behind rmcp.

pub mod server;

use std::sync::Arc;

use rmcp::ErrorData as McpError;
use rmcp::model::{CallToolResult, Content, JsonObject, Tool};
use tokio_util::sync::CancellationToken;

use crate::error::BridgeError;
use crate::execute::{ExecutionRequest, ExecutionResult, Executor};
use crate::registry::ToolRegistry;
use crate::schema::{ToolDefinition, build_tool_definition};
use crate::selection::SelectionRule;
use crate::tree::CommandTree;
use crate::walker::walk;

pub use server::{BridgeServer, serve_stdio};

pub struct Bridge {
    executor: Executor,
    root_name: String,
}

impl Bridge {
    /// Build the bridge. An empty rule list selects every runnable node.
    ///
    /// Fails on duplicate or malformed tool names; nothing is served then.
    pub fn new(tree: CommandTree, rules: &[SelectionRule]) -> Result<Self, BridgeError> {
        let fallback;
        let rules = if rules.is_empty() {
            fallback = [SelectionRule::allow_all()];
            &fallback[..]
        } else {
            rules
        };

        let tree = Arc::new(tree);
        let selected = tree.with_root(|root| walk(root, rules));
        let defs = selected
            .iter()
            .map(build_tool_definition)
            .collect::<Result<Vec<_>, _>>()?;
        let registry = ToolRegistry::register(defs)?;
        tracing::info!(
            root = tree.root_name(),
            tools = registry.len(),
            "bridge ready"
        );

        Ok(Bridge {
            root_name: tree.root_name().to_string(),
            executor: Executor::new(tree, Arc::new(registry)),
        })
    }

    /// Name of the wrapped application (root command).
    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    pub fn registry(&self) -> &ToolRegistry {
        self.executor.registry()
    }

    /// Registered tools as protocol descriptors, in registration order.
    pub fn tools(&self) -> Vec<Tool> {
        self.registry().list().iter().map(to_tool).collect()
    }

    /// Run one tool call.
    ///
    /// Request faults (unknown tool, bad arguments) are protocol errors; a
    /// command that ran and failed is an error-flagged result.
    pub async fn call(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
        cancel: CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        let request = ExecutionRequest::new(name, arguments.unwrap_or_default());
        match self.executor.execute(request, cancel).await {
            Ok(result) => Ok(to_call_result(result)),
            Err(e) if e.is_request_error() => {
                tracing::warn!(tool = name, error = %e, "rejected tool call");
                Err(McpError::invalid_params(e.to_string(), None))
            }
            Err(e) => {
                tracing::error!(tool = name, error = %e, "tool call failed inside the bridge");
                Err(McpError::internal_error(e.to_string(), None))
            }
        }
    }
}

fn to_tool(def: &ToolDefinition) -> Tool {
    Tool::new(
        def.name.clone(),
        def.description.clone(),
        Arc::new(def.input_schema()),
    )
}

fn to_call_result(result: ExecutionResult) -> CallToolResult {
    if result.success {
        CallToolResult::success(vec![Content::text(result.output)])
    } else {
        CallToolResult::error(vec![Content::text(result.output)])
    }
}
