// ABOUTME: MCP server face of the broker, served over stdio with rmcp.
// ABOUTME: Lists the five tools with their input schemas and routes calls to Broker.

use super::Broker;
use super::tools::{
    TOOL_DISCONNECT, TOOL_EXEC, TOOL_GET_CONFIG, TOOL_RELOAD_CONFIG, TOOL_STATUS, ToolResponse,
};
use crate::ssh::Connector;
use rmcp::ServerHandler;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, ErrorData, Implementation, JsonObject,
    ListToolsResult, PaginatedRequestParams, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::{RequestContext, RoleServer};
use serde_json::json;
use std::sync::Arc;

fn schema(value: serde_json::Value) -> Arc<JsonObject> {
    Arc::new(value.as_object().cloned().unwrap_or_default())
}

fn no_arguments() -> Arc<JsonObject> {
    schema(json!({"type": "object", "properties": {}}))
}

/// Tool listing advertised to MCP clients.
pub fn tool_definitions() -> Vec<Tool> {
    vec![
        Tool::new(
            TOOL_EXEC,
            "Run an allow-listed command on a server through the SSH gateway",
            schema(json!({
                "type": "object",
                "properties": {
                    "host": {"type": "string", "description": "Target server hostname"},
                    "user": {"type": "string", "description": "Login user on the target server"},
                    "command": {"type": "string", "description": "Command line to execute"}
                },
                "required": ["host", "user", "command"]
            })),
        ),
        Tool::new(
            TOOL_DISCONNECT,
            "Close the gateway connection",
            no_arguments(),
        ),
        Tool::new(
            TOOL_STATUS,
            "Show gateway connection and Kerberos status",
            no_arguments(),
        ),
        Tool::new(
            TOOL_GET_CONFIG,
            "Show allowed hosts, allowed commands and server information",
            no_arguments(),
        ),
        Tool::new(
            TOOL_RELOAD_CONFIG,
            "Reload configuration from its source",
            no_arguments(),
        ),
    ]
}

impl From<ToolResponse> for CallToolResult {
    fn from(response: ToolResponse) -> Self {
        let content = vec![Content::text(response.text)];
        if response.is_error {
            CallToolResult::error(content)
        } else {
            CallToolResult::success(content)
        }
    }
}

impl<K: Connector> ServerHandler for Broker<K> {
    fn get_info(&self) -> ServerInfo {
        let mut server_info = Implementation::from_build_env();
        server_info.name = env!("CARGO_PKG_NAME").into();
        server_info.version = env!("CARGO_PKG_VERSION").into();

        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info,
            instructions: Some(
                "Runs allow-listed commands on servers reachable through one SSH gateway."
                    .to_string(),
            ),
            ..Default::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, ErrorData>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult::with_all_items(tool_definitions())))
    }

    // rmcp handles each request on its own task, so a slow exec does not
    // hold up status or disconnect calls.
    fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, ErrorData>> + Send + '_ {
        async move {
            let response = self.call(&request.name, request.arguments).await;
            Ok(response.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::RawContent;

    fn text(result: &CallToolResult) -> &str {
        match &result.content[0].raw {
            RawContent::Text(t) => t.text.as_str(),
            _ => "",
        }
    }

    #[test]
    fn every_tool_is_listed_once() {
        let names: Vec<String> = tool_definitions()
            .iter()
            .map(|t| t.name.to_string())
            .collect();
        assert_eq!(names, crate::broker::TOOL_NAMES);
    }

    #[test]
    fn exec_schema_requires_all_fields() {
        let tools = tool_definitions();
        let exec = tools.iter().find(|t| t.name == TOOL_EXEC).unwrap();
        assert_eq!(
            exec.input_schema.get("required"),
            Some(&json!(["host", "user", "command"]))
        );
    }

    #[test]
    fn error_response_sets_is_error() {
        let result = CallToolResult::from(ToolResponse::error("boom"));
        assert_eq!(result.is_error, Some(true));
        assert_eq!(text(&result), "boom");

        let result = CallToolResult::from(ToolResponse::ok("fine"));
        assert_eq!(result.is_error, Some(false));
    }
}
