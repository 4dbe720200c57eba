//!
//! **Documentation**: [docs/modules/server.md](../../../docs/modules/server.md)
//!
//! The stdio JSON-RPC / MCP tool surface over [`convocore_application::ToolGateway`].
//! Every tool call is shaped into a JSON `{ok, data, error?, warnings?}`
//! envelope before being wrapped in an MCP [`CallToolResult`]; the gateway
//! itself already guarantees no handler panics the process.

pub mod args;

use std::borrow::Cow;
use std::sync::Arc;

use convocore_application::ToolGateway;
use convocore_application::gateway::{
    GetTaskTreeRequest, IndexTaskSemanticRequest, ListConversationsRequest, RebuildSkeletonCacheRequest,
    SearchTasksSemanticRequest, ViewTaskDetailsRequest,
};
use rmcp::ErrorData as McpError;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
    ServerCapabilities, ServerInfo, Tool,
};
use rmcp::{ServerHandler, tool};
use serde::Serialize;

use args::{
    DetectStorageArgs, GetStorageStatsArgs, GetTaskTreeArgs, IndexTaskSemanticArgs, ListConversationsArgs,
    RebuildSkeletonCacheArgs, SearchTasksSemanticArgs, ViewTaskDetailsArgs,
};

fn envelope<T: Serialize>(result: convocore_application::gateway::ToolResult<T>) -> Result<CallToolResult, McpError> {
    let is_error = !result.ok;
    let json = serde_json::to_string(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(if is_error {
        CallToolResult::error(vec![Content::text(json)])
    } else {
        CallToolResult::success(vec![Content::text(json)])
    })
}

fn schema_for<T: schemars::JsonSchema>(name: &str) -> Result<Arc<serde_json::Map<String, serde_json::Value>>, McpError> {
    let value = serde_json::to_value(schemars::schema_for!(T)).map_err(|e| McpError::internal_error(e.to_string(), None))?;
    let object = value
        .as_object()
        .ok_or_else(|| McpError::internal_error(format!("schema for {name} is not an object"), None))?
        .clone();
    Ok(Arc::new(object))
}

/// The MCP server process: one [`ToolGateway`] wired to stdio transport.
#[derive(Clone)]
pub struct ConvocoreServer {
    gateway: Arc<ToolGateway>,
}

impl ConvocoreServer {
    /// Wraps an already-constructed gateway for MCP dispatch.
    #[must_use]
    pub fn new(gateway: Arc<ToolGateway>) -> Self {
        Self { gateway }
    }
}

impl ConvocoreServer {
    /// Locates the host extension's storage roots.
    #[tool(description = "Locate the host extension's conversation-state storage roots")]
    pub async fn detect_storage(&self, _parameters: Parameters<DetectStorageArgs>) -> Result<CallToolResult, McpError> {
        envelope(self.gateway.detect_storage().await)
    }

    /// Aggregates conversation counts and sizes across every storage root.
    #[tool(description = "Aggregate conversation counts and sizes across every storage root")]
    pub async fn get_storage_stats(&self, _parameters: Parameters<GetStorageStatsArgs>) -> Result<CallToolResult, McpError> {
        envelope(self.gateway.get_storage_stats().await)
    }

    /// Lists conversations, paginated and optionally filtered by workspace.
    #[tool(description = "List conversations, paginated and optionally filtered by workspace")]
    pub async fn list_conversations(&self, parameters: Parameters<ListConversationsArgs>) -> Result<CallToolResult, McpError> {
        let request: ListConversationsRequest = parameters.0.into();
        envelope(self.gateway.list_conversations(request).await)
    }

    /// Returns the hierarchy rooted at one task.
    #[tool(description = "Return the reconstructed task hierarchy rooted at one task")]
    pub async fn get_task_tree(&self, parameters: Parameters<GetTaskTreeArgs>) -> Result<CallToolResult, McpError> {
        let request: GetTaskTreeRequest = parameters.0.into();
        envelope(self.gateway.get_task_tree(request).await)
    }

    /// Returns one conversation's full skeleton.
    #[tool(description = "Return one conversation's full skeleton fields")]
    pub async fn view_task_details(&self, parameters: Parameters<ViewTaskDetailsArgs>) -> Result<CallToolResult, McpError> {
        let request: ViewTaskDetailsRequest = parameters.0.into();
        envelope(self.gateway.view_task_details(request).await)
    }

    /// Forces or schedules a differential rebuild of the skeleton cache.
    #[tool(description = "Force or schedule a differential rebuild of the skeleton cache")]
    pub async fn rebuild_skeleton_cache(
        &self,
        parameters: Parameters<RebuildSkeletonCacheArgs>,
    ) -> Result<CallToolResult, McpError> {
        let request: RebuildSkeletonCacheRequest = parameters.0.into();
        envelope(self.gateway.rebuild_skeleton_cache(request).await)
    }

    /// Runs a k-NN semantic search over indexed conversations.
    #[tool(description = "Run a k-NN semantic search over indexed conversations")]
    pub async fn search_tasks_semantic(
        &self,
        parameters: Parameters<SearchTasksSemanticArgs>,
    ) -> Result<CallToolResult, McpError> {
        let request: SearchTasksSemanticRequest = parameters.0.into();
        envelope(self.gateway.search_tasks_semantic(request).await)
    }

    /// Explicitly (re)indexes one task, bypassing the scheduler's next tick.
    #[tool(description = "Explicitly (re)index one task, bypassing the scheduler's next tick")]
    pub async fn index_task_semantic(
        &self,
        parameters: Parameters<IndexTaskSemanticArgs>,
    ) -> Result<CallToolResult, McpError> {
        let request: IndexTaskSemanticRequest = parameters.0.into();
        envelope(self.gateway.index_task_semantic(request).await)
    }
}

impl ServerHandler for ConvocoreServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "convocore".to_owned(),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                ..Default::default()
            },
            instructions: Some(
                "Conversation-state manager for AI coding assistant task histories: \
                 discovers storage roots, maintains a skeleton cache, reconstructs the \
                 parent/child task hierarchy, and indexes task content for semantic \
                 search. Call `detect_storage`/`get_storage_stats` for an overview, \
                 `list_conversations`/`get_task_tree`/`view_task_details` to browse, \
                 `search_tasks_semantic` to search by meaning, and \
                 `rebuild_skeleton_cache`/`index_task_semantic` to force work ahead of \
                 the background scheduler's next tick."
                    .to_owned(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _pagination: Option<PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let tools = vec![
            Tool {
                name: Cow::Borrowed("detect_storage"),
                title: None,
                description: Some(Cow::Borrowed("Locate the host extension's conversation-state storage roots")),
                input_schema: schema_for::<DetectStorageArgs>("detect_storage")?,
                output_schema: None,
                annotations: None,
                icons: None,
                meta: Default::default(),
            },
            Tool {
                name: Cow::Borrowed("get_storage_stats"),
                title: None,
                description: Some(Cow::Borrowed("Aggregate conversation counts and sizes across every storage root")),
                input_schema: schema_for::<GetStorageStatsArgs>("get_storage_stats")?,
                output_schema: None,
                annotations: None,
                icons: None,
                meta: Default::default(),
            },
            Tool {
                name: Cow::Borrowed("list_conversations"),
                title: None,
                description: Some(Cow::Borrowed("List conversations, paginated and optionally filtered by workspace")),
                input_schema: schema_for::<ListConversationsArgs>("list_conversations")?,
                output_schema: None,
                annotations: None,
                icons: None,
                meta: Default::default(),
            },
            Tool {
                name: Cow::Borrowed("get_task_tree"),
                title: None,
                description: Some(Cow::Borrowed("Return the reconstructed task hierarchy rooted at one task")),
                input_schema: schema_for::<GetTaskTreeArgs>("get_task_tree")?,
                output_schema: None,
                annotations: None,
                icons: None,
                meta: Default::default(),
            },
            Tool {
                name: Cow::Borrowed("view_task_details"),
                title: None,
                description: Some(Cow::Borrowed("Return one conversation's full skeleton fields")),
                input_schema: schema_for::<ViewTaskDetailsArgs>("view_task_details")?,
                output_schema: None,
                annotations: None,
                icons: None,
                meta: Default::default(),
            },
            Tool {
                name: Cow::Borrowed("rebuild_skeleton_cache"),
                title: None,
                description: Some(Cow::Borrowed("Force or schedule a differential rebuild of the skeleton cache")),
                input_schema: schema_for::<RebuildSkeletonCacheArgs>("rebuild_skeleton_cache")?,
                output_schema: None,
                annotations: None,
                icons: None,
                meta: Default::default(),
            },
            Tool {
                name: Cow::Borrowed("search_tasks_semantic"),
                title: None,
                description: Some(Cow::Borrowed("Run a k-NN semantic search over indexed conversations")),
                input_schema: schema_for::<SearchTasksSemanticArgs>("search_tasks_semantic")?,
                output_schema: None,
                annotations: None,
                icons: None,
                meta: Default::default(),
            },
            Tool {
                name: Cow::Borrowed("index_task_semantic"),
                title: None,
                description: Some(Cow::Borrowed("Explicitly (re)index one task, bypassing the scheduler's next tick")),
                input_schema: schema_for::<IndexTaskSemanticArgs>("index_task_semantic")?,
                output_schema: None,
                annotations: None,
                icons: None,
                meta: Default::default(),
            },
        ];

        Ok(ListToolsResult {
            tools,
            meta: Default::default(),
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        request: rmcp::model::CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let arguments = serde_json::Value::Object(request.arguments.unwrap_or_default());
        macro_rules! dispatch {
            ($args_ty:ty, $method:ident) => {{
                let args: $args_ty = serde_json::from_value(arguments)
                    .map_err(|e| McpError::invalid_params(format!("invalid arguments: {e}"), None))?;
                self.$method(Parameters(args)).await
            }};
        }

        match request.name.as_ref() {
            "detect_storage" => dispatch!(DetectStorageArgs, detect_storage),
            "get_storage_stats" => dispatch!(GetStorageStatsArgs, get_storage_stats),
            "list_conversations" => dispatch!(ListConversationsArgs, list_conversations),
            "get_task_tree" => dispatch!(GetTaskTreeArgs, get_task_tree),
            "view_task_details" => dispatch!(ViewTaskDetailsArgs, view_task_details),
            "rebuild_skeleton_cache" => dispatch!(RebuildSkeletonCacheArgs, rebuild_skeleton_cache),
            "search_tasks_semantic" => dispatch!(SearchTasksSemanticArgs, search_tasks_semantic),
            "index_task_semantic" => dispatch!(IndexTaskSemanticArgs, index_task_semantic),
            other => Err(McpError::invalid_params(format!("unknown tool: {other}"), None)),
        }
    }
}
