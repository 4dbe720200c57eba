//! JSON-RPC argument shapes for every tool on the gateway, with the
//! `schemars` derive the MCP tool listing needs to advertise an input
//! schema to the client.

use schemars::JsonSchema;
use serde::Deserialize;

/// `detect_storage` takes no arguments.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct DetectStorageArgs {}

/// `get_storage_stats` takes no arguments.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct GetStorageStatsArgs {}

/// `list_conversations` arguments.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListConversationsArgs {
    /// Restrict results to this workspace path.
    pub workspace: Option<String>,
    /// Maximum number of results (default 50).
    pub limit: Option<usize>,
    /// Offset into the most-recently-active-first result set.
    pub offset: Option<usize>,
}

impl From<ListConversationsArgs> for convocore_application::gateway::ListConversationsRequest {
    fn from(args: ListConversationsArgs) -> Self {
        Self {
            workspace: args.workspace,
            limit: args.limit,
            offset: args.offset,
        }
    }
}

/// `get_task_tree` arguments.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetTaskTreeArgs {
    /// The root task's id.
    pub task_id: String,
}

impl From<GetTaskTreeArgs> for convocore_application::gateway::GetTaskTreeRequest {
    fn from(args: GetTaskTreeArgs) -> Self {
        Self { task_id: args.task_id }
    }
}

/// `view_task_details` arguments.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ViewTaskDetailsArgs {
    /// The task id to look up.
    pub task_id: String,
}

impl From<ViewTaskDetailsArgs> for convocore_application::gateway::ViewTaskDetailsRequest {
    fn from(args: ViewTaskDetailsArgs) -> Self {
        Self { task_id: args.task_id }
    }
}

/// `rebuild_skeleton_cache` arguments.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct RebuildSkeletonCacheArgs {
    /// Bypass the differential mtime check and rebuild every task directory.
    pub force: Option<bool>,
    /// Restrict the rebuild to task directories under this workspace.
    pub workspace: Option<String>,
}

impl From<RebuildSkeletonCacheArgs> for convocore_application::gateway::RebuildSkeletonCacheRequest {
    fn from(args: RebuildSkeletonCacheArgs) -> Self {
        Self {
            force: args.force,
            workspace: args.workspace,
        }
    }
}

/// `search_tasks_semantic` arguments.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchTasksSemanticArgs {
    /// Free-text query, embedded through the same model used at index time.
    pub query: String,
    /// Maximum number of hits (default 10).
    pub limit: Option<usize>,
    /// Restrict the search to one workspace.
    pub workspace: Option<String>,
}

impl From<SearchTasksSemanticArgs> for convocore_application::gateway::SearchTasksSemanticRequest {
    fn from(args: SearchTasksSemanticArgs) -> Self {
        Self {
            query: args.query,
            limit: args.limit,
            workspace: args.workspace,
        }
    }
}

/// `index_task_semantic` arguments.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct IndexTaskSemanticArgs {
    /// The task id to (re)index.
    pub task_id: String,
}

impl From<IndexTaskSemanticArgs> for convocore_application::gateway::IndexTaskSemanticRequest {
    fn from(args: IndexTaskSemanticArgs) -> Self {
        Self { task_id: args.task_id }
    }
}
