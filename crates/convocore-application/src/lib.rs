//!
//! **Documentation**: [docs/modules/application.md](../../../docs/modules/application.md)
//!
//! Application layer: use cases orchestrating the conversation-state core
//! against [`convocore_domain`]'s port traits. No concrete provider
//! implementations live here — see `convocore-providers` for those.

pub mod conversation_parser;
pub mod gateway;
pub mod hierarchy_engine;
pub mod indexing_decision_service;
pub mod scheduler;
pub mod semantic_search;
pub mod skeleton_cache;
pub mod storage_locator;
pub mod vector_indexer;

pub use conversation_parser::ConversationParser;
pub use gateway::ToolGateway;
pub use hierarchy_engine::{HierarchyEngine, HierarchyEngineConfig, HierarchyStats};
pub use indexing_decision_service::{
    IndexingDecision, IndexingDecisionConfig, IndexingDecisionOutcome, IndexingDecisionService, IndexingReason,
};
pub use scheduler::{Scheduler, SchedulerHandle, TickStats};
pub use semantic_search::{SearchHit, SearchOutcome, SemanticSearch};
pub use skeleton_cache::{RebuildStats, SkeletonCache};
pub use storage_locator::StorageLocator;
pub use vector_indexer::{CircuitBreaker, IndexOutcome, VectorIndexer, VectorIndexerConfig};
