//!
//! Strong-typed UUID identifiers for all domain entities.

define_id!(TaskId, "Strong typed identifier for a conversation task");
define_id!(
    CollectionId,
    "Strong typed identifier for a vector store collection"
);
define_id!(ChunkId, "Strong typed identifier for a conversation chunk");
define_id!(
    OperationId,
    "Strong typed identifier for an indexing operation"
);
