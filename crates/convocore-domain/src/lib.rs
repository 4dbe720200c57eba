//! # Domain Layer
//!
//! Core business logic and domain types for the conversation-state core.
//! Contains only pure entities, value objects, ports, and business rules —
//! no I/O, no async runtime, no knowledge of stdio/JSON-RPC or any concrete
//! storage/embedding/vector-store backend.
//!
//! ## Architecture
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`entities`] | Core business entities with identity |
//! | [`value_objects`] | Immutable value objects |
//! | [`ports`] | External provider and repository port interfaces |
//! | [`constants`] | Domain constants |
//! | [`error`] | Domain error types |
//! | [`events`] | Domain event types, published for observability |
//! | [`hierarchy`] | The shared instruction-normalization function |
//!
//! ## Clean Architecture Principles
//!
//! - **Entities** are at the center with business rules
//! - **Value Objects** are immutable and compared by value
//! - **No external dependencies** beyond serde/chrono/uuid — only standard
//!   library and core traits
//! - **Pure business logic** - no infrastructure or application concerns
//!
//! ## Example
//!
//! ```
//! use convocore_domain::normalize;
//! use convocore_domain::value_objects::TaskId;
//!
//! let a = TaskId::from_name("analyze the logs");
//! let b = TaskId::from_name(&normalize("  Analyze   the LOGS  "));
//! assert_ne!(a, b); // from_name is not itself normalization-aware
//! assert_eq!(normalize("Re: fix it"), normalize("fix it"));
//! ```

/// Common macros
#[macro_use]
pub mod macros;

/// Domain-level constants
pub mod constants;
/// Core business entities with identity
pub mod entities;
/// Domain error types
pub mod error;
/// Domain event interfaces
pub mod events;
/// The normalization function shared by both hierarchy-reconstruction passes
pub mod hierarchy;
/// External provider and repository port interfaces
pub mod ports;
/// Common utilities
pub mod utils;
/// Immutable value objects
pub mod value_objects;

// Re-export commonly used types for convenience
pub use constants::*;
pub use entities::*;
pub use error::{Error, Result};
pub use events::{DomainEvent, EventPublisher};
pub use hierarchy::normalize;
pub use utils::{compute_content_hash, compute_file_hash, correlate_id, mask_id};
pub use value_objects::*;
