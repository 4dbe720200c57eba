//!
//! Cross-crate utility modules for the conversation-state core.

/// ID generation, deterministic correlation (UUID v5), content hashing, and masking.
pub mod id;
/// Canonical path utilities — strict, no fallbacks.
pub mod path;
/// Redaction of sensitive values in Debug/Display.
pub mod sensitivity;
/// Canonical time utilities — strict, no fallbacks.
pub mod time;

pub use id::{compute_content_hash, compute_file_hash, correlate_id, mask_id};
pub use sensitivity::{REDACTED, Sensitive};
