//!
//! Domain layer constants definitions

/// Bounded length a `truncatedInstruction` is trimmed to when parsed.
pub const TRUNCATED_INSTRUCTION_MAX_LEN: usize = 500;

/// Bounded length a skeleton `summary` is trimmed to.
pub const SUMMARY_MAX_LEN: usize = 280;

/// Indexing status: started
pub const INDEXING_STATUS_STARTED: &str = "started";

/// Indexing status: completed
pub const INDEXING_STATUS_COMPLETED: &str = "completed";

/// Default directory name the host extension stores per-task data under.
pub const TASKS_DIR_NAME: &str = "tasks";

/// Default modes label when a task declares none.
pub const DEFAULT_MODE: &str = "default";
