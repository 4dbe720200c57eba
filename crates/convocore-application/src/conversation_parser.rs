//! Conversation Parser use case (component B).
//!
//! Reads one task directory and builds a [`ConversationSkeleton`]. Never
//! propagates a parse error to the caller: any failure degrades the
//! skeleton (defaults filled in, `parent_resolution_method = Unresolved`)
//! instead.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use convocore_domain::constants::values::{SUMMARY_MAX_LEN, TRUNCATED_INSTRUCTION_MAX_LEN};
use convocore_domain::entities::{ConversationSkeleton, ParentResolutionMethod};
use convocore_domain::normalize;
use convocore_domain::ports::StorageIo;
use convocore_domain::utils::compute_content_hash;
use convocore_domain::value_objects::TaskId;
use serde_json::Value;
use tracing::warn;

const API_HISTORY_FILE: &str = "api_conversation_history.json";
const UI_MESSAGES_FILE: &str = "ui_messages.json";
const TASK_METADATA_FILE: &str = "task_metadata.json";

/// One decoded message, shape-normalized regardless of which source file
/// (API history or UI messages) it came from.
struct RawMessage {
    role: String,
    text: String,
    timestamp_ms: Option<i64>,
    is_new_task_launch: bool,
}

/// Parses task directories into [`ConversationSkeleton`]s.
#[derive(Clone)]
pub struct ConversationParser {
    storage: Arc<dyn StorageIo>,
}

impl ConversationParser {
    /// Builds a parser over the given storage I/O port.
    pub fn new(storage: Arc<dyn StorageIo>) -> Self {
        Self { storage }
    }

    /// Parses `task_dir` (whose last path component is treated as the
    /// `taskId`) into a skeleton. `data_source` is recorded verbatim for
    /// auditability.
    pub async fn parse_task_directory(
        &self,
        task_dir: &Path,
        data_source: &str,
    ) -> ConversationSkeleton {
        let task_id = task_dir
            .file_name()
            .and_then(|n| n.to_str())
            .map(TaskId::from_string)
            .unwrap_or_else(TaskId::new);

        let messages = self.read_and_merge_messages(task_dir).await;
        let metadata = self.read_json(&task_dir.join(TASK_METADATA_FILE)).await;
        let mtime_fallback = self.mtime_millis(task_dir).await;

        let first_instruction = messages
            .iter()
            .find(|m| m.role == "user")
            .map(|m| m.text.clone())
            .unwrap_or_default();
        let truncated_instruction = truncate_chars(&first_instruction, TRUNCATED_INSTRUCTION_MAX_LEN);

        let child_task_instruction_prefixes: Vec<String> = messages
            .iter()
            .filter(|m| m.is_new_task_launch)
            .map(|m| normalize(&m.text))
            .collect();

        let created_at = messages
            .iter()
            .filter_map(|m| m.timestamp_ms)
            .min()
            .or(mtime_fallback)
            .and_then(epoch_millis_to_utc)
            .unwrap_or_else(Utc::now);
        let last_activity = messages
            .iter()
            .filter_map(|m| m.timestamp_ms)
            .max()
            .or(mtime_fallback)
            .and_then(epoch_millis_to_utc)
            .unwrap_or(created_at)
            .max(created_at);

        let total_size: u64 = messages.iter().map(|m| m.text.len() as u64).sum();
        let summary = truncate_chars(&first_instruction, SUMMARY_MAX_LEN);
        let modes = extract_modes(metadata.as_ref());
        let workspace = extract_workspace(metadata.as_ref());
        let parent_task_id = extract_parent_task_id(metadata.as_ref());

        let content_hash = compute_content_hash(
            &messages
                .iter()
                .map(|m| format!("{}:{}", m.role, normalize(&m.text)))
                .collect::<Vec<_>>()
                .join("\n"),
        );

        ConversationSkeleton {
            task_id,
            parent_task_id,
            reconstructed_parent_id: None,
            parent_confidence_score: None,
            parent_resolution_method: if parent_task_id.is_some() {
                ParentResolutionMethod::MetadataDirect
            } else {
                ParentResolutionMethod::Unresolved
            },
            workspace,
            created_at,
            last_activity,
            message_count: messages.len() as u64,
            total_size,
            modes,
            summary,
            file_path: task_dir.display().to_string(),
            truncated_instruction,
            child_task_instruction_prefixes,
            data_source: data_source.to_owned(),
            content_hash,
        }
    }

    /// Reads and time-orders every message in `task_dir`, merging the API
    /// and UI history files exactly as [`Self::parse_task_directory`] does.
    async fn read_and_merge_messages(&self, task_dir: &Path) -> Vec<RawMessage> {
        let api_messages = self
            .read_messages(&task_dir.join(API_HISTORY_FILE))
            .await
            .unwrap_or_default();
        let ui_messages = self
            .read_messages(&task_dir.join(UI_MESSAGES_FILE))
            .await
            .unwrap_or_default();

        let mut messages = api_messages;
        messages.extend(ui_messages);
        messages.sort_by_key(|m| m.timestamp_ms.unwrap_or(0));
        messages
    }

    /// Returns every message's text, in the same time order used to build
    /// `contentHash`, for the vector indexer to chunk. Unlike the skeleton
    /// itself, nothing here is cached: re-reads the task directory each call.
    pub async fn load_message_texts(&self, task_dir: &Path) -> Vec<String> {
        self.read_and_merge_messages(task_dir)
            .await
            .into_iter()
            .map(|m| m.text)
            .collect()
    }

    async fn mtime_millis(&self, task_dir: &Path) -> Option<i64> {
        self.storage
            .stat(task_dir)
            .await
            .ok()
            .and_then(|stat| stat.modified)
            .and_then(|modified| modified.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
    }

    async fn read_json(&self, path: &Path) -> Option<Value> {
        let raw = self.storage.read_to_string(path).await.ok()?;
        parse_tolerant(&raw)
    }

    async fn read_messages(&self, path: &Path) -> Option<Vec<RawMessage>> {
        let value = self.read_json(path).await?;
        let array = match value {
            Value::Array(items) => items,
            Value::Object(ref map) => match map.get("messages") {
                Some(Value::Array(items)) => items.clone(),
                _ => {
                    warn!(path = %path.display(), "message file has neither array nor messages field");
                    return None;
                }
            },
            _ => return None,
        };
        Some(array.iter().filter_map(decode_message).collect())
    }
}

/// Parses `raw` as JSON, tolerating a single trailing non-JSON sentinel by
/// retrying on a progressively shorter prefix truncated at the last `}` or
/// `]`.
fn parse_tolerant(raw: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(raw) {
        return Some(value);
    }
    let mut candidate = raw;
    while let Some(pos) = candidate.rfind(['}', ']']) {
        candidate = &candidate[..=pos];
        if let Ok(value) = serde_json::from_str(candidate) {
            return Some(value);
        }
        candidate = &candidate[..pos];
    }
    None
}

fn decode_message(value: &Value) -> Option<RawMessage> {
    let obj = value.as_object()?;

    let role = obj
        .get("role")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| {
            match obj.get("type").and_then(Value::as_str) {
                Some("say") | Some("ask") => "user".to_owned(),
                _ => "assistant".to_owned(),
            }
        });

    let text = extract_text(obj.get("content")).or_else(|| extract_text(obj.get("text")))?;

    let timestamp_ms = obj
        .get("ts")
        .and_then(Value::as_i64)
        .or_else(|| obj.get("timestamp").and_then(Value::as_i64));

    let tool = obj
        .get("tool")
        .and_then(Value::as_str)
        .or_else(|| obj.get("tool_name").and_then(Value::as_str))
        .unwrap_or("");
    let is_new_task_launch = tool.eq_ignore_ascii_case("new_task");

    Some(RawMessage {
        role,
        text,
        timestamp_ms,
        is_new_task_launch,
    })
}

fn extract_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Array(blocks) => {
            let joined = blocks
                .iter()
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n");
            if joined.is_empty() { None } else { Some(joined) }
        }
        _ => None,
    }
}

fn extract_modes(metadata: Option<&Value>) -> BTreeSet<String> {
    let mut modes = BTreeSet::new();
    if let Some(value) = metadata.and_then(|m| m.get("modes")).and_then(Value::as_array) {
        for m in value {
            if let Some(s) = m.as_str() {
                modes.insert(s.to_owned());
            }
        }
    } else if let Some(mode) = metadata.and_then(|m| m.get("mode")).and_then(Value::as_str) {
        modes.insert(mode.to_owned());
    }
    modes
}

fn extract_workspace(metadata: Option<&Value>) -> Option<String> {
    metadata
        .and_then(|m| m.get("workspace").or_else(|| m.get("cwd")))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

fn extract_parent_task_id(metadata: Option<&Value>) -> Option<TaskId> {
    metadata
        .and_then(|m| m.get("parentTaskId").or_else(|| m.get("parent_task_id")))
        .and_then(Value::as_str)
        .map(TaskId::from_string)
}

fn epoch_millis_to_utc(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

fn truncate_chars(s: &str, max_len: usize) -> String {
    s.chars().take(max_len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use convocore_providers::fs::InMemoryStorageIo;

    #[tokio::test]
    async fn parses_array_of_messages() {
        let storage = Arc::new(InMemoryStorageIo::new());
        storage
            .write_file(
                "/root/tasks/task-1/api_conversation_history.json",
                r#"[{"role":"user","content":"Analyze logs for errors","ts":100}]"#,
            )
            .await;
        let parser = ConversationParser::new(storage);
        let skeleton = parser
            .parse_task_directory(Path::new("/root/tasks/task-1"), "test")
            .await;
        assert_eq!(skeleton.truncated_instruction, "Analyze logs for errors");
        assert_eq!(skeleton.message_count, 1);
    }

    #[tokio::test]
    async fn tolerates_truncated_trailing_json() {
        let raw = r#"[{"role":"user","content":"hello","ts":1}]GARBAGE"#;
        let value = parse_tolerant(raw).expect("should recover parseable prefix");
        assert!(value.is_array());
    }

    #[tokio::test]
    async fn degrades_on_missing_files_without_panicking() {
        let storage = Arc::new(InMemoryStorageIo::new());
        let parser = ConversationParser::new(storage);
        let skeleton = parser
            .parse_task_directory(Path::new("/root/tasks/empty-task"), "test")
            .await;
        assert_eq!(skeleton.message_count, 0);
        assert_eq!(skeleton.truncated_instruction, "");
        assert_eq!(
            skeleton.parent_resolution_method,
            ParentResolutionMethod::Unresolved
        );
    }

    #[tokio::test]
    async fn bom_prefixed_file_yields_same_hash_as_plain() {
        let plain = Arc::new(InMemoryStorageIo::new());
        plain
            .write_file(
                "/root/tasks/t/api_conversation_history.json",
                r#"[{"role":"user","content":"hi","ts":1}]"#,
            )
            .await;
        let bom = Arc::new(InMemoryStorageIo::new());
        bom.write_file(
            "/root/tasks/t/api_conversation_history.json",
            "\u{feff}[{\"role\":\"user\",\"content\":\"hi\",\"ts\":1}]",
        )
        .await;

        let a = ConversationParser::new(plain)
            .parse_task_directory(Path::new("/root/tasks/t"), "test")
            .await;
        let b = ConversationParser::new(bom)
            .parse_task_directory(Path::new("/root/tasks/t"), "test")
            .await;
        assert_eq!(a.content_hash, b.content_hash);
    }
}
