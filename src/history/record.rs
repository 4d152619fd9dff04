use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::OperationType;

/// Record of a single sync operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRecord {
    /// Type of operation (push, pull or restore)
    pub operation_type: OperationType,

    /// When the operation finished
    pub timestamp: DateTime<Utc>,

    /// Remote endpoint the operation ran against
    pub endpoint: String,

    /// What the engine ended up doing, e.g. "pushed" or "skipped"
    pub action: String,

    /// Message shown to the user
    pub message: String,

    #[serde(default)]
    pub success: bool,

    /// Bookmarks in the tree that was uploaded or applied
    #[serde(default)]
    pub bookmark_count: usize,

    /// Safety-net snapshot taken before the local tree was touched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
}

impl OperationRecord {
    /// Create a new operation record
    pub fn new(operation_type: OperationType, endpoint: &str, action: &str, message: &str) -> Self {
        Self {
            operation_type,
            timestamp: Utc::now(),
            endpoint: endpoint.to_string(),
            action: action.to_string(),
            message: message.to_string(),
            success: true,
            bookmark_count: 0,
            snapshot_id: None,
        }
    }

    pub fn with_bookmark_count(mut self, count: usize) -> Self {
        self.bookmark_count = count;
        self
    }

    pub fn with_snapshot(mut self, snapshot_id: Option<String>) -> Self {
        self.snapshot_id = snapshot_id;
        self
    }

    pub fn failed(mut self) -> Self {
        self.success = false;
        self
    }

    /// One-line summary for `bookmark-sync history list`
    pub fn summary(&self) -> String {
        format!(
            "{} ({}) at {}: {} [{} bookmarks]",
            self.operation_type.as_str(),
            self.action,
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.message,
            self.bookmark_count
        )
    }
}
