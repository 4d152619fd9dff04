use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use super::record::OperationRecord;
use super::types::OperationType;

/// Maximum number of operation records to keep in history
pub const MAX_HISTORY_SIZE: usize = 20;

/// Manages operation history with persistence to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationHistory {
    /// List of operation records, most recent first
    pub operations: Vec<OperationRecord>,

    #[serde(skip)]
    path: Option<PathBuf>,

    #[serde(skip)]
    limit: Option<usize>,
}

impl OperationHistory {
    /// Create a new empty operation history
    fn new() -> Self {
        Self {
            operations: Vec::new(),
            path: None,
            limit: None,
        }
    }

    /// Get the path to the history file
    fn history_file_path() -> Result<PathBuf> {
        crate::config::ConfigManager::operation_history_path()
    }

    /// Load operation history from a custom path
    /// Creates a new empty history if the file doesn't exist
    ///
    /// # Arguments
    /// * `path` - Optional custom path to load from. If None, uses default location.
    pub fn from_path(path: Option<PathBuf>) -> Result<Self> {
        let file_path = match path {
            Some(p) => p,
            None => Self::history_file_path()?,
        };

        if !file_path.exists() {
            return Ok(Self {
                path: Some(file_path),
                ..Self::new()
            });
        }

        let content = fs::read_to_string(&file_path).with_context(|| {
            format!(
                "Failed to read operation history file from: {}",
                file_path.display()
            )
        })?;

        let mut history: OperationHistory = serde_json::from_str(&content).with_context(|| {
            format!(
                "Failed to parse operation history JSON from: {}",
                file_path.display()
            )
        })?;
        history.path = Some(file_path);

        Ok(history)
    }

    /// Load operation history from disk using default location
    pub fn load() -> Result<Self> {
        Self::from_path(None)
    }

    /// Keep at most `limit` records instead of [`MAX_HISTORY_SIZE`].
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit.max(1));
        self
    }

    /// Save operation history to a custom path
    ///
    /// # Arguments
    /// * `path` - Optional custom path to save to. If None, uses the path
    ///   the history was loaded from, then the default location.
    pub fn save_to(&self, path: Option<PathBuf>) -> Result<()> {
        let file_path = match path.or_else(|| self.path.clone()) {
            Some(p) => p,
            None => Self::history_file_path()?,
        };

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create history directory: {}", parent.display())
            })?;
        }

        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize operation history")?;

        fs::write(&file_path, content).with_context(|| {
            format!(
                "Failed to write operation history file to: {}",
                file_path.display()
            )
        })?;

        Ok(())
    }

    /// Save operation history to where it was loaded from
    pub fn save(&self) -> Result<()> {
        self.save_to(None)
    }

    /// Add a new operation record to history and persist it
    /// Automatically rotates older entries past the size limit
    pub fn add_operation(&mut self, record: OperationRecord) -> Result<()> {
        self.operations.insert(0, record);

        let limit = self.limit.unwrap_or(MAX_HISTORY_SIZE);
        if self.operations.len() > limit {
            self.operations.truncate(limit);
        }

        self.save()?;

        Ok(())
    }

    /// Get the most recent operation record
    pub fn get_last_operation(&self) -> Option<&OperationRecord> {
        self.operations.first()
    }

    /// Get the most recent operation of a specific type
    pub fn get_last_operation_by_type(&self, op_type: OperationType) -> Option<&OperationRecord> {
        self.operations
            .iter()
            .find(|op| op.operation_type == op_type)
    }

    /// Get all operation records, most recent first
    pub fn list_operations(&self) -> &[OperationRecord] {
        &self.operations
    }

    /// Clear all operation history
    pub fn clear(&mut self) -> Result<()> {
        self.operations.clear();
        self.save()?;
        Ok(())
    }

    /// Get the number of operations in history
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Check if history is empty
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl Default for OperationHistory {
    fn default() -> Self {
        Self::new()
    }
}
