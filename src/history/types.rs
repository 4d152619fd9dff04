use serde::{Deserialize, Serialize};

/// Type of sync operation performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    /// Remote backup applied to the local tree
    Pull,
    /// Local tree uploaded as a remote backup
    Push,
    /// Local tree rolled back to a safety-net snapshot
    Restore,
}

impl OperationType {
    /// Returns a human-readable string representation
    pub fn as_str(&self) -> &str {
        match self {
            OperationType::Pull => "pull",
            OperationType::Push => "push",
            OperationType::Restore => "restore",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_type_as_str() {
        assert_eq!(OperationType::Pull.as_str(), "pull");
        assert_eq!(OperationType::Push.as_str(), "push");
        assert_eq!(OperationType::Restore.as_str(), "restore");
    }

    #[test]
    fn test_operation_type_serde() {
        let serialized = serde_json::to_string(&OperationType::Restore).unwrap();
        assert_eq!(serialized, r#""restore""#);

        let deserialized: OperationType = serde_json::from_str(r#""pull""#).unwrap();
        assert_eq!(deserialized, OperationType::Pull);
    }
}
