//! Operation history tracking and persistence.
//!
//! Records every push, pull and snapshot restore with its outcome. The most
//! recent operations are kept in a JSON file next to the configuration,
//! rotated at a fixed size. Records that mutated the local tree carry the id
//! of the safety-net snapshot taken beforehand.

mod record;
mod storage;
mod types;

pub use record::OperationRecord;
pub use storage::{OperationHistory, MAX_HISTORY_SIZE};
pub use types::OperationType;
