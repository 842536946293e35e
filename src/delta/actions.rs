//! Log actions.
//!
//! Every version file in the log is a JSON array of actions, each carrying a
//! `"type"` discriminator (`add`, `remove`, `commitInfo`). Unknown fields on a
//! known action are ignored so newer writers stay readable; an unknown type is
//! a parse error. The snapshot projection only consults paths and sizes; the
//! optional `AddFile` fields ride along untouched.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    #[serde(rename = "add")]
    Add(AddFile),
    #[serde(rename = "remove")]
    Remove(RemoveFile),
    #[serde(rename = "commitInfo")]
    CommitInfo(CommitInfo),
}

/// Adds a data file to the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddFile {
    /// Path of the data file, relative to the table root.
    pub path: String,
    /// Size of the file in bytes.
    pub size: u64,
    /// When the file was written, in epoch milliseconds.
    pub modification_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_values: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_change: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<String>,
}

impl AddFile {
    pub fn new(path: impl Into<String>, size: u64, modification_time: u64) -> Self {
        Self {
            path: path.into(),
            size,
            modification_time,
            partition_values: None,
            data_change: None,
            tags: None,
            stats: None,
        }
    }
}

/// Removes a previously added data file from the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFile {
    pub path: String,
    pub deletion_timestamp: u64,
}

impl RemoveFile {
    pub fn new(path: impl Into<String>, deletion_timestamp: u64) -> Self {
        Self {
            path: path.into(),
            deletion_timestamp,
        }
    }
}

/// Describes the commit that produced a version: the operation name plus
/// free-form parameters such as the isolation level and start version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfo {
    pub operation: String,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    pub timestamp: u64,
}

impl CommitInfo {
    pub fn create(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            parameters: HashMap::new(),
            timestamp: now_ms(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_json_round_trip() {
        let actions = vec![
            Action::Add(AddFile::new("data/part-1.parquet", 1024, 1700000000000)),
            Action::Remove(RemoveFile::new("data/part-0.parquet", 1700000000001)),
            Action::CommitInfo(
                CommitInfo::create("INSERT").with_parameter("startVersion", "0"),
            ),
        ];

        let bytes = serde_json::to_vec(&actions).unwrap();
        let parsed: Vec<Action> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, actions);
    }

    #[test]
    fn test_add_file_wire_field_names() {
        let json =
            serde_json::to_value(Action::Add(AddFile::new("data/f", 10, 42))).unwrap();
        assert_eq!(json["type"], "add");
        assert_eq!(json["modificationTime"], 42);
        // Optional fields are omitted entirely when unset.
        assert!(json.get("partitionValues").is_none());
        assert!(json.get("stats").is_none());
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let json = r#"{"type":"add","path":"data/f","size":1,"modificationTime":2,"futureField":"x"}"#;
        let action: Action = serde_json::from_str(json).unwrap();
        assert_eq!(action, Action::Add(AddFile::new("data/f", 1, 2)));
    }

    #[test]
    fn test_unknown_type_fails() {
        let json = r#"{"type":"protocol","minReaderVersion":1}"#;
        assert!(serde_json::from_str::<Action>(json).is_err());
    }
}
