//! Materialized view of the log at one version.

use super::actions::{Action, AddFile};

/// The full replay of versions `0..=version`, immutable once built.
///
/// Version -1 denotes the empty snapshot of a table with no commits.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    version: i64,
    actions: Vec<Action>,
}

impl Snapshot {
    pub fn new(version: i64, actions: Vec<Action>) -> Self {
        Self { version, actions }
    }

    pub fn empty() -> Self {
        Self {
            version: -1,
            actions: Vec::new(),
        }
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Data files still live at this version: every `AddFile` in replay
    /// order, minus files a later `RemoveFile` took out. A path re-added
    /// after its removal is live again.
    pub fn active_files(&self) -> Vec<AddFile> {
        let mut files: Vec<AddFile> = Vec::new();
        for action in &self.actions {
            match action {
                Action::Add(add) => files.push(add.clone()),
                Action::Remove(remove) => files.retain(|f| f.path != remove.path),
                Action::CommitInfo(_) => {}
            }
        }
        files
    }
}
