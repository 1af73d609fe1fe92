// src/checkpoint.rs

//! Checkpoint ledger (C8): an append-only record of executed operations,
//! scoped to one `execute(plan)` call. Consulted in reverse to roll back
//! a partially-applied plan.

use crate::operation::Operation;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
struct Record {
    operation: Operation,
}

/// In-memory checkpoint. Created at the start of execution, discarded on
/// success, walked in reverse on failure.
#[derive(Debug, Default)]
pub struct Checkpoint {
    records: Vec<Record>,
    journal: Option<JournalWriter>,
}

impl Checkpoint {
    pub fn new() -> Self {
        Self { records: Vec::new(), journal: None }
    }

    /// Mirror every record to a transient file as it's appended, so a
    /// crash mid-execution leaves a trail an operator can inspect.
    /// Durability is an aid to post-mortem recovery, not a requirement
    /// for in-process rollback correctness.
    pub fn with_journal(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        Ok(Self {
            records: Vec::new(),
            journal: Some(JournalWriter::create(path.into())?),
        })
    }

    pub fn record(&mut self, operation: Operation) {
        if let Some(journal) = &mut self.journal {
            journal.append(&operation);
        }
        self.records.push(Record { operation });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate recorded operations from most-recent to least-recent.
    pub fn iter_reverse(&self) -> impl Iterator<Item = &Operation> {
        self.records.iter().rev().map(|r| &r.operation)
    }
}

#[derive(Debug)]
struct JournalWriter {
    file: std::fs::File,
    path: PathBuf,
}

impl JournalWriter {
    fn create(path: PathBuf) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { file, path })
    }

    fn append(&mut self, operation: &Operation) {
        #[derive(serde::Serialize)]
        struct JournalRecord<'a> {
            operation_id: &'a str,
            operation: &'a Operation,
        }
        let record = JournalRecord { operation_id: operation.id().as_str(), operation };
        if let Ok(line) = serde_json::to_string(&record) {
            let _ = writeln!(self.file, "{line}");
        }
    }
}

impl Drop for JournalWriter {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

pub fn journal_path_in(dir: &Path) -> PathBuf {
    dir.join(".dotweave-journal")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn records_reverse_in_lifo_order() {
        let mut cp = Checkpoint::new();
        cp.record(Operation::link_create(PathBuf::from("/a"), "/src/a".into()));
        cp.record(Operation::link_create(PathBuf::from("/b"), "/src/b".into()));

        let ids: Vec<_> = cp.iter_reverse().map(|op| op.id().as_str().to_string()).collect();
        assert_eq!(ids[0], Operation::link_create(PathBuf::from("/b"), "/src/b".into()).id().as_str());
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn empty_checkpoint_has_no_records() {
        let cp = Checkpoint::new();
        assert!(cp.is_empty());
        assert_eq!(cp.iter_reverse().count(), 0);
    }

    #[test]
    fn journal_file_is_removed_on_drop() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = journal_path_in(dir.path());
        {
            let mut cp = Checkpoint::with_journal(&path).unwrap();
            cp.record(Operation::link_create(PathBuf::from("/a"), "/src/a".into()));
            assert!(path.exists());
        }
        assert!(!path.exists());
    }
}
