//! Append-only JSON-lines journal
//!
//! One record per line. A node's fragment and its audit entry are the same
//! `config_committed` record, so they become durable together or not at all.
//!
//! On open, a final line without a trailing newline is a torn write from a
//! crash mid-append: it is truncated away with a warning. Any other line that
//! fails to parse is corruption and aborts the open.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::lock;
use super::record::AuditEntry;
use crate::error::{EngineError, Result};
use crate::tree::Node;

/// One durable state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum JournalRecord {
    NodeCreated { node: Node },
    NodesDeleted { node_ids: Vec<String> },
    ConfigCommitted { entry: AuditEntry },
}

/// Open journal file positioned for appends.
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    file: File,
    len: u64,
    fsync: bool,
}

impl Journal {
    /// Open (creating if needed) and read back every complete record.
    pub fn open(path: &Path, fsync: bool) -> Result<(Self, Vec<JournalRecord>)> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;

        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;

        let mut records = Vec::new();
        let mut offset = 0usize;
        let mut line_no = 0usize;

        while offset < contents.len() {
            let Some(end) = contents[offset..].iter().position(|b| *b == b'\n') else {
                tracing::warn!(
                    path = %path.display(),
                    bytes = contents.len() - offset,
                    "truncating torn journal tail"
                );
                file.set_len(offset as u64)?;
                if fsync {
                    file.sync_data()?;
                }
                break;
            };

            line_no += 1;
            let line = &contents[offset..offset + end];
            offset += end + 1;

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let record = serde_json::from_slice(line).map_err(|e| EngineError::CorruptJournal {
                line: line_no,
                reason: e.to_string(),
            })?;
            records.push(record);
        }

        let len = offset.min(contents.len()) as u64;
        tracing::debug!(path = %path.display(), records = records.len(), "journal opened");

        Ok((
            Self {
                path: path.to_path_buf(),
                file,
                len,
                fsync,
            },
            records,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record; on failure the file is cut back to its prior length.
    pub fn append(&mut self, record: &JournalRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let written = self.file.write_all(&line).and_then(|()| {
            if self.fsync {
                self.file.sync_data()
            } else {
                Ok(())
            }
        });

        if let Err(e) = written {
            if let Err(truncate_err) = self.file.set_len(self.len) {
                tracing::error!(
                    path = %self.path.display(),
                    error = %truncate_err,
                    "failed to roll back partial journal append"
                );
            }
            return Err(e.into());
        }

        self.len += line.len() as u64;
        Ok(())
    }
}

/// Where committed transitions go before they are applied in memory.
#[derive(Debug)]
pub struct CommitLog {
    journal: Option<Mutex<Journal>>,
    lock_timeout: Duration,
}

impl CommitLog {
    /// No persistence; every record is accepted.
    pub fn in_memory() -> Self {
        Self {
            journal: None,
            lock_timeout: Duration::from_secs(1),
        }
    }

    pub fn journaled(journal: Journal, lock_timeout: Duration) -> Self {
        Self {
            journal: Some(Mutex::new(journal)),
            lock_timeout,
        }
    }

    pub fn is_durable(&self) -> bool {
        self.journal.is_some()
    }

    pub fn record(&self, record: &JournalRecord) -> Result<()> {
        match &self.journal {
            None => Ok(()),
            Some(journal) => lock::lock(journal, "journal", self.lock_timeout)?.append(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::record::ChangeType;
    use crate::tree::NodeType;
    use chrono::Utc;
    use tempfile::TempDir;
    use tiercfg_merge::Value;

    fn entry(version: u64) -> AuditEntry {
        AuditEntry {
            node_id: "acme".to_string(),
            version,
            change_type: ChangeType::Patch,
            changed_by: "test".to_string(),
            changed_at: Utc::now(),
            digest: String::new(),
            rollback_of: None,
            snapshot: Value::from_json(serde_json::json!({"v": version as i64})).unwrap(),
        }
    }

    #[test]
    fn test_append_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("journal.jsonl");

        let (mut journal, records) = Journal::open(&path, true).unwrap();
        assert!(records.is_empty());

        let node = Node::new("acme", "acme", None, NodeType::Org);
        journal
            .append(&JournalRecord::NodeCreated { node: node.clone() })
            .unwrap();
        journal
            .append(&JournalRecord::ConfigCommitted { entry: entry(1) })
            .unwrap();
        drop(journal);

        let (_, records) = Journal::open(&path, false).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], JournalRecord::NodeCreated { node });
        assert!(matches!(
            &records[1],
            JournalRecord::ConfigCommitted { entry } if entry.version == 1
        ));
    }

    #[test]
    fn test_record_tag_format() {
        let json = serde_json::to_value(JournalRecord::NodesDeleted {
            node_ids: vec!["a".to_string()],
        })
        .unwrap();
        assert_eq!(json["record"], "nodes_deleted");
        assert_eq!(json["node_ids"][0], "a");
    }

    #[test]
    fn test_torn_tail_truncated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journal.jsonl");

        let (mut journal, _) = Journal::open(&path, false).unwrap();
        journal
            .append(&JournalRecord::ConfigCommitted { entry: entry(1) })
            .unwrap();
        drop(journal);

        let intact_len = fs::metadata(&path).unwrap().len();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(br#"{"record":"config_committed","entry":{"node"#)
            .unwrap();
        drop(file);

        let (mut journal, records) = Journal::open(&path, false).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(fs::metadata(&path).unwrap().len(), intact_len);

        journal
            .append(&JournalRecord::ConfigCommitted { entry: entry(2) })
            .unwrap();
        drop(journal);
        let (_, records) = Journal::open(&path, false).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_corrupt_middle_line_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journal.jsonl");
        fs::write(&path, "not json\n{\"record\":\"nodes_deleted\",\"node_ids\":[]}\n").unwrap();

        match Journal::open(&path, false).unwrap_err() {
            EngineError::CorruptJournal { line, .. } => assert_eq!(line, 1),
            other => panic!("expected corrupt journal, got {other:?}"),
        }
    }

    #[test]
    fn test_in_memory_log_accepts_everything() {
        let log = CommitLog::in_memory();
        assert!(!log.is_durable());
        log.record(&JournalRecord::NodesDeleted { node_ids: vec![] })
            .unwrap();
    }
}
