//! Append-only JSON-lines log of conversation turns.

use crate::conversation::{Role, Turn, TurnContent};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::{Entry, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

/// One line of `conversation_<id>.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub conversation_id: Uuid,
    pub seq: usize,
    pub role: Role,
    pub content: TurnContent,
    pub timestamp: DateTime<Utc>,
}

/// Writes one file per conversation under a directory.
///
/// Each conversation's file is opened on its first turn and kept open until
/// [`close`](Self::close), so an append is a single small write.
pub struct ConversationLog {
    dir: PathBuf,
    // Held across the write so lines from concurrent sessions never interleave.
    files: Mutex<HashMap<Uuid, File>>,
}

impl ConversationLog {
    pub fn new(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating conversation log dir {}", dir.display()))?;
        Ok(Self {
            dir,
            files: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, conversation_id: Uuid) -> PathBuf {
        self.dir.join(format!("conversation_{}.jsonl", conversation_id))
    }

    pub fn append(&self, conversation_id: Uuid, turn: &Turn) -> anyhow::Result<()> {
        let record = LogRecord {
            conversation_id,
            seq: turn.seq,
            role: turn.role,
            content: turn.content.clone(),
            timestamp: Utc::now(),
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let path = self.path_for(conversation_id);
        let mut files = self
            .files
            .lock()
            .map_err(|_| anyhow::anyhow!("conversation log lock poisoned"))?;
        let file = match files.entry(conversation_id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .with_context(|| format!("opening {}", path.display()))?,
            ),
        };
        file.write_all(line.as_bytes())
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Release the open handle of a finished conversation. A later append
    /// reopens the file and keeps appending.
    pub fn close(&self, conversation_id: Uuid) {
        if let Ok(mut files) = self.files.lock() {
            files.remove(&conversation_id);
        }
    }

    /// Read back every record of a conversation, in file order.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn read(&self, conversation_id: Uuid) -> anyhow::Result<Vec<LogRecord>> {
        use std::io::{BufRead, BufReader};

        let path = self.path_for(conversation_id);
        let file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line).context("parsing log record")?);
        }
        Ok(records)
    }

    #[cfg(test)]
    fn open_files(&self) -> usize {
        self.files.lock().map(|files| files.len()).unwrap_or(0)
    }
}
