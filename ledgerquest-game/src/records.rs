//! Finished-game summaries and the stores that keep them.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::collab::PersistenceSink;
use crate::error::PersistenceError;
use crate::grade::Grade;

/// Summary written once per completed game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSummaryRecord {
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub final_balance: i64,
    pub rounds_completed: u8,
    pub grade: Grade,
    pub total_correct: u32,
    pub total_questions: u32,
}

/// Read access to a user's past games.
pub trait RecordHistory {
    /// A user's summaries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn records_for_user(&self, user_id: &str) -> Result<Vec<GameSummaryRecord>, PersistenceError>;
}

fn newest_first(mut records: Vec<GameSummaryRecord>) -> Vec<GameSummaryRecord> {
    // Reverse first so equal timestamps keep latest-written first after the stable sort.
    records.reverse();
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    records
}

/// In-memory store. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<Mutex<Vec<GameSummaryRecord>>>,
}

impl MemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every stored record in write order.
    #[must_use]
    pub fn all(&self) -> Vec<GameSummaryRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PersistenceSink for MemoryRecordStore {
    fn submit_game_summary(&self, record: &GameSummaryRecord) -> Result<(), PersistenceError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}

impl RecordHistory for MemoryRecordStore {
    fn records_for_user(&self, user_id: &str) -> Result<Vec<GameSummaryRecord>, PersistenceError> {
        let matching = self
            .all()
            .into_iter()
            .filter(|record| record.user_id == user_id)
            .collect();
        Ok(newest_first(matching))
    }
}

/// Append-only JSON Lines file, one summary per line.
#[derive(Debug, Clone)]
pub struct JsonlRecordStore {
    path: PathBuf,
}

impl JsonlRecordStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Vec<GameSummaryRecord>, PersistenceError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(PersistenceError::Unavailable(format!(
                    "{}: {err}",
                    self.path.display()
                )));
            }
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(idx, line)| {
                serde_json::from_str(line).map_err(|err| {
                    PersistenceError::Unavailable(format!(
                        "{} line {}: {err}",
                        self.path.display(),
                        idx + 1
                    ))
                })
            })
            .collect()
    }
}

impl PersistenceSink for JsonlRecordStore {
    fn submit_game_summary(&self, record: &GameSummaryRecord) -> Result<(), PersistenceError> {
        let write_failed = |err: &dyn std::fmt::Display| {
            PersistenceError::WriteFailed(format!("{}: {err}", self.path.display()))
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| write_failed(&err))?;
        }
        let mut line = serde_json::to_string(record).map_err(|err| write_failed(&err))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| write_failed(&err))?;
        file.write_all(line.as_bytes())
            .map_err(|err| write_failed(&err))?;
        log::debug!("{} appended record for {}", crate::constants::LOG_PERSIST, record.user_id);
        Ok(())
    }
}

impl RecordHistory for JsonlRecordStore {
    fn records_for_user(&self, user_id: &str) -> Result<Vec<GameSummaryRecord>, PersistenceError> {
        let matching = self
            .read_all()?
            .into_iter()
            .filter(|record| record.user_id == user_id)
            .collect();
        Ok(newest_first(matching))
    }
}
