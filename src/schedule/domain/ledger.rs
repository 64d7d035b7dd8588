//! Append-only, digest-chained schedule history ledger.
//!
//! Every record carries the SHA-256 digest of its entry chained to the digest
//! of the record before it, so any edit to a stored entry breaks
//! [`ScheduleLedger::verify`] from that record onwards. The ledger has no
//! update or delete operation.

use super::{HistoryEntryId, ScheduleChangeReason, ScheduleHistoryEntry, TaskId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// SHA-256 digest of a ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LedgerDigest([u8; 32]);

impl LedgerDigest {
    /// Digest preceding the first record.
    pub const GENESIS: Self = Self([0; 32]);

    /// Returns the raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for LedgerDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// A history entry as stored in the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRecord {
    sequence: u64,
    entry: ScheduleHistoryEntry,
    previous_digest: LedgerDigest,
    digest: LedgerDigest,
}

impl LedgerRecord {
    /// Zero-based position in the ledger.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The stored entry.
    #[must_use]
    pub const fn entry(&self) -> &ScheduleHistoryEntry {
        &self.entry
    }

    /// Digest of the preceding record.
    #[must_use]
    pub const fn previous_digest(&self) -> LedgerDigest {
        self.previous_digest
    }

    /// Digest of this record.
    #[must_use]
    pub const fn digest(&self) -> LedgerDigest {
        self.digest
    }
}

/// Errors returned by ledger operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// An entry with the same identifier is already recorded.
    #[error("history entry {0} is already recorded")]
    DuplicateEntry(HistoryEntryId),

    /// The entry predates the latest record, which would break the timeline.
    #[error("history entry {entry_id} at {created_at} predates the latest record at {latest}")]
    OutOfOrder {
        /// Rejected entry.
        entry_id: HistoryEntryId,
        /// Its creation timestamp.
        created_at: DateTime<Utc>,
        /// Creation timestamp of the latest record.
        latest: DateTime<Utc>,
    },

    /// A stored record no longer matches its digest.
    #[error("ledger record {sequence} fails digest verification")]
    Tampered {
        /// First record failing verification.
        sequence: u64,
    },

    /// The entry could not be encoded for hashing.
    #[error("failed to encode history entry for hashing: {0}")]
    Encoding(String),
}

/// Append-only store of schedule history entries.
#[derive(Debug, Clone, Default)]
pub struct ScheduleLedger {
    records: Vec<LedgerRecord>,
    ids: HashSet<HistoryEntryId>,
}

#[derive(Serialize)]
struct DigestInput<'a> {
    sequence: u64,
    previous: String,
    entry: &'a ScheduleHistoryEntry,
}

impl ScheduleLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one entry.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::DuplicateEntry`] for a known id and
    /// [`LedgerError::OutOfOrder`] for an entry older than the latest record.
    pub fn record(&mut self, entry: ScheduleHistoryEntry) -> Result<&LedgerRecord, LedgerError> {
        self.record_all(vec![entry])?;
        self.records
            .last()
            .ok_or_else(|| LedgerError::Encoding("ledger is empty after append".to_owned()))
    }

    /// Appends a batch of entries, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns the first validation error; the ledger is unchanged then.
    pub fn record_all(
        &mut self,
        entries: impl IntoIterator<Item = ScheduleHistoryEntry>,
    ) -> Result<(), LedgerError> {
        let mut staged: Vec<LedgerRecord> = Vec::new();
        let mut staged_ids = HashSet::new();
        for entry in entries {
            let previous = staged.last().or_else(|| self.records.last());
            if self.ids.contains(&entry.id()) || !staged_ids.insert(entry.id()) {
                return Err(LedgerError::DuplicateEntry(entry.id()));
            }
            match previous.map(|record| record.entry.created_at()) {
                Some(latest) if entry.created_at() < latest => {
                    return Err(LedgerError::OutOfOrder {
                        entry_id: entry.id(),
                        created_at: entry.created_at(),
                        latest,
                    });
                }
                _ => {}
            }
            let sequence = previous.map_or(0, |record| record.sequence.saturating_add(1));
            let previous_digest = previous.map_or(LedgerDigest::GENESIS, |record| record.digest);
            let digest = compute_digest(sequence, previous_digest, &entry)?;
            staged.push(LedgerRecord {
                sequence,
                entry,
                previous_digest,
                digest,
            });
        }
        self.ids.extend(staged_ids);
        self.records.extend(staged);
        Ok(())
    }

    /// Every record, oldest first.
    #[must_use]
    pub fn records(&self) -> &[LedgerRecord] {
        &self.records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Digest of the latest record.
    #[must_use]
    pub fn head(&self) -> LedgerDigest {
        self.records
            .last()
            .map_or(LedgerDigest::GENESIS, |record| record.digest)
    }

    /// Entries for `task_id`, ordered by creation time.
    pub fn entries_for(&self, task_id: TaskId) -> impl Iterator<Item = &ScheduleHistoryEntry> {
        self.records_for(task_id).map(LedgerRecord::entry)
    }

    /// Records for `task_id`, ordered by creation time.
    pub fn records_for(&self, task_id: TaskId) -> impl Iterator<Item = &LedgerRecord> {
        self.records
            .iter()
            .filter(move |record| record.entry.task_id() == task_id)
    }

    /// The latest record for `task_id` appended before `sequence`.
    #[must_use]
    pub fn latest_before(&self, task_id: TaskId, sequence: u64) -> Option<&LedgerRecord> {
        self.records_for(task_id)
            .take_while(|record| record.sequence < sequence)
            .last()
    }

    /// Returns `true` when a completion or cancellation of `task_id` at
    /// `finish` is already recorded.
    #[must_use]
    pub fn records_finish(&self, task_id: TaskId, finish: DateTime<Utc>) -> bool {
        self.entries_for(task_id).any(|entry| {
            matches!(
                entry.reason(),
                ScheduleChangeReason::TaskCompleted | ScheduleChangeReason::TaskCancelled
            ) && entry.new_expected_end() == Some(finish)
        })
    }

    /// Recomputes the digest chain.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Tampered`] naming the first record whose digest
    /// or chaining does not match.
    pub fn verify(&self) -> Result<(), LedgerError> {
        let mut previous = LedgerDigest::GENESIS;
        for record in &self.records {
            let expected = compute_digest(record.sequence, previous, &record.entry)?;
            if record.previous_digest != previous || record.digest != expected {
                return Err(LedgerError::Tampered {
                    sequence: record.sequence,
                });
            }
            previous = record.digest;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn tamper_with(&mut self, sequence: u64, entry: ScheduleHistoryEntry) {
        if let Some(record) = self
            .records
            .iter_mut()
            .find(|record| record.sequence == sequence)
        {
            record.entry = entry;
        }
    }
}

fn compute_digest(
    sequence: u64,
    previous: LedgerDigest,
    entry: &ScheduleHistoryEntry,
) -> Result<LedgerDigest, LedgerError> {
    let input = DigestInput {
        sequence,
        previous: previous.to_string(),
        entry,
    };
    let encoded = serde_json::to_vec(&input).map_err(|err| LedgerError::Encoding(err.to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update(&encoded);
    let mut digest = [0; 32];
    digest.copy_from_slice(&hasher.finalize());
    Ok(LedgerDigest(digest))
}
