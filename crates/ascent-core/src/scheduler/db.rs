//! Persistent storage for scheduled nudges using redb.
//!
//! # Table design
//!
//! A single `NUDGES` table uses a 24-byte composite key:
//! ```text
//! [ due_at_ms: u64 big-endian (8 bytes) | uuid: 16 bytes ]
//! ```
//!
//! Because the timestamp occupies the high bytes in big-endian encoding,
//! byte ordering equals due-time ordering. A single range scan
//! `..=due_upper_bound(now)` returns all nudges due by `now` without any
//! post-filtering for timestamp — only `Pending` status filtering is needed
//! in application code.

use std::{path::Path, time::Duration};

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use uuid::Uuid;

use crate::error::{AscentError, Result};

use super::{Nudge, NudgeStatus};

// ---------------------------------------------------------------------------
// Table definition
// ---------------------------------------------------------------------------

/// Key: 24-byte composite (due_at_ms big-endian ++ uuid bytes)
/// Value: JSON-encoded Nudge
const NUDGES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("nudges");

// ---------------------------------------------------------------------------
// Key helpers
// ---------------------------------------------------------------------------

fn nudge_key(due_at: DateTime<Utc>, id: Uuid) -> [u8; 24] {
    let mut key = [0u8; 24];
    let ms = due_at.timestamp_millis().max(0) as u64;
    key[..8].copy_from_slice(&ms.to_be_bytes());
    key[8..].copy_from_slice(id.as_bytes());
    key
}

/// Upper bound for a range scan returning all nudges due by `now`.
///
/// The UUID suffix is `0xff` × 16, which is greater than any valid UUID,
/// so all nudges with `due_at_ms <= now_ms` are included.
fn due_upper_bound(now: DateTime<Utc>) -> [u8; 24] {
    let mut key = [0u8; 24];
    let ms = now.timestamp_millis().max(0) as u64;
    key[..8].copy_from_slice(&ms.to_be_bytes());
    key[8..].fill(0xff);
    key
}

// ---------------------------------------------------------------------------
// NudgeDb
// ---------------------------------------------------------------------------

/// Persistent store for scheduled `Nudge` records.
pub struct NudgeDb {
    db: Database,
}

impl NudgeDb {
    /// Open or create the redb database at `path`.
    ///
    /// Creates the `NUDGES` table if it doesn't already exist.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).map_err(|e| AscentError::NudgeDb(e.to_string()))?;
        // Ensure the table exists before any reads
        let wt = db
            .begin_write()
            .map_err(|e| AscentError::NudgeDb(e.to_string()))?;
        wt.open_table(NUDGES)
            .map_err(|e| AscentError::NudgeDb(e.to_string()))?;
        wt.commit()
            .map_err(|e| AscentError::NudgeDb(e.to_string()))?;
        Ok(Self { db })
    }

    /// Insert a new nudge. The key is derived from the due timestamp.
    pub fn insert(&self, nudge: &Nudge) -> Result<()> {
        let key = nudge_key(nudge.due_at, nudge.id);
        let value = serde_json::to_vec(nudge).map_err(|e| AscentError::NudgeDb(e.to_string()))?;
        let wt = self
            .db
            .begin_write()
            .map_err(|e| AscentError::NudgeDb(e.to_string()))?;
        {
            let mut table = wt
                .open_table(NUDGES)
                .map_err(|e| AscentError::NudgeDb(e.to_string()))?;
            table
                .insert(key.as_slice(), value.as_slice())
                .map_err(|e| AscentError::NudgeDb(e.to_string()))?;
        }
        wt.commit()
            .map_err(|e| AscentError::NudgeDb(e.to_string()))?;
        Ok(())
    }

    /// Update the status of a nudge identified by `id`.
    ///
    /// Finds the nudge by scanning all records, removes the old record, and
    /// reinserts with the updated status and `updated_at`.
    pub fn set_status(&self, id: Uuid, status: NudgeStatus) -> Result<()> {
        let all = self.list_all()?;
        let mut nudge = all
            .into_iter()
            .find(|n| n.id == id)
            .ok_or_else(|| AscentError::NudgeDb(format!("nudge not found: {id}")))?;

        let key = nudge_key(nudge.due_at, nudge.id);
        nudge.status = status;
        nudge.updated_at = Utc::now();

        let new_value =
            serde_json::to_vec(&nudge).map_err(|e| AscentError::NudgeDb(e.to_string()))?;

        let wt = self
            .db
            .begin_write()
            .map_err(|e| AscentError::NudgeDb(e.to_string()))?;
        {
            let mut table = wt
                .open_table(NUDGES)
                .map_err(|e| AscentError::NudgeDb(e.to_string()))?;
            // Remove old entry and reinsert with same key but new value
            table
                .remove(key.as_slice())
                .map_err(|e| AscentError::NudgeDb(e.to_string()))?;
            table
                .insert(key.as_slice(), new_value.as_slice())
                .map_err(|e| AscentError::NudgeDb(e.to_string()))?;
        }
        wt.commit()
            .map_err(|e| AscentError::NudgeDb(e.to_string()))?;
        Ok(())
    }

    /// Return all `Pending` nudges whose due timestamp is `<= now`.
    ///
    /// Results are in due-time order (ascending) due to the composite key design.
    pub fn range_due(&self, now: DateTime<Utc>) -> Result<Vec<Nudge>> {
        let upper = due_upper_bound(now);
        let rt = self
            .db
            .begin_read()
            .map_err(|e| AscentError::NudgeDb(e.to_string()))?;
        let table = rt
            .open_table(NUDGES)
            .map_err(|e| AscentError::NudgeDb(e.to_string()))?;

        let mut result = Vec::new();
        for entry in table
            .range(..=upper.as_slice())
            .map_err(|e| AscentError::NudgeDb(e.to_string()))?
        {
            let (_, v) = entry.map_err(|e| AscentError::NudgeDb(e.to_string()))?;
            let nudge: Nudge = serde_json::from_slice(v.value())
                .map_err(|e| AscentError::NudgeDb(e.to_string()))?;
            if matches!(nudge.status, NudgeStatus::Pending) {
                result.push(nudge);
            }
        }
        Ok(result)
    }

    /// On server startup, mark any `Sending` nudge older than `max_age` as
    /// `Failed`. Returns the number of nudges recovered.
    pub fn startup_recovery(&self, max_age: Duration) -> Result<u32> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(max_age)
                .map_err(|e| AscentError::NudgeDb(e.to_string()))?;

        let all = self.list_all()?;
        let mut count = 0u32;
        for nudge in all {
            if matches!(nudge.status, NudgeStatus::Sending) && nudge.updated_at < cutoff {
                self.set_status(
                    nudge.id,
                    NudgeStatus::Failed {
                        reason: "recovered from restart".into(),
                    },
                )?;
                count += 1;
            }
        }
        Ok(count)
    }

    /// List all nudges, sorted by `created_at` descending (newest first).
    pub fn list_all(&self) -> Result<Vec<Nudge>> {
        let rt = self
            .db
            .begin_read()
            .map_err(|e| AscentError::NudgeDb(e.to_string()))?;
        let table = rt
            .open_table(NUDGES)
            .map_err(|e| AscentError::NudgeDb(e.to_string()))?;

        let mut result = Vec::new();
        for entry in table
            .iter()
            .map_err(|e| AscentError::NudgeDb(e.to_string()))?
        {
            let (_, v) = entry.map_err(|e| AscentError::NudgeDb(e.to_string()))?;
            let nudge: Nudge = serde_json::from_slice(v.value())
                .map_err(|e| AscentError::NudgeDb(e.to_string()))?;
            result.push(nudge);
        }
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
