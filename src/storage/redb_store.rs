// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Channel store backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `channels`: channel token → serialized ChannelRecord (JSON bytes)
//!
//! redb serializes write transactions, so every check-then-write below runs
//! as one atomic unit for all handles sharing the same `Database`.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use redb::{
    backends::InMemoryBackend, Database, ReadableDatabase, ReadableTable, TableDefinition,
};
use tracing::warn;

use super::channel_store::{ChannelStore, StoreError, StoreResult, Transition};
use super::record::{ChannelRecord, ChannelState};

/// Primary table: token → serialized ChannelRecord (JSON bytes).
const CHANNELS: TableDefinition<&str, &[u8]> = TableDefinition::new("channels");

fn decode(bytes: &[u8]) -> StoreResult<ChannelRecord> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Embedded channel store.
pub struct RedbChannelStore {
    db: Database,
}

impl RedbChannelStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Create a store that lives only in process memory.
    pub fn in_memory() -> StoreResult<Self> {
        let db = Database::builder().create_with_backend(InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StoreResult<Self> {
        // Pre-create the table so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CHANNELS)?;
        }
        write_txn.commit()?;
        Ok(Self { db })
    }
}

impl ChannelStore for RedbChannelStore {
    fn put(&self, token: &str, record: &ChannelRecord, ttl: Duration) -> StoreResult<()> {
        let now = Utc::now();
        let mut stored = record.clone();
        stored.expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| stored.created_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let json = serde_json::to_vec(&stored)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CHANNELS)?;
            let live = match table.get(token)? {
                Some(existing) => !decode(existing.value())?.is_expired_at(now),
                None => false,
            };
            if live {
                return Err(StoreError::AlreadyExists(token.to_string()));
            }
            table.insert(token, json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn health_check(&self) -> StoreResult<()> {
        let read_txn = self.db.begin_read()?;
        read_txn.open_table(CHANNELS)?;
        Ok(())
    }

    fn get(&self, token: &str) -> StoreResult<Option<ChannelRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CHANNELS)?;
        let record = match table.get(token)? {
            Some(value) => decode(value.value())?,
            None => return Ok(None),
        };
        if record.is_expired_at(Utc::now()) {
            return Ok(None);
        }
        Ok(Some(record))
    }

    fn transition(
        &self,
        token: &str,
        expected: ChannelState,
        mutation: &mut dyn FnMut(&mut ChannelRecord),
    ) -> StoreResult<Transition> {
        let now = Utc::now();
        let write_txn = self.db.begin_write()?;
        let outcome = {
            let mut table = write_txn.open_table(CHANNELS)?;
            let existing = match table.get(token)? {
                Some(value) => Some(decode(value.value())?),
                None => None,
            };
            match existing {
                None => Transition::Absent,
                Some(record) if record.is_expired_at(now) => Transition::Absent,
                Some(record) if record.state != expected => Transition::Conflict(record.state),
                Some(before) => {
                    let mut after = before.clone();
                    mutation(&mut after);
                    let json = serde_json::to_vec(&after)?;
                    table.insert(token, json.as_slice())?;
                    Transition::Applied { before, after }
                }
            }
        };

        if matches!(outcome, Transition::Applied { .. }) {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(outcome)
    }

    fn delete(&self, token: &str) -> StoreResult<bool> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(CHANNELS)?;
            let removed = table.remove(token)?.is_some();
            removed
        };
        write_txn.commit()?;
        Ok(removed)
    }

    fn clear(&self) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CHANNELS)?;
            let keys = table
                .iter()?
                .map(|entry| entry.map(|(key, _)| key.value().to_string()))
                .collect::<Result<Vec<_>, _>>()?;
            for key in &keys {
                table.remove(key.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let write_txn = self.db.begin_write()?;
        let purged = {
            let mut table = write_txn.open_table(CHANNELS)?;
            let mut expired = Vec::new();
            for entry in table.iter()? {
                let (key, value) = entry?;
                match decode(value.value()) {
                    Ok(record) if record.is_expired_at(now) => {
                        expired.push(key.value().to_string());
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "Purging undecodable channel record");
                        expired.push(key.value().to_string());
                    }
                }
            }
            for key in &expired {
                table.remove(key.as_str())?;
            }
            expired.len()
        };
        write_txn.commit()?;
        Ok(purged)
    }
}
