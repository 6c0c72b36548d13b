// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Storage contract for channel records.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::record::{ChannelRecord, ChannelState};

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("record kept changing during transition: {0}")]
    Contention(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Conditional Transition Outcome
// =============================================================================

/// Result of [`ChannelStore::transition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The record was in the expected state and the mutation was committed.
    Applied {
        before: ChannelRecord,
        after: ChannelRecord,
    },
    /// The record exists but is in a different state; nothing was written.
    Conflict(ChannelState),
    /// No live record for the token.
    Absent,
}

// =============================================================================
// ChannelStore
// =============================================================================

/// TTL-capable key-value store holding one record per channel token.
///
/// Implementations must make [`transition`](ChannelStore::transition) a single
/// atomic compare-and-write against the shared backing store: every handle
/// sharing the same backend has to observe exactly one winner when two callers
/// race on the same token. Expired records are reported as absent by every
/// read path, whether or not they have been evicted yet.
pub trait ChannelStore: Send + Sync {
    /// Insert a new record living for `ttl`.
    ///
    /// Fails with [`StoreError::AlreadyExists`] if a live record already holds
    /// the token.
    fn put(&self, token: &str, record: &ChannelRecord, ttl: Duration) -> StoreResult<()>;

    /// Read a live record.
    fn get(&self, token: &str) -> StoreResult<Option<ChannelRecord>>;

    /// Apply `mutation` only if the live record is in `expected`.
    fn transition(
        &self,
        token: &str,
        expected: ChannelState,
        mutation: &mut dyn FnMut(&mut ChannelRecord),
    ) -> StoreResult<Transition>;

    /// Remove a record. Returns whether one was present.
    fn delete(&self, token: &str) -> StoreResult<bool>;

    /// Remove every record. Administrative only.
    fn clear(&self) -> StoreResult<()>;

    /// Evict records expired at `now`. Returns how many were removed.
    fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize>;

    /// Verify the backing store can serve reads.
    fn health_check(&self) -> StoreResult<()>;
}
