// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Channel store backed by a Redis server.
//!
//! Used when several relay processes share one store. Each channel is one
//! string key holding the JSON record, with the channel TTL as the key's
//! native expiry.
//!
//! ## Key Layout
//!
//! ```text
//! {prefix}{token} -> ChannelRecord (JSON), PX = ttl
//! ```
//!
//! ## Atomicity
//!
//! - `put` is `SET NX PX`, so only one writer can claim a token.
//! - `transition` reads the record, applies the mutation locally, then swaps
//!   it in with a compare-and-set script that only writes when the stored
//!   bytes are still the ones that were read. A lost swap re-reads and
//!   re-checks the state, so racing processes see exactly one winner.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use redis::{Client, Connection, RedisResult, Script};
use tracing::debug;

use super::channel_store::{ChannelStore, StoreError, StoreResult, Transition};
use super::record::{ChannelRecord, ChannelState};

pub const DEFAULT_KEY_PREFIX: &str = "connect-relay:channel:";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const SCAN_BATCH: usize = 200;
const CAS_ATTEMPTS: usize = 8;

/// Returns 1 when swapped, 0 when the key is gone, -1 when it changed.
const COMPARE_AND_SET: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current then
  return 0
end
if current ~= ARGV[1] then
  return -1
end
redis.call('SET', KEYS[1], ARGV[2], 'KEEPTTL')
return 1
"#;

fn decode(bytes: &[u8]) -> StoreResult<ChannelRecord> {
    Ok(serde_json::from_slice(bytes)?)
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Shared channel store on Redis.
pub struct RedisChannelStore {
    client: Client,
    prefix: String,
    compare_and_set: Script,
    idle: Mutex<Vec<Connection>>,
}

impl RedisChannelStore {
    /// Connect lazily to the server at `url` (`redis://` or `rediss://`).
    pub fn open(url: &str) -> StoreResult<Self> {
        Self::with_prefix(url, DEFAULT_KEY_PREFIX)
    }

    /// Like [`open`](Self::open), with every key placed under `prefix`.
    pub fn with_prefix(url: &str, prefix: &str) -> StoreResult<Self> {
        Ok(Self {
            client: Client::open(url)?,
            prefix: prefix.to_string(),
            compare_and_set: Script::new(COMPARE_AND_SET),
            idle: Mutex::new(Vec::new()),
        })
    }

    fn key(&self, token: &str) -> String {
        format!("{}{}", self.prefix, token)
    }

    /// Run `f` on a pooled connection. Connections that fail are dropped.
    fn with_connection<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> RedisResult<T>,
    ) -> StoreResult<T> {
        let pooled = self
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop();
        let mut conn = match pooled {
            Some(conn) => conn,
            None => self.client.get_connection_with_timeout(CONNECT_TIMEOUT)?,
        };

        let result = f(&mut conn)?;
        self.idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(conn);
        Ok(result)
    }

    fn read_raw(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.with_connection(|conn| redis::cmd("GET").arg(key).query(conn))
    }
}

impl ChannelStore for RedisChannelStore {
    fn put(&self, token: &str, record: &ChannelRecord, ttl: Duration) -> StoreResult<()> {
        let mut stored = record.clone();
        stored.expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| stored.created_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let json = serde_json::to_vec(&stored)?;

        let key = self.key(token);
        let set: Option<String> = self.with_connection(|conn| {
            redis::cmd("SET")
                .arg(&key)
                .arg(&json)
                .arg("NX")
                .arg("PX")
                .arg(ttl_millis(ttl))
                .query(conn)
        })?;
        match set {
            Some(_) => Ok(()),
            None => Err(StoreError::AlreadyExists(token.to_string())),
        }
    }

    fn get(&self, token: &str) -> StoreResult<Option<ChannelRecord>> {
        let Some(bytes) = self.read_raw(&self.key(token))? else {
            return Ok(None);
        };
        let record = decode(&bytes)?;
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
        let key = self.key(token);
        for _ in 0..CAS_ATTEMPTS {
            let Some(current) = self.read_raw(&key)? else {
                return Ok(Transition::Absent);
            };
            let before = decode(&current)?;
            if before.is_expired_at(Utc::now()) {
                return Ok(Transition::Absent);
            }
            if before.state != expected {
                return Ok(Transition::Conflict(before.state));
            }

            let mut after = before.clone();
            mutation(&mut after);
            let next = serde_json::to_vec(&after)?;

            let swapped: i64 = self.with_connection(|conn| {
                self.compare_and_set
                    .key(&key)
                    .arg(&current)
                    .arg(&next)
                    .invoke(conn)
            })?;
            match swapped {
                1 => return Ok(Transition::Applied { before, after }),
                0 => return Ok(Transition::Absent),
                _ => debug!("Channel record changed during transition, re-reading"),
            }
        }
        Err(StoreError::Contention(token.to_string()))
    }

    fn delete(&self, token: &str) -> StoreResult<bool> {
        let key = self.key(token);
        let removed: i64 = self.with_connection(|conn| redis::cmd("DEL").arg(&key).query(conn))?;
        Ok(removed > 0)
    }

    fn clear(&self) -> StoreResult<()> {
        let pattern = format!("{}*", self.prefix);
        let mut cursor: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = self.with_connection(|conn| {
                redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(SCAN_BATCH)
                    .query(conn)
            })?;
            if !keys.is_empty() {
                self.with_connection(|conn| redis::cmd("DEL").arg(&keys).query::<i64>(conn))?;
            }
            if next == 0 {
                return Ok(());
            }
            cursor = next;
        }
    }

    fn purge_expired(&self, _now: DateTime<Utc>) -> StoreResult<usize> {
        // Redis evicts expired keys itself.
        Ok(0)
    }

    fn health_check(&self) -> StoreResult<()> {
        self.with_connection(|conn| redis::cmd("PING").query::<String>(conn))?;
        Ok(())
    }
}
