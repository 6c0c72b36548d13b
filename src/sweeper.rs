// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Expiry Sweeper
//!
//! Background task that periodically evicts expired channels from the store.
//! Reads already treat expired records as absent, so the sweeper only bounds
//! how long dead records occupy storage.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::storage::ChannelStore;

pub struct ExpirySweeper {
    store: Arc<dyn ChannelStore>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(store: Arc<dyn ChannelStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Run the sweep loop until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Expiry sweeper starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Expiry sweeper shutting down");
                    return;
                }
            }

            self.sweep_step();
        }
    }

    /// Evict every record expired as of now. Returns the eviction count.
    pub fn sweep_step(&self) -> usize {
        match self.store.purge_expired(Utc::now()) {
            Ok(0) => 0,
            Ok(evicted) => {
                debug!(evicted, "Evicted expired channels");
                evicted
            }
            Err(e) => {
                warn!(error = %e, "Expiry sweep failed, will retry");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ChannelRecord, RedbChannelStore, SignatureParams};

    fn record(token: &str, ttl: Duration) -> ChannelRecord {
        ChannelRecord::new_pending(
            token.to_string(),
            SignatureParams {
                siwe_uri: "https://example.com".to_string(),
                domain: "example.com".to_string(),
                nonce: "abcd1234".to_string(),
                not_before: None,
                expiration_time: None,
                request_id: None,
            },
            true,
            format!("https://relay.test/connect?channelToken={token}"),
            ttl,
        )
    }

    #[tokio::test]
    async fn sweep_evicts_only_expired() {
        let store: Arc<dyn ChannelStore> = Arc::new(RedbChannelStore::in_memory().unwrap());
        store
            .put("short", &record("short", Duration::from_millis(1)), Duration::from_millis(1))
            .unwrap();
        store
            .put("long", &record("long", Duration::from_secs(300)), Duration::from_secs(300))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let sweeper = ExpirySweeper::new(Arc::clone(&store), Duration::from_secs(60));
        assert_eq!(sweeper.sweep_step(), 1);
        assert!(store.get("long").unwrap().is_some());
        assert_eq!(sweeper.sweep_step(), 0);
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let store: Arc<dyn ChannelStore> = Arc::new(RedbChannelStore::in_memory().unwrap());
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(
            ExpirySweeper::new(store, Duration::from_millis(5)).run(shutdown.clone()),
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper exits after cancel")
            .unwrap();
    }
}
