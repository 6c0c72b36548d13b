// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Best-effort completion events.
//!
//! Lets long-poll status requests wake as soon as a channel completes instead
//! of waiting out their timeout. Events are in-process only and may be missed
//! (no receivers, lagging receiver, another instance completed the channel);
//! the status read through the store is always authoritative.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const EVENT_BUFFER: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEventKind {
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEvent {
    pub token: String,
    pub kind: ChannelEventKind,
}

/// Publish/subscribe hub for channel events.
#[derive(Debug, Clone)]
pub struct EventNotifier {
    sender: broadcast::Sender<ChannelEvent>,
}

impl Default for EventNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl EventNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        Self { sender }
    }

    /// Publish an event. Never fails; returns how many subscribers saw it.
    pub fn publish(&self, event: ChannelEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe before checking state so a completion between the check and
    /// the wait is not lost.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }
}

pub struct Subscription {
    receiver: broadcast::Receiver<ChannelEvent>,
}

impl Subscription {
    /// Wait until `token` completes, `timeout` elapses or `shutdown` is
    /// cancelled.
    ///
    /// Returns `true` on a matching completion event. A lagged receiver
    /// returns `true` too, so the caller re-reads the store instead of waiting
    /// on events it may have dropped.
    pub async fn wait_for_completion(
        mut self,
        token: &str,
        timeout: Duration,
        shutdown: &CancellationToken,
    ) -> bool {
        let wait = async {
            loop {
                match self.receiver.recv().await {
                    Ok(event) if event.token == token && event.kind == ChannelEventKind::Completed => {
                        return true;
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Event subscriber lagged");
                        return true;
                    }
                    Err(broadcast::error::RecvError::Closed) => return false,
                }
            }
        };
        tokio::select! {
            woken = tokio::time::timeout(timeout, wait) => woken.unwrap_or(false),
            _ = shutdown.cancelled() => {
                debug!("Shutdown cut a completion wait short");
                false
            }
        }
    }
}
