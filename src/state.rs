// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::channel::ChannelService;
use crate::config::DEFAULT_LONG_POLL_TIMEOUT;

#[derive(Clone)]
pub struct AppState {
    pub channels: Arc<ChannelService>,
    /// Upper bound on how long a long-poll status request waits.
    pub long_poll_timeout: Duration,
    /// Cancelled when the server stops; ends pending long polls.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(channels: Arc<ChannelService>) -> Self {
        Self {
            channels,
            long_poll_timeout: DEFAULT_LONG_POLL_TIMEOUT,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_long_poll_timeout(mut self, timeout: Duration) -> Self {
        self.long_poll_timeout = timeout;
        self
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }
}
