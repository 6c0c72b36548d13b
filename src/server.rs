// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Relay Server
//!
//! Wires configuration, the channel store, the channel service and the HTTP
//! router into one explicit value that can be started and stopped. Several
//! servers may share one store handle; each still runs its own listener,
//! notifier and sweeper.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::api::router;
use crate::auth::AuthKey;
use crate::channel::ChannelService;
use crate::config::{RelayConfig, StoreLocation};
use crate::identity::{IdentityError, IdentitySource};
use crate::notify::EventNotifier;
use crate::state::AppState;
use crate::storage::{ChannelStore, RedbChannelStore, RedisChannelStore, StoreError};
use crate::sweeper::ExpirySweeper;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to open channel store: {0}")]
    Store(#[from] StoreError),

    #[error("invalid identity source: {0}")]
    Identity(#[from] IdentityError),

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server already started")]
    AlreadyStarted,
}

pub struct RelayServer {
    config: RelayConfig,
    store: Arc<dyn ChannelStore>,
    channels: Arc<ChannelService>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl RelayServer {
    /// Build a server with the store named by `config.store_path`.
    pub fn new(config: RelayConfig) -> Result<Self, ServerError> {
        let store: Arc<dyn ChannelStore> = match config.store_location() {
            StoreLocation::Memory => Arc::new(RedbChannelStore::in_memory()?),
            StoreLocation::File(path) => Arc::new(RedbChannelStore::open(&path)?),
            StoreLocation::Redis(url) => Arc::new(RedisChannelStore::open(&url)?),
        };
        Self::with_store(config, store)
    }

    /// Build a server over an existing store handle.
    pub fn with_store(
        config: RelayConfig,
        store: Arc<dyn ChannelStore>,
    ) -> Result<Self, ServerError> {
        let identities =
            IdentitySource::from_config(config.identity_mode, config.hub_url.as_deref())?;
        if matches!(identities, IdentitySource::Embedded) {
            warn!("Embedded identity source: fid ownership is NOT verified, any key can sign in as any fid");
        }
        let channels = Arc::new(ChannelService::new(
            Arc::clone(&store),
            identities,
            EventNotifier::new(),
            AuthKey::new(&config.auth_key),
            config.ttl,
            config.connect_uri_base.clone(),
        ));

        Ok(Self {
            config,
            store,
            channels,
            shutdown: CancellationToken::new(),
            tasks: Vec::new(),
            local_addr: None,
        })
    }

    /// The channel store. `channels().clear()` drops every channel.
    pub fn channels(&self) -> &Arc<dyn ChannelStore> {
        &self.store
    }

    pub fn service(&self) -> &Arc<ChannelService> {
        &self.channels
    }

    /// Address the listener is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Bind the listener and start serving in the background.
    pub async fn start(&mut self) -> Result<SocketAddr, ServerError> {
        if self.local_addr.is_some() {
            return Err(ServerError::AlreadyStarted);
        }

        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;

        let state = AppState::new(Arc::clone(&self.channels))
            .with_long_poll_timeout(self.config.long_poll_timeout)
            .with_shutdown(self.shutdown.clone());
        let app = router(state, &self.config.cors_origin);

        let shutdown = self.shutdown.clone();
        self.tasks.push(tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "HTTP server failed");
            }
        }));

        let sweeper = ExpirySweeper::new(Arc::clone(&self.store), self.config.sweep_interval);
        self.tasks.push(tokio::spawn(sweeper.run(self.shutdown.clone())));

        self.local_addr = Some(addr);
        info!(%addr, "Relay server listening (docs at /docs)");
        Ok(addr)
    }

    /// Stop accepting requests and wait for background tasks to finish.
    pub async fn stop(&mut self) {
        self.shutdown.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }
        if self.local_addr.take().is_some() {
            info!("Relay server stopped");
        }
    }
}

impl Drop for RelayServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdentityMode;
    use serde_json::{json, Value};
    use std::time::{Duration, Instant};

    fn create_body() -> Value {
        json!({
            "siweUri": "https://example.com",
            "domain": "example.com",
            "nonce": "abcd1234"
        })
    }

    #[tokio::test]
    async fn start_serves_and_stop_shuts_down() {
        let mut server = RelayServer::new(RelayConfig::ephemeral()).unwrap();
        let addr = server.start().await.unwrap();
        assert!(matches!(server.start().await, Err(ServerError::AlreadyStarted)));

        let client = reqwest::Client::new();
        let live = client
            .get(format!("http://{addr}/health/live"))
            .send()
            .await
            .unwrap();
        assert_eq!(live.status(), reqwest::StatusCode::OK);

        let created = client
            .post(format!("http://{addr}/v1/channel"))
            .json(&create_body())
            .send()
            .await
            .unwrap();
        assert_eq!(created.status(), reqwest::StatusCode::CREATED);
        let body: Value = created.json().await.unwrap();
        let token = body["channelToken"].as_str().unwrap().to_string();

        server.channels().clear().unwrap();
        let status = client
            .get(format!("http://{addr}/v1/channel/status"))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert_eq!(status.status(), reqwest::StatusCode::UNAUTHORIZED);

        server.stop().await;
        assert!(server.local_addr().is_none());
        assert!(client
            .get(format!("http://{addr}/health/live"))
            .send()
            .await
            .is_err());
    }

    #[tokio::test]
    async fn servers_sharing_a_store_see_the_same_channels() {
        let store: Arc<dyn ChannelStore> = Arc::new(RedbChannelStore::in_memory().unwrap());
        let mut first = RelayServer::with_store(RelayConfig::ephemeral(), Arc::clone(&store)).unwrap();
        let mut second = RelayServer::with_store(RelayConfig::ephemeral(), store).unwrap();
        let first_addr = first.start().await.unwrap();
        let second_addr = second.start().await.unwrap();

        let client = reqwest::Client::new();
        let body: Value = client
            .post(format!("http://{first_addr}/v1/channel"))
            .json(&create_body())
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let token = body["channelToken"].as_str().unwrap();

        let status = client
            .get(format!("http://{second_addr}/v1/channel/status"))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        assert_eq!(status.status(), reqwest::StatusCode::ACCEPTED);

        first.stop().await;
        second.stop().await;
    }

    #[test]
    fn file_store_path_opens_redb() {
        let dir = tempfile::tempdir().unwrap();
        let config = RelayConfig {
            store_path: dir.path().join("relay.redb").display().to_string(),
            ..RelayConfig::ephemeral()
        };
        let server = RelayServer::new(config).unwrap();
        server.channels().health_check().unwrap();
        assert!(dir.path().join("relay.redb").exists());
    }

    #[test]
    fn hub_mode_without_hub_url_fails_to_build() {
        let config = RelayConfig {
            identity_mode: IdentityMode::Hub,
            hub_url: None,
            ..RelayConfig::ephemeral()
        };
        assert!(matches!(
            RelayServer::new(config),
            Err(ServerError::Identity(IdentityError::HubNotConfigured))
        ));
    }

    #[test]
    fn redis_url_selects_shared_store() {
        // Nothing listens on port 1: construction is lazy, the first call fails
        let config = RelayConfig {
            store_path: "redis://127.0.0.1:1/".to_string(),
            ..RelayConfig::ephemeral()
        };
        let server = RelayServer::new(config).unwrap();
        assert!(matches!(
            server.channels().health_check(),
            Err(StoreError::Redis(_))
        ));
    }

    #[tokio::test]
    async fn stop_does_not_wait_for_long_polls() {
        let config = RelayConfig {
            long_poll_timeout: Duration::from_secs(60),
            ..RelayConfig::ephemeral()
        };
        let mut server = RelayServer::new(config).unwrap();
        let addr = server.start().await.unwrap();

        let client = reqwest::Client::new();
        let body: Value = client
            .post(format!("http://{addr}/v1/channel"))
            .json(&create_body())
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let token = body["channelToken"].as_str().unwrap().to_string();

        let poll = tokio::spawn(
            client
                .get(format!("http://{addr}/v1/channel/status/long-poll"))
                .bearer_auth(token)
                .send(),
        );
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = Instant::now();
        tokio::time::timeout(Duration::from_secs(10), server.stop())
            .await
            .expect("stop returns before the long-poll timeout");
        assert!(started.elapsed() < Duration::from_secs(10));

        let response = poll.await.unwrap().unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
    }
}
