// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use connect_relay::config::LOG_FORMAT_ENV;
use connect_relay::{RelayConfig, RelayServer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = RelayConfig::from_env();
    info!(
        store = %config.store_location(),
        ttl_secs = config.ttl.as_secs(),
        identity = ?config.identity_mode,
        hub = config.hub_url.as_deref().unwrap_or("unset"),
        "Starting connect relay"
    );

    let mut server = match RelayServer::new(config) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "Failed to initialize relay");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.start().await {
        error!(error = %e, "Failed to start relay");
        std::process::exit(1);
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
    server.stop().await;
}
