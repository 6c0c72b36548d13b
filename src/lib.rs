// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Connect Relay - Sign-In Channel Relay
//!
//! Brokers a sign-in handshake between an application and a user's wallet.
//! The application opens a short-lived channel, the wallet submits a signed
//! message for it, and the application reads the verified result exactly once.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Channel bearer tokens and the application auth key
//! - `channel` - Channel state machine
//! - `identity` - Custody and verification address lookup
//! - `notify` - In-process completion events
//! - `server` - Server assembly and lifecycle
//! - `storage` - Channel store (redb or Redis)
//! - `sweeper` - Background eviction of expired channels
//! - `verify` - Sign-in message parsing and signature verification

pub mod api;
pub mod auth;
pub mod channel;
pub mod config;
pub mod error;
pub mod identity;
pub mod models;
pub mod notify;
pub mod server;
pub mod state;
pub mod storage;
pub mod sweeper;
pub mod verify;

pub use config::RelayConfig;
pub use server::{RelayServer, ServerError};
