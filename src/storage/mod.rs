// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Channel Storage Module
//!
//! Persistent, TTL-aware storage for sign-in channels.
//!
//! ## Storage Layout
//!
//! ```text
//! relay.redb
//!   channels: {token} -> ChannelRecord (JSON)
//!
//! redis://host/db
//!   connect-relay:channel:{token} -> ChannelRecord (JSON), native expiry
//! ```
//!
//! redb holds an exclusive file lock, so it serves one process (any number of
//! handles inside it). Relays running as separate processes share a Redis
//! store instead.
//!
//! ## Consistency
//!
//! Every state change that matters for correctness (attaching the signed
//! payload, consuming it on read) goes through [`ChannelStore::transition`],
//! a single conditional write. Nothing reads a record, edits it locally and
//! writes it back in a separate step.

pub mod channel_store;
pub mod record;
pub mod redb_store;
pub mod redis_store;

pub use channel_store::{ChannelStore, StoreError, StoreResult, Transition};
pub use record::{AuthMethod, AuthPayload, ChannelRecord, ChannelState, ProfileFields, SignatureParams};
pub use redb_store::RedbChannelStore;
pub use redis_store::RedisChannelStore;
