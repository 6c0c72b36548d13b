// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Channel Credentials
//!
//! ## Request Flow
//!
//! 1. The app creates a channel and receives its token.
//! 2. App and wallet send `Authorization: Bearer <channel token>` on every
//!    status and authenticate call.
//! 3. The wallet additionally sends the application auth key in
//!    `X-Farcaster-Connect-Auth-Key` when authenticating.
//!
//! ## Security
//!
//! - Channel tokens carry 256 bits of entropy and are never logged in full
//! - The auth key is compared in constant time

pub mod auth_key;
pub mod error;
pub mod extractor;

pub use auth_key::AuthKey;
pub use error::AuthError;
pub use extractor::{AuthKeyHeader, ChannelBearer, AUTH_KEY_HEADER};
