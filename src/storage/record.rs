// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persisted channel record.
//!
//! One record per channel token, serialized as JSON. Field names are camelCase
//! so the stored layout matches what the API returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle state of a channel.
///
/// Transitions only move forward: `pending → completed → closed`, or
/// `pending → closed` through expiry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    Pending,
    Completed,
    Closed,
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelState::Pending => write!(f, "pending"),
            ChannelState::Completed => write!(f, "completed"),
            ChannelState::Closed => write!(f, "closed"),
        }
    }
}

/// Which identity produced the signature.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// The account's primary registered signer.
    Custody,
    /// A secondary address linked to the account.
    Verification,
}

/// Session-binding parameters fixed at channel creation.
///
/// The signed message must reproduce these exactly.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignatureParams {
    pub siwe_uri: String,
    pub domain: String,
    pub nonce: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Profile metadata submitted by the wallet alongside the signature.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pfp_url: Option<String>,
}

/// Signed result attached when a channel completes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    pub message: String,
    pub signature: String,
    pub auth_method: AuthMethod,
    /// Identity whose key produced `signature`.
    pub signer: String,
    pub fid: u64,
    pub custody: String,
    pub verifications: Vec<String>,
    #[serde(flatten)]
    pub profile: ProfileFields,
}

/// A stored channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRecord {
    pub token: String,
    pub state: ChannelState,
    pub siwe_params: SignatureParams,
    pub accept_auth_address: bool,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_payload: Option<AuthPayload>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ChannelRecord {
    /// Build a fresh `pending` record expiring `ttl` after now.
    pub fn new_pending(
        token: String,
        siwe_params: SignatureParams,
        accept_auth_address: bool,
        url: String,
        ttl: std::time::Duration,
    ) -> Self {
        let created_at = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let expires_at = created_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            token,
            state: ChannelState::Pending,
            siwe_params,
            accept_auth_address,
            url,
            auth_payload: None,
            created_at,
            expires_at,
        }
    }

    /// Whether the record is past its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
