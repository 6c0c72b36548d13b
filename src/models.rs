// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the relay API. All types derive `ToSchema`
//! for OpenAPI documentation and use camelCase field names on the wire.
//!
//! ## Model Categories
//!
//! - **Channel creation**: opening a channel and handing its deep link to the app
//! - **Channel status**: the pending view and the one-time completed view
//! - **Authentication**: what the wallet submits for a pending channel

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::channel::{Authentication, NewChannel};
use crate::storage::{AuthMethod, ChannelRecord, ChannelState, ProfileFields, SignatureParams};

// =============================================================================
// Channel Creation
// =============================================================================

/// Request to open a new sign-in channel.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateChannelRequest {
    /// URI of the application requesting sign-in.
    pub siwe_uri: String,
    /// Domain of the application requesting sign-in.
    pub domain: String,
    /// Replay-protection nonce. Generated when omitted.
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub not_before: Option<String>,
    #[serde(default)]
    pub expiration_time: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    /// Whether a custody-address response is acceptable.
    #[serde(default = "default_accept_auth_address")]
    pub accept_auth_address: bool,
}

fn default_accept_auth_address() -> bool {
    true
}

impl From<CreateChannelRequest> for NewChannel {
    fn from(request: CreateChannelRequest) -> Self {
        NewChannel {
            siwe_uri: request.siwe_uri,
            domain: request.domain,
            nonce: request.nonce,
            not_before: request.not_before,
            expiration_time: request.expiration_time,
            request_id: request.request_id,
            accept_auth_address: request.accept_auth_address,
        }
    }
}

/// A freshly created channel.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateChannelResponse {
    /// Bearer token for every later call on this channel.
    pub channel_token: String,
    /// Deep link to hand to the wallet.
    pub url: String,
    pub nonce: String,
}

impl From<ChannelRecord> for CreateChannelResponse {
    fn from(record: ChannelRecord) -> Self {
        CreateChannelResponse {
            channel_token: record.token,
            url: record.url,
            nonce: record.siwe_params.nonce,
        }
    }
}

// =============================================================================
// Channel Status
// =============================================================================

/// Channel view returned by status and authenticate.
///
/// The signed fields are present only in the completed view.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatusResponse {
    pub state: ChannelState,
    pub nonce: String,
    pub url: String,
    pub signature_params: SignatureParams,
    pub accept_auth_address: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<AuthMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fid: Option<u64>,
    /// Identity whose key produced the signature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custody: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifications: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pfp_url: Option<String>,
}

impl From<ChannelRecord> for ChannelStatusResponse {
    fn from(record: ChannelRecord) -> Self {
        let mut response = ChannelStatusResponse {
            state: record.state,
            nonce: record.siwe_params.nonce.clone(),
            url: record.url,
            signature_params: record.siwe_params,
            accept_auth_address: record.accept_auth_address,
            message: None,
            signature: None,
            auth_method: None,
            fid: None,
            signer: None,
            custody: None,
            verifications: None,
            username: None,
            bio: None,
            display_name: None,
            pfp_url: None,
        };

        if let Some(payload) = record.auth_payload {
            response.message = Some(payload.message);
            response.signature = Some(payload.signature);
            response.auth_method = Some(payload.auth_method);
            response.fid = Some(payload.fid);
            response.signer = Some(payload.signer);
            response.custody = Some(payload.custody);
            response.verifications = Some(payload.verifications);
            response.username = payload.profile.username;
            response.bio = payload.profile.bio;
            response.display_name = payload.profile.display_name;
            response.pfp_url = payload.profile.pfp_url;
        }
        response
    }
}

// =============================================================================
// Authentication
// =============================================================================

/// Signed sign-in message submitted by the wallet.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateRequest {
    pub message: String,
    /// `0x`-prefixed hex, or base58 for ed25519 signers.
    pub signature: String,
    pub fid: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub pfp_url: Option<String>,
    /// Linked addresses. Ignored when identities come from a hub.
    #[serde(default)]
    pub verifications: Vec<String>,
}

impl From<AuthenticateRequest> for Authentication {
    fn from(request: AuthenticateRequest) -> Self {
        Authentication {
            message: request.message,
            signature: request.signature,
            fid: request.fid,
            profile: ProfileFields {
                username: request.username,
                bio: request.bio,
                display_name: request.display_name,
                pfp_url: request.pfp_url,
            },
            verifications: request.verifications,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::AuthPayload;

    fn pending_record() -> ChannelRecord {
        ChannelRecord::new_pending(
            "tok".to_string(),
            SignatureParams {
                siwe_uri: "https://example.com".to_string(),
                domain: "example.com".to_string(),
                nonce: "abcd1234".to_string(),
                not_before: None,
                expiration_time: None,
                request_id: None,
            },
            true,
            "https://warpcast.com/~/sign-in-with-farcaster?channelToken=tok".to_string(),
            std::time::Duration::from_secs(60),
        )
    }

    #[test]
    fn create_request_defaults() {
        let request: CreateChannelRequest = serde_json::from_value(serde_json::json!({
            "siweUri": "https://example.com",
            "domain": "example.com"
        }))
        .unwrap();
        assert!(request.nonce.is_none());
        assert!(request.accept_auth_address);
    }

    #[test]
    fn pending_view_omits_payload_fields() {
        let json = serde_json::to_value(ChannelStatusResponse::from(pending_record())).unwrap();
        assert_eq!(json["state"], "pending");
        assert_eq!(json["nonce"], "abcd1234");
        assert_eq!(json["signatureParams"]["siweUri"], "https://example.com");
        assert_eq!(json["acceptAuthAddress"], true);
        assert!(json.get("message").is_none());
        assert!(json.get("authMethod").is_none());
    }

    #[test]
    fn completed_view_flattens_payload() {
        let mut record = pending_record();
        record.state = ChannelState::Completed;
        record.auth_payload = Some(AuthPayload {
            message: "msg".to_string(),
            signature: "0xsig".to_string(),
            auth_method: AuthMethod::Custody,
            signer: "0xabc".to_string(),
            fid: 1,
            custody: "0xabc".to_string(),
            verifications: vec!["0xdef".to_string()],
            profile: ProfileFields {
                username: Some("alice".to_string()),
                ..ProfileFields::default()
            },
        });

        let json = serde_json::to_value(ChannelStatusResponse::from(record)).unwrap();
        assert_eq!(json["state"], "completed");
        assert_eq!(json["message"], "msg");
        assert_eq!(json["authMethod"], "custody");
        assert_eq!(json["fid"], 1);
        assert_eq!(json["username"], "alice");
        assert!(json.get("bio").is_none());
    }

    #[test]
    fn authenticate_request_maps_profile() {
        let request: AuthenticateRequest = serde_json::from_value(serde_json::json!({
            "message": "m",
            "signature": "0x00",
            "fid": 1,
            "displayName": "Alice",
            "pfpUrl": "https://example.com/a.png"
        }))
        .unwrap();
        let auth = Authentication::from(request);
        assert_eq!(auth.profile.display_name.as_deref(), Some("Alice"));
        assert_eq!(auth.profile.pfp_url.as_deref(), Some("https://example.com/a.png"));
        assert!(auth.verifications.is_empty());
    }
}
