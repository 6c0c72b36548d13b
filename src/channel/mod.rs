// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Channel State Machine
//!
//! ```text
//!            authenticate              status (first read)
//! pending ───────────────▶ completed ───────────────────▶ closed
//!    │                                                      ▲
//!    └──────────────────────── TTL ─────────────────────────┘
//! ```
//!
//! Every arrow is one [`ChannelStore::transition`] call, so the outcome of
//! racing requests is decided by the store and not by anything held in this
//! process. Several [`ChannelService`] instances may share one store.

pub mod connect_uri;
pub mod token;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::auth::AuthKey;
use crate::error::RelayError;
use crate::identity::{IdentityError, IdentitySource};
use crate::notify::{ChannelEvent, ChannelEventKind, EventNotifier};
use crate::storage::{
    AuthPayload, ChannelRecord, ChannelState, ChannelStore, ProfileFields, SignatureParams,
    StoreError, Transition,
};
use crate::verify::{self, FailureReason, SessionBinding, SignInMessage, VerificationFailure};

pub use connect_uri::{build_connect_uri, parse_connect_uri, ConnectUri};
pub use token::token_prefix;

/// Attempts at drawing a token that is not already live in the store.
const TOKEN_ATTEMPTS: usize = 3;

/// Input to [`ChannelService::create`].
#[derive(Debug, Clone)]
pub struct NewChannel {
    pub siwe_uri: String,
    pub domain: String,
    /// Generated when absent.
    pub nonce: Option<String>,
    pub not_before: Option<String>,
    pub expiration_time: Option<String>,
    pub request_id: Option<String>,
    pub accept_auth_address: bool,
}

/// Input to [`ChannelService::authenticate`].
#[derive(Debug, Clone)]
pub struct Authentication {
    pub message: String,
    pub signature: String,
    pub fid: u64,
    pub profile: ProfileFields,
    /// Only consulted when identities are not resolved through a hub.
    pub verifications: Vec<String>,
}

/// What a status read observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Still waiting for the wallet. Repeatable.
    Pending(ChannelRecord),
    /// The completed record, delivered to this reader only. The channel is
    /// closed by the time this is returned.
    Completed(ChannelRecord),
}

/// Channel lifecycle operations over a shared store.
pub struct ChannelService {
    store: Arc<dyn ChannelStore>,
    identities: IdentitySource,
    notifier: EventNotifier,
    auth_key: AuthKey,
    ttl: Duration,
    connect_uri_base: String,
}

impl ChannelService {
    pub fn new(
        store: Arc<dyn ChannelStore>,
        identities: IdentitySource,
        notifier: EventNotifier,
        auth_key: AuthKey,
        ttl: Duration,
        connect_uri_base: impl Into<String>,
    ) -> Self {
        Self {
            store,
            identities,
            notifier,
            auth_key,
            ttl,
            connect_uri_base: connect_uri_base.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ChannelStore> {
        &self.store
    }

    pub fn notifier(&self) -> &EventNotifier {
        &self.notifier
    }

    /// Open a new pending channel.
    pub fn create(&self, request: NewChannel) -> Result<ChannelRecord, RelayError> {
        let siwe_uri = require("siweUri", request.siwe_uri)?;
        let domain = require("domain", request.domain)?;
        url::Url::parse(&siwe_uri)
            .map_err(|e| RelayError::Validation(format!("siweUri is not a valid URI: {e}")))?;

        let nonce = match request.nonce {
            Some(nonce) => require("nonce", nonce)?,
            None => token::generate_nonce()?,
        };

        let params = SignatureParams {
            siwe_uri,
            domain,
            nonce,
            not_before: request.not_before,
            expiration_time: request.expiration_time,
            request_id: request.request_id,
        };

        for _ in 0..TOKEN_ATTEMPTS {
            let token = token::generate_token()?;
            let url = build_connect_uri(&self.connect_uri_base, &token, &params)?;
            let record = ChannelRecord::new_pending(
                token.clone(),
                params.clone(),
                request.accept_auth_address,
                url,
                self.ttl,
            );

            match self.store.put(&token, &record, self.ttl) {
                Ok(()) => {
                    info!(
                        token = token_prefix(&token),
                        domain = %record.siwe_params.domain,
                        "Channel created"
                    );
                    return Ok(record);
                }
                Err(StoreError::AlreadyExists(_)) => {
                    warn!("Channel token collision, drawing a new token");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(RelayError::Internal(
            "could not allocate a unique channel token".to_string(),
        ))
    }

    /// Read a channel. A completed channel is closed by the read that returns it.
    pub fn status(&self, token: &str) -> Result<ChannelStatus, RelayError> {
        let record = self
            .store
            .get(token)?
            .ok_or(RelayError::NotFoundOrExpired)?;

        match record.state {
            ChannelState::Pending => Ok(ChannelStatus::Pending(record)),
            ChannelState::Closed => Err(RelayError::NotFoundOrExpired),
            ChannelState::Completed => {
                let outcome = self.store.transition(token, ChannelState::Completed, &mut |r: &mut ChannelRecord| {
                    r.state = ChannelState::Closed;
                    r.auth_payload = None;
                })?;
                match outcome {
                    Transition::Applied { before, .. } => {
                        info!(token = token_prefix(token), "Channel payload delivered and closed");
                        Ok(ChannelStatus::Completed(before))
                    }
                    Transition::Conflict(_) | Transition::Absent => {
                        debug!(token = token_prefix(token), "Lost consume-on-read race");
                        Err(RelayError::NotFoundOrExpired)
                    }
                }
            }
        }
    }

    /// Submit a signed message for a pending channel.
    ///
    /// On verification failure the channel stays pending and the wallet may retry.
    pub async fn authenticate(
        &self,
        token: &str,
        auth_key: &str,
        request: Authentication,
    ) -> Result<ChannelRecord, RelayError> {
        if !self.auth_key.matches(auth_key) {
            warn!(token = token_prefix(token), "Rejected authenticate with invalid auth key");
            return Err(RelayError::InvalidAuthKey);
        }
        let message_text = require("message", request.message)?;
        let signature = require("signature", request.signature)?;

        let record = self
            .store
            .get(token)?
            .ok_or(RelayError::NotFoundOrExpired)?;
        match record.state {
            ChannelState::Pending => {}
            ChannelState::Completed => return Err(RelayError::Conflict),
            ChannelState::Closed => return Err(RelayError::NotFoundOrExpired),
        }

        let message = SignInMessage::parse(&message_text).map_err(VerificationFailure::from)?;
        let candidates = match self
            .identities
            .resolve(request.fid, &message, &request.verifications)
            .await
        {
            Ok(candidates) => candidates,
            Err(IdentityError::UnknownFid(fid)) => {
                return Err(VerificationFailure::new(
                    FailureReason::NoMatchingSigner,
                    format!("fid {fid} is not registered"),
                )
                .into());
            }
            Err(e) => return Err(e.into()),
        };

        let verified = verify::verify(
            &message_text,
            &message,
            &signature,
            &candidates,
            &SessionBinding {
                params: &record.siwe_params,
                fid: request.fid,
                now: Utc::now(),
            },
        )?;

        let payload = AuthPayload {
            message: message_text,
            signature,
            auth_method: verified.auth_method,
            signer: verified.signer,
            fid: request.fid,
            custody: candidates.custody,
            verifications: candidates.verifications,
            profile: request.profile,
        };

        // The store may re-run the mutation after losing a compare-and-set.
        let outcome = self.store.transition(token, ChannelState::Pending, &mut |r: &mut ChannelRecord| {
            r.state = ChannelState::Completed;
            r.auth_payload = Some(payload.clone());
        })?;

        match outcome {
            Transition::Applied { after, .. } => {
                info!(
                    token = token_prefix(token),
                    fid = request.fid,
                    scheme = verified.scheme,
                    "Channel authenticated"
                );
                self.notifier.publish(ChannelEvent {
                    token: token.to_string(),
                    kind: ChannelEventKind::Completed,
                });
                Ok(after)
            }
            Transition::Conflict(state) => {
                debug!(token = token_prefix(token), %state, "Lost authenticate race");
                Err(RelayError::Conflict)
            }
            Transition::Absent => Err(RelayError::NotFoundOrExpired),
        }
    }
}

fn require(field: &str, value: String) -> Result<String, RelayError> {
    if value.trim().is_empty() {
        return Err(RelayError::Validation(format!("{field} is required")));
    }
    Ok(value)
}
