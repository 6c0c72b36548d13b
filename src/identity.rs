// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Resolution of an account's signing identities.
//!
//! Before a signature can be checked the relay needs the account's custody
//! address and its verified addresses. Two sources exist:
//!
//! - **Hub**: query a hub's HTTP API by `fid`. Verifications submitted by the
//!   wallet are ignored.
//! - **Embedded**: trust the address written in the signed message as custody
//!   and take verifications from the request. The signature still has to
//!   recover to one of them, but nothing ties that address to the `fid`: any
//!   key can claim any account. Only selected explicitly, for development.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::IdentityMode;
use crate::verify::{CandidateIdentities, SignInMessage};

const HUB_TIMEOUT: Duration = Duration::from_secs(10);
const SOLANA_PROTOCOL: &str = "PROTOCOL_SOLANA";

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("hub request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid hub URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("fid {0} has no custody address")]
    UnknownFid(u64),

    #[error("hub identity source selected but no hub URL configured")]
    HubNotConfigured,
}

/// Where candidate identities come from.
#[derive(Debug, Clone)]
pub enum IdentitySource {
    Hub(HubClient),
    Embedded,
}

impl IdentitySource {
    pub fn from_config(mode: IdentityMode, hub_url: Option<&str>) -> Result<Self, IdentityError> {
        match (mode, hub_url) {
            (IdentityMode::Hub, Some(url)) => Ok(IdentitySource::Hub(HubClient::new(url)?)),
            (IdentityMode::Hub, None) => Err(IdentityError::HubNotConfigured),
            (IdentityMode::Embedded, _) => Ok(IdentitySource::Embedded),
        }
    }

    /// Candidate identities for `fid`.
    pub async fn resolve(
        &self,
        fid: u64,
        message: &SignInMessage,
        submitted_verifications: &[String],
    ) -> Result<CandidateIdentities, IdentityError> {
        match self {
            IdentitySource::Hub(hub) => hub.resolve(fid).await,
            IdentitySource::Embedded => Ok(CandidateIdentities {
                custody: message.address.clone(),
                verifications: submitted_verifications.to_vec(),
            }),
        }
    }
}

// =============================================================================
// Hub HTTP API
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdRegistryEvent {
    id_register_event_body: IdRegisterEventBody,
}

#[derive(Debug, Deserialize)]
struct IdRegisterEventBody {
    to: String,
}

#[derive(Debug, Deserialize)]
struct VerificationsResponse {
    #[serde(default)]
    messages: Vec<HubMessage>,
}

#[derive(Debug, Deserialize)]
struct HubMessage {
    data: HubMessageData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HubMessageData {
    #[serde(default, alias = "verificationAddEthAddressBody")]
    verification_add_address_body: Option<VerificationBody>,
}

#[derive(Debug, Deserialize)]
struct VerificationBody {
    address: String,
    #[serde(default)]
    protocol: Option<String>,
}

impl VerificationBody {
    /// Hubs return every address hex-encoded; Solana keys are re-encoded as base58.
    fn into_identity(self) -> String {
        if self.protocol.as_deref() == Some(SOLANA_PROTOCOL) {
            if let Some(bytes) = self
                .address
                .strip_prefix("0x")
                .and_then(|hex| alloy::hex::decode(hex).ok())
            {
                return bs58::encode(bytes).into_string();
            }
        }
        self.address
    }
}

/// Client for a hub's HTTP API.
///
/// Endpoints are resolved relative to the base, so a base with a path
/// (`https://host/hub`) keeps it whether or not it ends in `/`.
#[derive(Debug, Clone)]
pub struct HubClient {
    base: url::Url,
    http: reqwest::Client,
}

impl HubClient {
    pub fn new(base: &str) -> Result<Self, IdentityError> {
        let http = reqwest::Client::builder().timeout(HUB_TIMEOUT).build()?;
        let mut base = url::Url::parse(base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base, http })
    }

    pub async fn resolve(&self, fid: u64) -> Result<CandidateIdentities, IdentityError> {
        let custody = self.custody_address(fid).await?;
        let verifications = match self.verifications(fid).await {
            Ok(verifications) => verifications,
            Err(e) => {
                // Custody alone is enough to authenticate.
                warn!(fid, error = %e, "Hub verification lookup failed");
                Vec::new()
            }
        };
        debug!(fid, verifications = verifications.len(), "Resolved identities from hub");
        Ok(CandidateIdentities {
            custody,
            verifications,
        })
    }

    async fn custody_address(&self, fid: u64) -> Result<String, IdentityError> {
        let mut url = self.base.join("v1/onChainIdRegistryEventByFid")?;
        url.query_pairs_mut().append_pair("fid", &fid.to_string());

        let response = self.http.get(url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(IdentityError::UnknownFid(fid));
        }
        let event: IdRegistryEvent = response.error_for_status()?.json().await?;
        Ok(event.id_register_event_body.to)
    }

    async fn verifications(&self, fid: u64) -> Result<Vec<String>, IdentityError> {
        let mut url = self.base.join("v1/verificationsByFid")?;
        url.query_pairs_mut().append_pair("fid", &fid.to_string());

        let response: VerificationsResponse = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(parse_verifications(response))
    }
}

fn parse_verifications(response: VerificationsResponse) -> Vec<String> {
    response
        .messages
        .into_iter()
        .filter_map(|m| m.data.verification_add_address_body)
        .map(VerificationBody::into_identity)
        .collect()
}
