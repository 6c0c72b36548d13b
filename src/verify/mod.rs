// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Signature Verification
//!
//! Validates a signed sign-in message against the identities registered for
//! an account, and binds it to the channel it was submitted to.
//!
//! ## Checks, in order
//!
//! 1. The message parses ([`SignInMessage::parse`]).
//! 2. Its `URI`, `domain` and `Nonce` (plus `Not Before`, `Expiration Time`
//!    and `Request ID` when the channel set them) equal the channel's
//!    [`SignatureParams`] exactly.
//! 3. The `farcaster://fid/{fid}` resource names the submitting account.
//! 4. The current time is inside the message's validity window.
//! 5. The signature verifies against a candidate identity. Custody is tried
//!    first, then verifications in the order given; the first match wins.
//!
//! Any failure collapses into one [`VerificationFailure`] carrying a reason
//! code for logs.

pub mod message;
pub mod scheme;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::storage::{AuthMethod, SignatureParams};

pub use message::{MessageError, SignInMessage};
pub use scheme::{decode_signature, SignatureScheme};

/// Identities allowed to sign for an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateIdentities {
    pub custody: String,
    pub verifications: Vec<String>,
}

/// What the signed message must be bound to.
#[derive(Debug, Clone)]
pub struct SessionBinding<'a> {
    pub params: &'a SignatureParams,
    pub fid: u64,
    pub now: DateTime<Utc>,
}

/// Successful verification outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSigner {
    pub auth_method: AuthMethod,
    /// The candidate identity that matched.
    pub signer: String,
    pub scheme: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    MalformedMessage,
    MalformedSignature,
    ParamsMismatch,
    FidMismatch,
    MessageExpired,
    MessageNotYetValid,
    NoMatchingSigner,
}

impl FailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::MalformedMessage => "malformed_message",
            FailureReason::MalformedSignature => "malformed_signature",
            FailureReason::ParamsMismatch => "params_mismatch",
            FailureReason::FidMismatch => "fid_mismatch",
            FailureReason::MessageExpired => "message_expired",
            FailureReason::MessageNotYetValid => "message_not_yet_valid",
            FailureReason::NoMatchingSigner => "no_matching_signer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("signature verification failed ({}): {detail}", .reason.code())]
pub struct VerificationFailure {
    pub reason: FailureReason,
    pub detail: String,
}

impl VerificationFailure {
    pub(crate) fn new(reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

impl From<MessageError> for VerificationFailure {
    fn from(e: MessageError) -> Self {
        Self::new(FailureReason::MalformedMessage, e.to_string())
    }
}

/// Verify a parsed sign-in message and its signature.
///
/// `text` must be the exact string that was signed; `message` is its parsed form.
pub fn verify(
    text: &str,
    message: &SignInMessage,
    signature: &str,
    candidates: &CandidateIdentities,
    binding: &SessionBinding<'_>,
) -> Result<VerifiedSigner, VerificationFailure> {
    check_binding(message, binding)?;

    let signature = decode_signature(signature).ok_or_else(|| {
        VerificationFailure::new(
            FailureReason::MalformedSignature,
            "signature is neither 0x-hex nor base58",
        )
    })?;

    let ordered = std::iter::once((AuthMethod::Custody, &candidates.custody)).chain(
        candidates
            .verifications
            .iter()
            .map(|identity| (AuthMethod::Verification, identity)),
    );

    let mut length_matched = false;
    for (auth_method, identity) in ordered {
        let Some(scheme) = SignatureScheme::detect(identity) else {
            debug!(identity = %identity, "Skipping identity with unknown encoding");
            continue;
        };
        if signature.len() != scheme.signature_len() {
            continue;
        }
        length_matched = true;
        if scheme.verify(text, &signature) {
            return Ok(VerifiedSigner {
                auth_method,
                signer: identity.clone(),
                scheme: scheme.name(),
            });
        }
    }

    if length_matched {
        Err(VerificationFailure::new(
            FailureReason::NoMatchingSigner,
            "signature does not match any registered identity",
        ))
    } else {
        Err(VerificationFailure::new(
            FailureReason::MalformedSignature,
            format!("no candidate scheme accepts a {}-byte signature", signature.len()),
        ))
    }
}

fn check_binding(
    message: &SignInMessage,
    binding: &SessionBinding<'_>,
) -> Result<(), VerificationFailure> {
    let params = binding.params;
    let mismatch = |field: &str| {
        VerificationFailure::new(
            FailureReason::ParamsMismatch,
            format!("{field} does not match the channel"),
        )
    };

    if message.uri != params.siwe_uri {
        return Err(mismatch("uri"));
    }
    if message.domain != params.domain {
        return Err(mismatch("domain"));
    }
    if message.nonce != params.nonce {
        return Err(mismatch("nonce"));
    }
    if params.not_before.is_some() && message.not_before != params.not_before {
        return Err(mismatch("notBefore"));
    }
    if params.expiration_time.is_some() && message.expiration_time != params.expiration_time {
        return Err(mismatch("expirationTime"));
    }
    if params.request_id.is_some() && message.request_id != params.request_id {
        return Err(mismatch("requestId"));
    }

    match message.fid() {
        Some(fid) if fid == binding.fid => {}
        Some(fid) => {
            return Err(VerificationFailure::new(
                FailureReason::FidMismatch,
                format!("message fid {fid} differs from submitted fid {}", binding.fid),
            ))
        }
        None => {
            return Err(VerificationFailure::new(
                FailureReason::FidMismatch,
                "message carries no fid resource",
            ))
        }
    }

    if message.expiration().is_some_and(|exp| binding.now >= exp) {
        return Err(VerificationFailure::new(
            FailureReason::MessageExpired,
            "message expiration time has passed",
        ));
    }
    if message.not_before_time().is_some_and(|nbf| binding.now < nbf) {
        return Err(VerificationFailure::new(
            FailureReason::MessageNotYetValid,
            "message is not valid yet",
        ));
    }

    Ok(())
}
