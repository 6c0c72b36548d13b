// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::identity::IdentityError;
use crate::storage::StoreError;
use crate::verify::VerificationFailure;

/// Outcome of a channel operation that did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Malformed input; nothing was changed.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Channel absent, expired, closed or already consumed.
    #[error("channel not found or expired")]
    NotFoundOrExpired,

    /// The channel stays pending and the caller may retry.
    #[error(transparent)]
    Verification(#[from] VerificationFailure),

    /// Another request won the state transition first.
    #[error("channel is no longer pending")]
    Conflict,

    #[error("invalid auth key")]
    InvalidAuthKey,

    #[error("identity lookup failed: {0}")]
    IdentityLookup(#[from] IdentityError),

    #[error("channel store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::Validation(msg) => ApiError::bad_request(msg),
            RelayError::NotFoundOrExpired => ApiError::unauthorized("Channel not found"),
            RelayError::Verification(failure) => {
                warn!(reason = failure.reason.code(), detail = %failure.detail, "Signature verification failed");
                ApiError::unauthorized("Invalid signature")
            }
            RelayError::Conflict => ApiError::conflict("Channel is not pending"),
            RelayError::InvalidAuthKey => ApiError::unauthorized("Unauthorized"),
            RelayError::IdentityLookup(e) => {
                error!(error = %e, "Identity lookup failed");
                ApiError::bad_gateway("Failed to resolve signer identities")
            }
            RelayError::StoreUnavailable(e) => {
                error!(error = %e, "Channel store failure");
                ApiError::internal("Channel store unavailable")
            }
            RelayError::Internal(msg) => {
                error!(error = %msg, "Internal error");
                ApiError::internal("Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}
