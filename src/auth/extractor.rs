// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for channel credentials.
//!
//! The channel token travels as a bearer token; the authenticate call also
//! carries the application auth key in its own header.
//!
//! ```rust,ignore
//! async fn status(ChannelBearer(token): ChannelBearer) -> impl IntoResponse {
//!     // token is the channel token
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::AuthError;

/// Header carrying the application auth key on authenticate requests.
pub const AUTH_KEY_HEADER: &str = "x-farcaster-connect-auth-key";

/// Channel token from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct ChannelBearer(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ChannelBearer {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::InvalidAuthHeader)?;

        Ok(ChannelBearer(token.to_string()))
    }
}

/// Application auth key from the [`AUTH_KEY_HEADER`] header.
#[derive(Debug, Clone)]
pub struct AuthKeyHeader(pub String);

impl<S: Send + Sync> FromRequestParts<S> for AuthKeyHeader {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get(AUTH_KEY_HEADER)
            .ok_or(AuthError::MissingAuthKey)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthKey)?;

        Ok(AuthKeyHeader(key.to_string()))
    }
}
