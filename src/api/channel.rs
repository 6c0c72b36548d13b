// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use tracing::debug;

use crate::{
    auth::{AuthKeyHeader, ChannelBearer},
    channel::{token_prefix, ChannelStatus},
    error::ApiError,
    models::{AuthenticateRequest, ChannelStatusResponse, CreateChannelRequest, CreateChannelResponse},
    state::AppState,
};

fn status_response(status: ChannelStatus) -> (StatusCode, Json<ChannelStatusResponse>) {
    match status {
        ChannelStatus::Pending(record) => (StatusCode::ACCEPTED, Json(record.into())),
        ChannelStatus::Completed(record) => (StatusCode::OK, Json(record.into())),
    }
}

#[utoipa::path(
    post,
    path = "/v1/channel",
    request_body = CreateChannelRequest,
    tag = "Channel",
    responses(
        (status = 201, description = "Channel created", body = CreateChannelResponse),
        (status = 400, description = "Missing or invalid fields")
    )
)]
pub async fn create_channel(
    State(state): State<AppState>,
    Json(request): Json<CreateChannelRequest>,
) -> Result<(StatusCode, Json<CreateChannelResponse>), ApiError> {
    let record = state.channels.create(request.into())?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// Read a channel.
///
/// A completed channel is returned exactly once; the read that returns it
/// closes the channel.
#[utoipa::path(
    get,
    path = "/v1/channel/status",
    tag = "Channel",
    security(("channel_token" = [])),
    responses(
        (status = 200, description = "Channel completed; payload delivered once", body = ChannelStatusResponse),
        (status = 202, description = "Channel still pending", body = ChannelStatusResponse),
        (status = 401, description = "Channel absent, expired or already consumed")
    )
)]
pub async fn channel_status(
    State(state): State<AppState>,
    ChannelBearer(token): ChannelBearer,
) -> Result<(StatusCode, Json<ChannelStatusResponse>), ApiError> {
    Ok(status_response(state.channels.status(&token)?))
}

/// Like [`channel_status`], but a pending channel is held open until it
/// completes, the long-poll timeout elapses or the server shuts down.
#[utoipa::path(
    get,
    path = "/v1/channel/status/long-poll",
    tag = "Channel",
    security(("channel_token" = [])),
    responses(
        (status = 200, description = "Channel completed; payload delivered once", body = ChannelStatusResponse),
        (status = 202, description = "Still pending after the wait", body = ChannelStatusResponse),
        (status = 401, description = "Channel absent, expired or already consumed")
    )
)]
pub async fn channel_status_long_poll(
    State(state): State<AppState>,
    ChannelBearer(token): ChannelBearer,
) -> Result<(StatusCode, Json<ChannelStatusResponse>), ApiError> {
    let subscription = state.channels.notifier().subscribe();
    match state.channels.status(&token)? {
        ChannelStatus::Pending(_) => {}
        done => return Ok(status_response(done)),
    }

    let woken = subscription
        .wait_for_completion(&token, state.long_poll_timeout, &state.shutdown)
        .await;
    debug!(token = token_prefix(&token), woken, "Long-poll wait finished");

    Ok(status_response(state.channels.status(&token)?))
}

#[utoipa::path(
    post,
    path = "/v1/channel/authenticate",
    request_body = AuthenticateRequest,
    tag = "Channel",
    security(("channel_token" = [])),
    params(
        ("X-Farcaster-Connect-Auth-Key" = String, Header, description = "Application auth key")
    ),
    responses(
        (status = 201, description = "Channel completed", body = ChannelStatusResponse),
        (status = 400, description = "Missing message or signature"),
        (status = 401, description = "Invalid signature, invalid auth key, or channel absent"),
        (status = 409, description = "Channel already completed")
    )
)]
pub async fn authenticate_channel(
    State(state): State<AppState>,
    ChannelBearer(token): ChannelBearer,
    AuthKeyHeader(auth_key): AuthKeyHeader,
    Json(request): Json<AuthenticateRequest>,
) -> Result<(StatusCode, Json<ChannelStatusResponse>), ApiError> {
    let record = state
        .channels
        .authenticate(&token, &auth_key, request.into())
        .await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}
