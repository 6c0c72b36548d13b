// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::warn;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::CorsOrigin,
    models::{
        AuthenticateRequest, ChannelStatusResponse, CreateChannelRequest, CreateChannelResponse,
    },
    state::AppState,
    storage::{AuthMethod, ChannelState, SignatureParams},
};

pub mod channel;
pub mod health;

pub fn router(state: AppState, cors: &CorsOrigin) -> Router {
    let v1_routes = Router::new()
        .route("/channel", post(channel::create_channel))
        .route("/channel/status", get(channel::channel_status))
        .route(
            "/channel/status/long-poll",
            get(channel::channel_status_long_poll),
        )
        .route("/channel/authenticate", post(channel::authenticate_channel))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors_layer(cors))
}

fn cors_layer(origin: &CorsOrigin) -> CorsLayer {
    match origin {
        CorsOrigin::Any => CorsLayer::permissive(),
        CorsOrigin::List(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!(origin = %origin, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(Any)
        }
    }
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "channel_token",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        channel::create_channel,
        channel::channel_status,
        channel::channel_status_long_poll,
        channel::authenticate_channel,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            CreateChannelRequest,
            CreateChannelResponse,
            ChannelStatusResponse,
            AuthenticateRequest,
            SignatureParams,
            ChannelState,
            AuthMethod,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Channel", description = "Sign-in channel lifecycle"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::channel::tests::{service_with, signed_authentication, AUTH_KEY};
    use crate::storage::RedbChannelStore;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::{sync::Arc, time::Duration};
    use tower::ServiceExt;

    pub(crate) fn test_state() -> AppState {
        let store = Arc::new(RedbChannelStore::in_memory().unwrap());
        AppState::new(Arc::new(service_with(store, Duration::from_secs(300))))
    }

    fn app() -> Router {
        router(test_state(), &CorsOrigin::Any)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn create(body: Value) -> Request<Body> {
        Request::post("/v1/channel")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn status(token: &str) -> Request<Body> {
        Request::get("/v1/channel/status")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    fn authenticate(token: &str, auth_key: &str, body: Value) -> Request<Body> {
        Request::post("/v1/channel/authenticate")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header("X-Farcaster-Connect-Auth-Key", auth_key)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn authenticate_body(nonce: &str) -> Value {
        let (auth, _) = signed_authentication(nonce);
        json!({
            "message": auth.message,
            "signature": auth.signature,
            "fid": auth.fid,
            "username": auth.profile.username,
            "bio": auth.profile.bio,
            "displayName": auth.profile.display_name,
            "pfpUrl": auth.profile.pfp_url,
            "verifications": auth.verifications,
        })
    }

    #[tokio::test]
    async fn end_to_end_sign_in() {
        let app = app();

        let (code, created) = send(
            &app,
            create(json!({
                "siweUri": "https://example.com",
                "domain": "example.com",
                "nonce": "abcd1234"
            })),
        )
        .await;
        assert_eq!(code, StatusCode::CREATED);
        let token = created["channelToken"].as_str().unwrap().to_string();
        assert!(created["url"].as_str().unwrap().contains("channelToken="));

        let (code, pending) = send(&app, status(&token)).await;
        assert_eq!(code, StatusCode::ACCEPTED);
        assert_eq!(pending["state"], "pending");
        assert_eq!(pending["nonce"], "abcd1234");
        assert_eq!(pending["signatureParams"]["siweUri"], "https://example.com");
        assert_eq!(pending["signatureParams"]["domain"], "example.com");
        assert_eq!(pending["signatureParams"]["nonce"], "abcd1234");

        let submitted = authenticate_body("abcd1234");
        let (code, _) = send(&app, authenticate(&token, AUTH_KEY, submitted.clone())).await;
        assert_eq!(code, StatusCode::CREATED);

        let (code, completed) = send(&app, status(&token)).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(completed["state"], "completed");
        assert_eq!(completed["message"], submitted["message"]);
        assert_eq!(completed["signature"], submitted["signature"]);
        assert_eq!(completed["authMethod"], "custody");
        assert_eq!(completed["fid"], 1);
        assert_eq!(completed["username"], "alice");
        assert_eq!(completed["displayName"], "Alice Teapot");
        assert_eq!(completed["verifications"].as_array().unwrap().len(), 2);

        let (code, _) = send(&app, status(&token)).await;
        assert_eq!(code, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn authenticate_rejections() {
        let app = app();
        let (_, created) = send(
            &app,
            create(json!({
                "siweUri": "https://example.com",
                "domain": "example.com",
                "nonce": "abcd1234"
            })),
        )
        .await;
        let token = created["channelToken"].as_str().unwrap().to_string();

        let (code, _) = send(
            &app,
            authenticate(&token, "some-other-key", authenticate_body("abcd1234")),
        )
        .await;
        assert_eq!(code, StatusCode::UNAUTHORIZED);

        let (code, body) = send(
            &app,
            authenticate(&token, AUTH_KEY, authenticate_body("wrong-nonce")),
        )
        .await;
        assert_eq!(code, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid signature");

        let (code, _) = send(&app, authenticate(&token, AUTH_KEY, authenticate_body("abcd1234"))).await;
        assert_eq!(code, StatusCode::CREATED);

        let (code, _) = send(&app, authenticate(&token, AUTH_KEY, authenticate_body("abcd1234"))).await;
        assert_eq!(code, StatusCode::CONFLICT);

        let (code, _) = send(
            &app,
            authenticate("unknown-token", AUTH_KEY, authenticate_body("abcd1234")),
        )
        .await;
        assert_eq!(code, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn status_requires_bearer_token() {
        let app = app();
        let request = Request::get("/v1/channel/status")
            .body(Body::empty())
            .unwrap();
        let (code, body) = send(&app, request).await;
        assert_eq!(code, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "missing_auth_header");
    }

    #[tokio::test]
    async fn create_rejects_missing_fields() {
        let (code, _) = send(
            &app(),
            create(json!({ "siweUri": "https://example.com", "domain": "" })),
        )
        .await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let response = app()
            .oneshot(Request::get("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let response = app()
            .oneshot(
                Request::get("/health/live")
                    .header("x-request-id", "req-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()["x-request-id"], "req-123");
    }

    #[tokio::test]
    async fn restricted_cors_allows_listed_origin_only() {
        let app = router(
            test_state(),
            &CorsOrigin::List(vec!["https://app.example".to_string()]),
        );

        let allowed = app
            .clone()
            .oneshot(
                Request::get("/health/live")
                    .header(header::ORIGIN, "https://app.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            allowed.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.example"
        );

        let denied = app
            .oneshot(
                Request::get("/health/live")
                    .header(header::ORIGIN, "https://evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(!denied
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn serves_openapi_document() {
        let (code, doc) = send(
            &app(),
            Request::get("/api-doc/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(code, StatusCode::OK);
        assert!(doc["paths"]["/v1/channel/authenticate"].is_object());
    }
}
