use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderValue, Method};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use ghost_common::config::ServerConfig;
use ghost_common::ids::now_ms;
use ghost_protocol::HealthResponse;

use crate::app::SharedState;
use crate::error::ApiError;

pub mod chats;
pub mod creators;
pub mod messages;
pub mod public;

pub fn router(app: SharedState) -> Router {
    let cors = cors_layer(&app.config);
    Router::new()
        .route("/", get(health))
        .route("/creators", post(creators::create_creator))
        .route("/creators/login", post(creators::login))
        .route("/creators/refresh-token", post(creators::refresh_token))
        .route("/creators/me", get(creators::me))
        .route("/dashboard/:creator_id/lives", get(creators::lives))
        .route("/dashboard/:creator_id/chats", get(creators::dashboard_chats))
        .route("/chats", post(chats::create_chat))
        .route("/chats/:anon_token", get(chats::chat_overview))
        .route("/chats/:anon_token/:chat_id", get(chats::chat_thread))
        .route("/chats/:anon_token/:chat_id/messages", post(chats::anon_reply))
        .route("/dashboard/chats/:chat_id", get(messages::dashboard_thread))
        .route(
            "/dashboard/chats/:chat_id/messages",
            post(messages::creator_reply),
        )
        .route(
            "/dashboard/:creator_id/open-message/:message_id",
            post(messages::open_message),
        )
        .route("/public/:public_id/messages", post(public::send_public_message))
        .layer(middleware::from_fn_with_state(app.clone(), rate_limit))
        .layer(cors)
        .with_state(app)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn rate_limit(
    State(app): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let allowed = {
        let mut state = app.state.write().await;
        state.check_rate_limit(addr.ip(), app.config.rate_limit_per_minute, now_ms())
    };
    if !allowed {
        warn!("rate limit exceeded for {}", addr.ip());
        return Err(ApiError::RateLimited);
    }
    Ok(next.run(request).await)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Trims a caller-supplied alias; blank means "no alias chosen".
pub(crate) fn normalize_alias(alias: Option<String>) -> Option<String> {
    let alias = alias?;
    let alias = alias.trim();
    if alias.is_empty() {
        None
    } else {
        Some(alias.to_string())
    }
}
