use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::info;

use ghost_common::ids::now_ms;
use ghost_ledger::{minutes_to_next, refill, RefillOutcome};
use ghost_protocol::{
    ChatSummary, CreateCreatorRequest, CreateCreatorResponse, CreatorProfile, LivesResponse,
    LoginRequest, LoginResponse, RefreshTokenRequest, RefreshTokenResponse, DEFAULT_ALIAS,
};

use crate::app::SharedState;
use crate::auth::AuthCreator;
use crate::error::ApiError;
use crate::state::CreatorState;

fn profile(creator: &CreatorState) -> CreatorProfile {
    CreatorProfile {
        creator_id: creator.creator_id.clone(),
        public_id: creator.public_id.clone(),
        name: creator.name.clone(),
        lives: creator.lives,
        max_lives: creator.max_lives,
        is_premium: creator.is_premium,
        created_at_ms: creator.created_at_ms,
    }
}

pub async fn create_creator(
    State(app): State<SharedState>,
    Json(request): Json<CreateCreatorRequest>,
) -> Result<(StatusCode, Json<CreateCreatorResponse>), ApiError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::InvalidInput("name is required".to_string()));
    }

    let creator = {
        let mut state = app.state.write().await;
        state.create_creator(name, app.config.lives.max_lives, now_ms())
    };
    app.persist_creators().await?;
    let token = app.issue_token(&creator)?;
    info!(
        "creator {} opened space {}",
        creator.creator_id, creator.public_id
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateCreatorResponse {
            dashboard_url: app.dashboard_url(&creator.creator_id),
            public_url: app.public_url(&creator.public_id),
            dashboard_id: creator.creator_id,
            public_id: creator.public_id,
            token,
        }),
    ))
}

pub async fn login(
    State(app): State<SharedState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let public_id = request.public_id.trim();
    if public_id.is_empty() {
        return Err(ApiError::InvalidInput("public_id is required".to_string()));
    }
    let creator = {
        let state = app.state.read().await;
        state.creator_by_public_id(public_id).cloned()
    }
    .ok_or(ApiError::NotFound("creator"))?;
    let token = app.issue_token(&creator)?;
    Ok(Json(LoginResponse {
        token,
        creator: profile(&creator),
    }))
}

pub async fn refresh_token(
    State(app): State<SharedState>,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<Json<RefreshTokenResponse>, ApiError> {
    let public_id = request.public_id.trim();
    if public_id.is_empty() {
        return Err(ApiError::InvalidInput("public_id is required".to_string()));
    }
    let creator = {
        let state = app.state.read().await;
        state.creator_by_public_id(public_id).cloned()
    }
    .ok_or(ApiError::NotFound("creator"))?;
    let token = app.issue_token(&creator)?;
    Ok(Json(RefreshTokenResponse { token }))
}

pub async fn me(
    State(app): State<SharedState>,
    AuthCreator(claims): AuthCreator,
) -> Result<Json<CreatorProfile>, ApiError> {
    let creator = {
        let state = app.state.read().await;
        state.creators.get(&claims.creator_id).cloned()
    }
    .ok_or(ApiError::NotFound("creator"))?;
    Ok(Json(profile(&creator)))
}

pub async fn lives(
    State(app): State<SharedState>,
    AuthCreator(claims): AuthCreator,
    Path(creator_id): Path<String>,
) -> Result<Json<LivesResponse>, ApiError> {
    if claims.creator_id != creator_id {
        return Err(ApiError::Forbidden("not your dashboard".to_string()));
    }
    let now = now_ms();
    let interval = app.config.lives.interval_ms();

    let (creator, refreshed) = {
        let mut state = app.state.write().await;
        let creator = state
            .creators
            .get_mut(&creator_id)
            .ok_or(ApiError::NotFound("creator"))?;
        let refreshed = match refill(&creator.lives_state(), interval, now) {
            RefillOutcome::Updated(updated) => {
                creator.apply_lives(updated);
                true
            }
            RefillOutcome::Unchanged => false,
        };
        (creator.clone(), refreshed)
    };
    if refreshed {
        app.persist_creators().await?;
    }

    Ok(Json(LivesResponse {
        lives: creator.lives,
        max_lives: creator.max_lives,
        minutes_to_next: minutes_to_next(&creator.lives_state(), interval, now),
        is_premium: creator.is_premium,
    }))
}

pub async fn dashboard_chats(
    State(app): State<SharedState>,
    AuthCreator(claims): AuthCreator,
    Path(creator_id): Path<String>,
) -> Result<Json<Vec<ChatSummary>>, ApiError> {
    if claims.creator_id != creator_id {
        return Err(ApiError::Forbidden("not your dashboard".to_string()));
    }
    let state = app.state.read().await;
    if !state.creators.contains_key(&creator_id) {
        return Err(ApiError::NotFound("creator"));
    }
    let summaries = state
        .chats_for_creator(&creator_id)
        .into_iter()
        .map(|chat| {
            let last = state.latest_message(&chat.chat_id);
            ChatSummary {
                id: chat.chat_id.clone(),
                anon_token: chat.anon_token.clone(),
                created_at_ms: chat.created_at_ms,
                last_message: last.map(|message| message.view()),
                anon_alias: last
                    .and_then(|message| message.alias.clone())
                    .unwrap_or_else(|| DEFAULT_ALIAS.to_string()),
            }
        })
        .collect();
    Ok(Json(summaries))
}
