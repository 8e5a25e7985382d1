use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::info;

use ghost_common::ids::now_ms;
use ghost_protocol::{PublicSendRequest, PublicSendResponse, Sender};

use crate::app::SharedState;
use crate::error::ApiError;
use crate::events;
use crate::routes::normalize_alias;

/// Anonymous send into a creator's space. An echoed token continues the
/// sender's existing thread with that creator; anything else starts a new
/// one with a freshly minted token.
pub async fn send_public_message(
    State(app): State<SharedState>,
    Path(public_id): Path<String>,
    Json(request): Json<PublicSendRequest>,
) -> Result<(StatusCode, Json<PublicSendResponse>), ApiError> {
    let content = request.content.trim();
    if content.is_empty() {
        return Err(ApiError::InvalidInput("content is required".to_string()));
    }
    let alias = normalize_alias(request.alias);
    let now = now_ms();

    let (chat, message) = {
        let mut state = app.state.write().await;
        let creator = state
            .creator_by_public_id(public_id.trim())
            .cloned()
            .ok_or(ApiError::NotFound("creator"))?;
        let chat =
            state.open_or_create_chat(&creator.creator_id, request.anon_token.as_deref(), now);
        let message = state.append_message(&chat.chat_id, Sender::Anon, content, alias, now);
        events::publish_message_created(&state, &chat, &message);
        (chat, message)
    };
    app.persist_chats().await?;
    app.persist_messages().await?;
    info!(
        "anon message {} landed in chat {}",
        message.message_id, chat.chat_id
    );

    Ok((
        StatusCode::CREATED,
        Json(PublicSendResponse {
            chat_url: app.chat_url(&chat.anon_token, &chat.chat_id),
            chat_id: chat.chat_id,
            anon_token: chat.anon_token,
            message: message.view(),
        }),
    ))
}
