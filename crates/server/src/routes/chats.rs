use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::info;

use ghost_common::ids::now_ms;
use ghost_protocol::{
    ChatOverview, ChatThread, CreateChatRequest, CreateChatResponse, MessageView,
    SendMessageRequest, Sender, DEFAULT_ALIAS,
};

use crate::app::SharedState;
use crate::error::ApiError;
use crate::events;
use crate::routes::normalize_alias;

/// Legacy entry point: every call opens a brand-new chat with a fresh
/// capability token, even for a repeat sender.
pub async fn create_chat(
    State(app): State<SharedState>,
    Json(request): Json<CreateChatRequest>,
) -> Result<(StatusCode, Json<CreateChatResponse>), ApiError> {
    let public_id = request.public_id.trim();
    let content = request.content.trim();
    if public_id.is_empty() || content.is_empty() {
        return Err(ApiError::InvalidInput(
            "public_id and content are required".to_string(),
        ));
    }
    let alias = normalize_alias(request.alias);
    let now = now_ms();

    let (chat, creator_name) = {
        let mut state = app.state.write().await;
        let creator = state
            .creator_by_public_id(public_id)
            .cloned()
            .ok_or(ApiError::NotFound("creator"))?;
        let chat = state.create_chat(&creator.creator_id, now);
        let message = state.append_message(&chat.chat_id, Sender::Anon, content, alias, now);
        events::publish_message_created(&state, &chat, &message);
        (chat, creator.name)
    };
    app.persist_chats().await?;
    app.persist_messages().await?;
    info!("chat {} opened for creator {}", chat.chat_id, chat.creator_id);

    Ok((
        StatusCode::CREATED,
        Json(CreateChatResponse {
            chat_url: app.chat_url(&chat.anon_token, &chat.chat_id),
            chat_id: chat.chat_id,
            anon_token: chat.anon_token,
            creator_name,
        }),
    ))
}

pub async fn chat_overview(
    State(app): State<SharedState>,
    Path(anon_token): Path<String>,
) -> Result<Json<ChatOverview>, ApiError> {
    let state = app.state.read().await;
    let chat = state
        .chat_by_token(&anon_token)
        .ok_or(ApiError::NotFound("chat"))?;
    let creator_name = state
        .creators
        .get(&chat.creator_id)
        .map(|creator| creator.name.clone())
        .unwrap_or_default();
    let last = state.latest_message(&chat.chat_id);
    Ok(Json(ChatOverview {
        id: chat.chat_id.clone(),
        anon_token: chat.anon_token.clone(),
        creator_name,
        last_message: last.map(|message| message.content.clone()),
        anon_alias: last
            .and_then(|message| message.alias.clone())
            .unwrap_or_else(|| DEFAULT_ALIAS.to_string()),
    }))
}

pub async fn chat_thread(
    State(app): State<SharedState>,
    Path((anon_token, chat_id)): Path<(String, String)>,
) -> Result<Json<ChatThread>, ApiError> {
    let state = app.state.read().await;
    let chat = state.chats.get(&chat_id).ok_or(ApiError::NotFound("chat"))?;
    if chat.anon_token != anon_token {
        return Err(ApiError::Forbidden(
            "token does not grant this chat".to_string(),
        ));
    }
    let creator_name = state
        .creators
        .get(&chat.creator_id)
        .map(|creator| creator.name.clone())
        .unwrap_or_default();
    let messages = state
        .messages_in_chat(&chat_id)
        .into_iter()
        .map(|message| message.view())
        .collect();
    Ok(Json(ChatThread {
        chat_id: chat.chat_id.clone(),
        creator_name,
        messages,
    }))
}

pub async fn anon_reply(
    State(app): State<SharedState>,
    Path((anon_token, chat_id)): Path<(String, String)>,
    Json(request): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageView>), ApiError> {
    let content = request.content.trim();
    if content.is_empty() {
        return Err(ApiError::InvalidInput("content is required".to_string()));
    }
    let alias = normalize_alias(request.alias);
    let now = now_ms();

    let message = {
        let mut state = app.state.write().await;
        let chat = state
            .chats
            .get(&chat_id)
            .cloned()
            .ok_or(ApiError::NotFound("chat"))?;
        if chat.anon_token != anon_token {
            return Err(ApiError::Forbidden(
                "token does not grant this chat".to_string(),
            ));
        }
        let message = state.append_message(&chat_id, Sender::Anon, content, alias, now);
        events::publish_message_created(&state, &chat, &message);
        message
    };
    app.persist_messages().await?;

    Ok((StatusCode::CREATED, Json(message.view())))
}
