use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use ghost_common::ids::now_ms;
use ghost_ledger::{consume, minutes_to_next, refill, ConsumeOutcome, RefillOutcome};
use ghost_protocol::{
    ChatThread, CreatorMessageRequest, LivesRemaining, MessageView, OpenMessageResponse, Sender,
};

use crate::app::SharedState;
use crate::auth::AuthCreator;
use crate::error::ApiError;
use crate::events;
use crate::state::{ChatState, ServerState};

pub async fn dashboard_thread(
    State(app): State<SharedState>,
    AuthCreator(claims): AuthCreator,
    Path(chat_id): Path<String>,
) -> Result<Json<ChatThread>, ApiError> {
    let state = app.state.read().await;
    let chat = state.chats.get(&chat_id).ok_or(ApiError::NotFound("chat"))?;
    if chat.creator_id != claims.creator_id {
        return Err(ApiError::Forbidden("not your chat".to_string()));
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

pub async fn creator_reply(
    State(app): State<SharedState>,
    AuthCreator(claims): AuthCreator,
    Path(chat_id): Path<String>,
    Json(request): Json<CreatorMessageRequest>,
) -> Result<(StatusCode, Json<MessageView>), ApiError> {
    let content = request.content.trim();
    if content.is_empty() {
        return Err(ApiError::InvalidInput("content is required".to_string()));
    }
    let now = now_ms();

    let message = {
        let mut state = app.state.write().await;
        let chat = state
            .chats
            .get(&chat_id)
            .cloned()
            .ok_or(ApiError::NotFound("chat"))?;
        if chat.creator_id != claims.creator_id {
            return Err(ApiError::Forbidden("not your chat".to_string()));
        }
        let message = state.append_message(&chat_id, Sender::Creator, content, None, now);
        events::publish_message_created(&state, &chat, &message);
        message
    };
    app.persist_messages().await?;

    Ok((StatusCode::CREATED, Json(message.view())))
}

pub async fn open_message(
    State(app): State<SharedState>,
    AuthCreator(claims): AuthCreator,
    Path((creator_id, message_id)): Path<(String, String)>,
) -> Result<Json<OpenMessageResponse>, ApiError> {
    if claims.creator_id != creator_id {
        return Err(ApiError::Forbidden("not your dashboard".to_string()));
    }
    let now = now_ms();
    let interval = app.config.lives.interval_ms();

    // The whole read-refill-consume-mark sequence runs under one write
    // guard, so two concurrent opens can never spend the same life twice.
    let outcome = {
        let mut state = app.state.write().await;
        let outcome = apply_open_message(&mut state, &creator_id, &message_id, interval, now);
        if let (Some(chat), Some(seen_id)) = (&outcome.chat, &outcome.message_seen) {
            events::publish_message_seen(&state, chat, seen_id);
        }
        outcome
    };

    // A refill is committed even when the open itself fails.
    if outcome.creator_dirty {
        app.persist_creators().await?;
    }
    if outcome.message_seen.is_some() {
        app.persist_messages().await?;
    }
    outcome.result.map(Json)
}

struct OpenOutcome {
    result: Result<OpenMessageResponse, ApiError>,
    creator_dirty: bool,
    message_seen: Option<String>,
    chat: Option<ChatState>,
}

fn apply_open_message(
    state: &mut ServerState,
    creator_id: &str,
    message_id: &str,
    interval_ms: i64,
    now_ms: i64,
) -> OpenOutcome {
    let mut outcome = OpenOutcome {
        result: Err(ApiError::NotFound("creator")),
        creator_dirty: false,
        message_seen: None,
        chat: None,
    };
    let Some(mut creator) = state.creators.get(creator_id).cloned() else {
        return outcome;
    };
    if let RefillOutcome::Updated(updated) = refill(&creator.lives_state(), interval_ms, now_ms) {
        creator.apply_lives(updated);
        outcome.creator_dirty = true;
    }

    match state.messages.get(message_id).cloned() {
        None => outcome.result = Err(ApiError::NotFound("message")),
        Some(message) => match state.chats.get(&message.chat_id).cloned() {
            None => outcome.result = Err(ApiError::NotFound("chat")),
            Some(chat) if chat.creator_id != creator_id => {
                outcome.result = Err(ApiError::Forbidden("not your chat".to_string()));
            }
            Some(chat) => {
                outcome.chat = Some(chat);
                if creator.is_premium {
                    if message.from == Sender::Anon && !message.seen {
                        state.mark_seen(message_id);
                        outcome.message_seen = Some(message_id.to_string());
                    }
                    outcome.result = Ok(OpenMessageResponse {
                        message: state.messages[message_id].view(),
                        lives_remaining: LivesRemaining::Unlimited,
                        minutes_to_next: 0,
                    });
                } else if message.from != Sender::Anon || message.seen {
                    // Own replies and already-opened messages cost nothing.
                    outcome.result = Ok(OpenMessageResponse {
                        message: message.view(),
                        lives_remaining: LivesRemaining::Count(creator.lives),
                        minutes_to_next: minutes_to_next(
                            &creator.lives_state(),
                            interval_ms,
                            now_ms,
                        ),
                    });
                } else {
                    match consume(&creator.lives_state(), interval_ms, now_ms) {
                        ConsumeOutcome::Exhausted { minutes_to_next } => {
                            outcome.result = Err(ApiError::OutOfLives { minutes_to_next });
                        }
                        ConsumeOutcome::Spent(updated) => {
                            creator.apply_lives(updated);
                            outcome.creator_dirty = true;
                            state.mark_seen(message_id);
                            outcome.message_seen = Some(message_id.to_string());
                            outcome.result = Ok(OpenMessageResponse {
                                message: state.messages[message_id].view(),
                                lives_remaining: LivesRemaining::Count(updated.lives),
                                minutes_to_next: minutes_to_next(&updated, interval_ms, now_ms),
                            });
                        }
                    }
                }
            }
        },
    }

    if outcome.creator_dirty {
        state.creators.insert(creator.creator_id.clone(), creator);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: i64 = 15 * 60 * 1000;

    fn seeded_state(lives: u32, last_updated_ms: i64) -> (ServerState, String, String) {
        let mut state = ServerState::default();
        let creator = state.create_creator("ana", 6, last_updated_ms);
        let creator_id = creator.creator_id.clone();
        {
            let creator = state.creators.get_mut(&creator_id).expect("creator");
            creator.lives = lives;
            creator.last_updated_ms = last_updated_ms;
        }
        let chat = state.create_chat(&creator_id, last_updated_ms);
        let message =
            state.append_message(&chat.chat_id, Sender::Anon, "hola", None, last_updated_ms);
        (state, creator_id, message.message_id)
    }

    #[test]
    fn opening_spends_a_life_and_marks_seen() {
        let now = 1_000_000;
        let (mut state, creator_id, message_id) = seeded_state(6, now);
        let outcome = apply_open_message(&mut state, &creator_id, &message_id, INTERVAL, now);
        let response = outcome.result.expect("opened");
        assert_eq!(response.lives_remaining, LivesRemaining::Count(5));
        assert!(response.message.seen);
        assert_eq!(outcome.message_seen.as_deref(), Some(message_id.as_str()));
        assert_eq!(state.creators[&creator_id].lives, 5);
        assert_eq!(state.creators[&creator_id].last_updated_ms, now);
    }

    #[test]
    fn refill_lands_before_the_gate() {
        // Out of lives 16 minutes ago: the refill credits one life and the
        // open immediately spends it again.
        let now = 100 * INTERVAL;
        let (mut state, creator_id, message_id) =
            seeded_state(0, now - 16 * 60 * 1000);
        let outcome = apply_open_message(&mut state, &creator_id, &message_id, INTERVAL, now);
        let response = outcome.result.expect("opened");
        assert_eq!(response.lives_remaining, LivesRemaining::Count(0));
        assert_eq!(response.minutes_to_next, 15);
        assert!(response.message.seen);
        assert_eq!(state.creators[&creator_id].last_updated_ms, now);
    }

    #[test]
    fn exhausted_leaves_the_message_unseen() {
        let now = 1_000_000;
        let (mut state, creator_id, message_id) = seeded_state(0, now);
        let outcome = apply_open_message(&mut state, &creator_id, &message_id, INTERVAL, now);
        assert!(matches!(
            outcome.result,
            Err(ApiError::OutOfLives { minutes_to_next: 15 })
        ));
        assert!(outcome.message_seen.is_none());
        assert!(!state.messages[&message_id].seen);
    }

    #[test]
    fn premium_opens_without_spending() {
        let now = 1_000_000;
        let (mut state, creator_id, message_id) = seeded_state(0, now);
        state
            .creators
            .get_mut(&creator_id)
            .expect("creator")
            .is_premium = true;
        let outcome = apply_open_message(&mut state, &creator_id, &message_id, INTERVAL, now);
        let response = outcome.result.expect("opened");
        assert_eq!(response.lives_remaining, LivesRemaining::Unlimited);
        assert_eq!(response.minutes_to_next, 0);
        assert!(response.message.seen);
        assert_eq!(state.creators[&creator_id].lives, 0);
    }

    #[test]
    fn reopening_a_seen_message_is_free() {
        let now = 1_000_000;
        let (mut state, creator_id, message_id) = seeded_state(3, now);
        apply_open_message(&mut state, &creator_id, &message_id, INTERVAL, now)
            .result
            .expect("first open");
        let outcome = apply_open_message(&mut state, &creator_id, &message_id, INTERVAL, now);
        let response = outcome.result.expect("second open");
        assert_eq!(response.lives_remaining, LivesRemaining::Count(2));
        assert!(outcome.message_seen.is_none());
        assert_eq!(state.creators[&creator_id].lives, 2);
    }

    #[test]
    fn foreign_creator_cannot_open_the_message() {
        let now = 1_000_000;
        let (mut state, _creator_id, message_id) = seeded_state(6, now);
        let other = state.create_creator("eva", 6, now);
        let outcome =
            apply_open_message(&mut state, &other.creator_id, &message_id, INTERVAL, now);
        assert!(matches!(outcome.result, Err(ApiError::Forbidden(_))));
        assert!(!state.messages[&message_id].seen);
        assert_eq!(state.creators[&other.creator_id].lives, 6);
    }
}
