use std::collections::HashMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use ghost_common::ids::{new_anon_token, new_public_id, new_record_id};
use ghost_ledger::LivesState;
use ghost_protocol::{MessageView, Sender, DEFAULT_ALIAS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatorState {
    pub creator_id: String,
    pub public_id: String,
    pub name: String,
    pub lives: u32,
    pub max_lives: u32,
    pub last_updated_ms: i64,
    pub is_premium: bool,
    pub created_at_ms: i64,
}

impl CreatorState {
    pub fn lives_state(&self) -> LivesState {
        LivesState {
            lives: self.lives,
            max_lives: self.max_lives,
            last_updated_ms: self.last_updated_ms,
            is_premium: self.is_premium,
        }
    }

    pub fn apply_lives(&mut self, updated: LivesState) {
        self.lives = updated.lives;
        self.last_updated_ms = updated.last_updated_ms;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatState {
    pub chat_id: String,
    pub creator_id: String,
    pub anon_token: String,
    pub created_at_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageState {
    pub message_id: String,
    pub chat_id: String,
    pub from: Sender,
    pub content: String,
    pub alias: Option<String>,
    pub seen: bool,
    pub created_at_ms: i64,
}

impl MessageState {
    pub fn view(&self) -> MessageView {
        MessageView {
            id: self.message_id.clone(),
            from: self.from,
            content: self.content.clone(),
            alias: self
                .alias
                .clone()
                .unwrap_or_else(|| DEFAULT_ALIAS.to_string()),
            seen: self.seen,
            created_at_ms: self.created_at_ms,
        }
    }
}

/// What a live-update subscriber is allowed to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriberScope {
    Creator(String),
    Chat(String),
}

#[derive(Debug, Clone)]
pub struct SubscriberHandle {
    pub scope: SubscriberScope,
    pub tx: mpsc::UnboundedSender<WsMessage>,
}

#[derive(Debug, Clone)]
pub struct RequestWindow {
    pub window_start_ms: i64,
    pub count: u32,
}

#[derive(Debug, Default)]
pub struct ServerState {
    pub creators: HashMap<String, CreatorState>,
    pub creators_by_public_id: HashMap<String, String>,
    pub chats: HashMap<String, ChatState>,
    pub chats_by_token: HashMap<String, String>,
    pub messages: HashMap<String, MessageState>,
    pub messages_by_chat: HashMap<String, Vec<String>>,
    pub subscribers: HashMap<String, SubscriberHandle>,
    pub request_windows: HashMap<IpAddr, RequestWindow>,
    rate_sweep_ms: i64,
}

impl ServerState {
    pub fn new(
        creators: Vec<CreatorState>,
        chats: Vec<ChatState>,
        messages: Vec<MessageState>,
    ) -> Self {
        let mut state = ServerState::default();
        for creator in creators {
            state
                .creators_by_public_id
                .insert(creator.public_id.clone(), creator.creator_id.clone());
            state.creators.insert(creator.creator_id.clone(), creator);
        }
        for chat in chats {
            state
                .chats_by_token
                .insert(chat.anon_token.clone(), chat.chat_id.clone());
            state.chats.insert(chat.chat_id.clone(), chat);
        }
        let mut messages = messages;
        messages.sort_by(|a, b| {
            a.created_at_ms
                .cmp(&b.created_at_ms)
                .then_with(|| a.message_id.cmp(&b.message_id))
        });
        for message in messages {
            state
                .messages_by_chat
                .entry(message.chat_id.clone())
                .or_default()
                .push(message.message_id.clone());
            state.messages.insert(message.message_id.clone(), message);
        }
        state
    }

    pub fn create_creator(&mut self, name: &str, max_lives: u32, now_ms: i64) -> CreatorState {
        let creator = CreatorState {
            creator_id: new_record_id(),
            public_id: new_public_id(),
            name: name.to_string(),
            lives: max_lives,
            max_lives,
            last_updated_ms: now_ms,
            is_premium: false,
            created_at_ms: now_ms,
        };
        self.creators_by_public_id
            .insert(creator.public_id.clone(), creator.creator_id.clone());
        self.creators
            .insert(creator.creator_id.clone(), creator.clone());
        creator
    }

    pub fn creator_by_public_id(&self, public_id: &str) -> Option<&CreatorState> {
        let creator_id = self.creators_by_public_id.get(public_id)?;
        self.creators.get(creator_id)
    }

    /// Always mints a fresh chat with a fresh token (the legacy entry point).
    pub fn create_chat(&mut self, creator_id: &str, now_ms: i64) -> ChatState {
        let chat = ChatState {
            chat_id: new_record_id(),
            creator_id: creator_id.to_string(),
            anon_token: new_anon_token(),
            created_at_ms: now_ms,
        };
        self.chats_by_token
            .insert(chat.anon_token.clone(), chat.chat_id.clone());
        self.chats.insert(chat.chat_id.clone(), chat.clone());
        chat
    }

    /// Reuse path: returns the existing chat only if the presented token
    /// belongs to this creator. A token minted for another creator never
    /// grants continuity here.
    pub fn chat_for_token(&self, creator_id: &str, anon_token: &str) -> Option<&ChatState> {
        let chat_id = self.chats_by_token.get(anon_token)?;
        let chat = self.chats.get(chat_id)?;
        if chat.creator_id == creator_id {
            Some(chat)
        } else {
            None
        }
    }

    pub fn chat_by_token(&self, anon_token: &str) -> Option<&ChatState> {
        let chat_id = self.chats_by_token.get(anon_token)?;
        self.chats.get(chat_id)
    }

    pub fn open_or_create_chat(
        &mut self,
        creator_id: &str,
        anon_token: Option<&str>,
        now_ms: i64,
    ) -> ChatState {
        if let Some(token) = anon_token {
            if let Some(chat) = self.chat_for_token(creator_id, token) {
                return chat.clone();
            }
        }
        self.create_chat(creator_id, now_ms)
    }

    pub fn append_message(
        &mut self,
        chat_id: &str,
        from: Sender,
        content: &str,
        alias: Option<String>,
        now_ms: i64,
    ) -> MessageState {
        let message = MessageState {
            message_id: new_record_id(),
            chat_id: chat_id.to_string(),
            from,
            content: content.to_string(),
            alias,
            seen: false,
            created_at_ms: now_ms,
        };
        self.messages_by_chat
            .entry(chat_id.to_string())
            .or_default()
            .push(message.message_id.clone());
        self.messages
            .insert(message.message_id.clone(), message.clone());
        message
    }

    /// Messages of one chat, ascending by creation time.
    pub fn messages_in_chat(&self, chat_id: &str) -> Vec<&MessageState> {
        let Some(ids) = self.messages_by_chat.get(chat_id) else {
            return Vec::new();
        };
        ids.iter().filter_map(|id| self.messages.get(id)).collect()
    }

    pub fn latest_message(&self, chat_id: &str) -> Option<&MessageState> {
        let ids = self.messages_by_chat.get(chat_id)?;
        ids.last().and_then(|id| self.messages.get(id))
    }

    /// Chats of one creator, newest first.
    pub fn chats_for_creator(&self, creator_id: &str) -> Vec<&ChatState> {
        let mut chats: Vec<&ChatState> = self
            .chats
            .values()
            .filter(|chat| chat.creator_id == creator_id)
            .collect();
        chats.sort_by(|a, b| {
            b.created_at_ms
                .cmp(&a.created_at_ms)
                .then_with(|| b.chat_id.cmp(&a.chat_id))
        });
        chats
    }

    pub fn mark_seen(&mut self, message_id: &str) {
        if let Some(message) = self.messages.get_mut(message_id) {
            message.seen = true;
        }
    }

    /// Fixed-window per-IP throttle. Returns false once the window is spent.
    /// Expired windows are swept at most once per window length so the map
    /// does not accumulate one entry per client IP forever.
    pub fn check_rate_limit(&mut self, ip: IpAddr, limit_per_minute: u32, now_ms: i64) -> bool {
        if now_ms - self.rate_sweep_ms >= 60_000 {
            self.request_windows
                .retain(|_, window| now_ms - window.window_start_ms < 60_000);
            self.rate_sweep_ms = now_ms;
        }
        let window = self.request_windows.entry(ip).or_insert(RequestWindow {
            window_start_ms: now_ms,
            count: 0,
        });
        if now_ms - window.window_start_ms >= 60_000 {
            window.window_start_ms = now_ms;
            window.count = 0;
        }
        if window.count >= limit_per_minute {
            return false;
        }
        window.count += 1;
        true
    }

    pub fn add_subscriber(&mut self, subscriber_id: &str, handle: SubscriberHandle) {
        self.subscribers.insert(subscriber_id.to_string(), handle);
    }

    pub fn remove_subscriber(&mut self, subscriber_id: &str) -> bool {
        self.subscribers.remove(subscriber_id).is_some()
    }

    pub fn creators_snapshot(&self) -> Vec<CreatorState> {
        self.creators.values().cloned().collect()
    }

    pub fn chats_snapshot(&self) -> Vec<ChatState> {
        self.chats.values().cloned().collect()
    }

    pub fn messages_snapshot(&self) -> Vec<MessageState> {
        self.messages.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_creator() -> (ServerState, CreatorState) {
        let mut state = ServerState::default();
        let creator = state.create_creator("ana", 6, 1_000);
        (state, creator)
    }

    #[test]
    fn public_send_reuses_chat_for_same_token() {
        let (mut state, creator) = state_with_creator();
        let first = state.open_or_create_chat(&creator.creator_id, None, 2_000);
        state.append_message(&first.chat_id, Sender::Anon, "hola", None, 2_000);
        let second =
            state.open_or_create_chat(&creator.creator_id, Some(&first.anon_token), 3_000);
        assert_eq!(first.chat_id, second.chat_id);
        state.append_message(&second.chat_id, Sender::Anon, "otra vez", None, 3_000);

        let thread = state.messages_in_chat(&first.chat_id);
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0].content, "hola");
        assert_eq!(thread[1].content, "otra vez");
    }

    #[test]
    fn legacy_path_always_creates_a_fresh_chat() {
        let (mut state, creator) = state_with_creator();
        let first = state.create_chat(&creator.creator_id, 2_000);
        let second = state.create_chat(&creator.creator_id, 3_000);
        assert_ne!(first.chat_id, second.chat_id);
        assert_ne!(first.anon_token, second.anon_token);
    }

    #[test]
    fn token_of_another_creator_never_grants_continuity() {
        let mut state = ServerState::default();
        let a = state.create_creator("a", 6, 1_000);
        let b = state.create_creator("b", 6, 1_000);
        let chat_with_a = state.create_chat(&a.creator_id, 2_000);
        let reused = state.open_or_create_chat(&b.creator_id, Some(&chat_with_a.anon_token), 3_000);
        assert_ne!(reused.chat_id, chat_with_a.chat_id);
        assert_eq!(reused.creator_id, b.creator_id);
    }

    #[test]
    fn dashboard_chats_are_newest_first_with_latest_message() {
        let (mut state, creator) = state_with_creator();
        let old = state.create_chat(&creator.creator_id, 2_000);
        let new = state.create_chat(&creator.creator_id, 5_000);
        state.append_message(&old.chat_id, Sender::Anon, "first", None, 2_100);
        state.append_message(&old.chat_id, Sender::Anon, "second", None, 2_200);

        let chats = state.chats_for_creator(&creator.creator_id);
        assert_eq!(chats[0].chat_id, new.chat_id);
        assert_eq!(chats[1].chat_id, old.chat_id);
        assert_eq!(
            state.latest_message(&old.chat_id).expect("latest").content,
            "second"
        );
        assert!(state.latest_message(&new.chat_id).is_none());
    }

    #[test]
    fn reload_restores_message_order() {
        let (mut state, creator) = state_with_creator();
        let chat = state.create_chat(&creator.creator_id, 2_000);
        state.append_message(&chat.chat_id, Sender::Anon, "one", None, 2_100);
        state.append_message(&chat.chat_id, Sender::Creator, "two", None, 2_200);
        state.append_message(&chat.chat_id, Sender::Anon, "three", None, 2_300);

        let reloaded = ServerState::new(
            state.creators_snapshot(),
            state.chats_snapshot(),
            state.messages_snapshot(),
        );
        let thread: Vec<&str> = reloaded
            .messages_in_chat(&chat.chat_id)
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(thread, vec!["one", "two", "three"]);
    }

    #[test]
    fn rate_limit_window_resets() {
        let mut state = ServerState::default();
        let ip: IpAddr = "127.0.0.1".parse().expect("ip");
        for _ in 0..3 {
            assert!(state.check_rate_limit(ip, 3, 10_000));
        }
        assert!(!state.check_rate_limit(ip, 3, 10_000));
        assert!(state.check_rate_limit(ip, 3, 70_000));
    }

    #[test]
    fn rate_limit_sweeps_expired_windows() {
        let mut state = ServerState::default();
        let gone: IpAddr = "10.0.0.1".parse().expect("ip");
        let active: IpAddr = "10.0.0.2".parse().expect("ip");
        assert!(state.check_rate_limit(gone, 3, 10_000));
        assert!(state.check_rate_limit(active, 3, 80_000));
        assert!(!state.request_windows.contains_key(&gone));
        assert!(state.request_windows.contains_key(&active));
    }

    #[test]
    fn mark_seen_is_idempotent() {
        let (mut state, creator) = state_with_creator();
        let chat = state.create_chat(&creator.creator_id, 2_000);
        let message = state.append_message(&chat.chat_id, Sender::Anon, "hola", None, 2_100);
        state.mark_seen(&message.message_id);
        state.mark_seen(&message.message_id);
        assert!(state.messages[&message.message_id].seen);
    }
}
