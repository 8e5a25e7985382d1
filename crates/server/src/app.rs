use std::sync::Arc;

use tokio::sync::RwLock;

use ghost_common::config::ServerConfig;
use ghost_common::ids::now_ms;
use ghost_common::token::{Claims, TokenKey};

use crate::state::{CreatorState, ServerState};
use crate::storage::Storage;

pub struct AppState {
    pub config: ServerConfig,
    pub state: RwLock<ServerState>,
    pub storage: Storage,
    pub token_key: TokenKey,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn issue_token(&self, creator: &CreatorState) -> anyhow::Result<String> {
        let claims = Claims {
            creator_id: creator.creator_id.clone(),
            public_id: creator.public_id.clone(),
            is_premium: creator.is_premium,
            exp_ms: now_ms() + self.config.token_ttl_days * 24 * 60 * 60 * 1000,
        };
        self.token_key.issue(&claims)
    }

    pub async fn persist_creators(&self) -> anyhow::Result<()> {
        let snapshot = { self.state.read().await.creators_snapshot() };
        self.storage.save_creators_async(snapshot).await
    }

    pub async fn persist_chats(&self) -> anyhow::Result<()> {
        let snapshot = { self.state.read().await.chats_snapshot() };
        self.storage.save_chats_async(snapshot).await
    }

    pub async fn persist_messages(&self) -> anyhow::Result<()> {
        let snapshot = { self.state.read().await.messages_snapshot() };
        self.storage.save_messages_async(snapshot).await
    }

    pub fn dashboard_url(&self, creator_id: &str) -> String {
        format!("{}/dashboard/{}", self.config.frontend_base(), creator_id)
    }

    pub fn public_url(&self, public_id: &str) -> String {
        format!("{}/u/{}", self.config.frontend_base(), public_id)
    }

    pub fn chat_url(&self, anon_token: &str, chat_id: &str) -> String {
        format!("{}/chats/{}/{}", self.config.frontend_base(), anon_token, chat_id)
    }
}
