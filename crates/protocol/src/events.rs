use serde::{Deserialize, Serialize};

use crate::http::MessageView;

/// Wire frame for the live-update channel, both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    pub id: String,
    pub ts: i64,
    pub payload: serde_json::Value,
}

/// First client frame: declares the subscription scope. Exactly one
/// capability must be presented, either a bearer token for the creator
/// scope or an anon token plus chat id for a single thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSubscribe {
    pub bearer: Option<String>,
    pub anon_token: Option<String>,
    pub chat_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventHello {
    pub server_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeOk {
    pub scope: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageCreated {
    pub chat_id: String,
    pub message: MessageView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSeen {
    pub chat_id: String,
    pub message_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventError {
    pub code: String,
    pub message: String,
}
