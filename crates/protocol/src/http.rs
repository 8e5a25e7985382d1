use serde::{Deserialize, Serialize};

pub const DEFAULT_ALIAS: &str = "Anónimo";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Anon,
    Creator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageView {
    pub id: String,
    pub from: Sender,
    pub content: String,
    pub alias: String,
    pub seen: bool,
    pub created_at_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCreatorRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCreatorResponse {
    pub dashboard_url: String,
    pub public_url: String,
    pub dashboard_id: String,
    pub public_id: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub public_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub creator: CreatorProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRequest {
    pub public_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenResponse {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatorProfile {
    pub creator_id: String,
    pub public_id: String,
    pub name: String,
    pub lives: u32,
    pub max_lives: u32,
    pub is_premium: bool,
    pub created_at_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivesResponse {
    pub lives: u32,
    pub max_lives: u32,
    pub minutes_to_next: i64,
    pub is_premium: bool,
}

/// Dashboard chat listing entry: thread plus its latest message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSummary {
    pub id: String,
    pub anon_token: String,
    pub created_at_ms: i64,
    pub last_message: Option<MessageView>,
    pub anon_alias: String,
}

/// Anonymous-side chat summary keyed by token alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatOverview {
    pub id: String,
    pub anon_token: String,
    pub creator_name: String,
    pub last_message: Option<String>,
    pub anon_alias: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatThread {
    pub chat_id: String,
    pub creator_name: String,
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChatRequest {
    pub public_id: String,
    pub content: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChatResponse {
    pub chat_id: String,
    pub anon_token: String,
    pub chat_url: String,
    pub creator_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicSendRequest {
    pub content: String,
    pub alias: Option<String>,
    /// Previously issued token, echoed back for thread continuity.
    pub anon_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicSendResponse {
    pub chat_id: String,
    pub anon_token: String,
    pub chat_url: String,
    pub message: MessageView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatorMessageRequest {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LivesRemaining {
    Unlimited,
    #[serde(untagged)]
    Count(u32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenMessageResponse {
    pub message: MessageView,
    pub lives_remaining: LivesRemaining,
    pub minutes_to_next: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minutes_to_next: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lives_remaining_wire_shape() {
        assert_eq!(
            serde_json::to_string(&LivesRemaining::Unlimited).expect("json"),
            "\"unlimited\""
        );
        assert_eq!(
            serde_json::to_string(&LivesRemaining::Count(3)).expect("json"),
            "3"
        );
    }

    #[test]
    fn sender_is_lowercase_on_the_wire() {
        assert_eq!(serde_json::to_string(&Sender::Anon).expect("json"), "\"anon\"");
        let from: Sender = serde_json::from_str("\"creator\"").expect("json");
        assert_eq!(from, Sender::Creator);
    }
}
