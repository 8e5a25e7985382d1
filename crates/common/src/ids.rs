use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;

/// Owner-visible record identifier (creators, chats, messages).
pub fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Shareable, unguessable space identifier embedded in public links.
pub fn new_public_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Anonymous capability token. 128 bits of entropy, URL-safe so it can
/// live in a path segment.
pub fn new_anon_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

pub fn new_event_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anon_tokens_are_unique_and_url_safe() {
        let a = new_anon_token();
        let b = new_anon_token();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert!(a.len() >= 21);
    }
}
