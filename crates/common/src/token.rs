use std::fs;
use std::path::Path;

use anyhow::anyhow;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

/// Session claims carried by a creator bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub creator_id: String,
    pub public_id: String,
    pub is_premium: bool,
    pub exp_ms: i64,
}

/// Server signing key for bearer tokens. Tokens are the claims JSON and
/// a detached ed25519 signature, both URL-safe base64, joined by a dot.
pub struct TokenKey {
    signing: SigningKey,
}

impl TokenKey {
    pub fn generate() -> Self {
        let mut rng = OsRng;
        Self {
            signing: SigningKey::generate(&mut rng),
        }
    }

    /// Reads the key from `path`, generating and persisting a fresh one on
    /// first boot. There is no built-in default secret.
    pub fn load_or_generate(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let bytes = URL_SAFE_NO_PAD.decode(content.trim())?;
            let arr: [u8; 32] = bytes
                .try_into()
                .map_err(|_| anyhow!("invalid token key length"))?;
            return Ok(Self {
                signing: SigningKey::from_bytes(&arr),
            });
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let key = Self::generate();
        fs::write(path, URL_SAFE_NO_PAD.encode(key.signing.to_bytes()))?;
        Ok(key)
    }

    pub fn issue(&self, claims: &Claims) -> anyhow::Result<String> {
        let body = serde_json::to_vec(claims)?;
        let signature: Signature = self.signing.sign(&body);
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&body),
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ))
    }

    pub fn verify(&self, token: &str, now_ms: i64) -> anyhow::Result<Claims> {
        let (body_b64, sig_b64) = token
            .split_once('.')
            .ok_or_else(|| anyhow!("malformed token"))?;
        let body = URL_SAFE_NO_PAD.decode(body_b64)?;
        let sig_bytes = URL_SAFE_NO_PAD.decode(sig_b64)?;
        let sig_arr: [u8; 64] = sig_bytes
            .try_into()
            .map_err(|_| anyhow!("invalid signature length"))?;
        let signature = Signature::from_bytes(&sig_arr);
        let verifying = VerifyingKey::from(&self.signing);
        verifying
            .verify_strict(&body, &signature)
            .map_err(|_| anyhow!("invalid token signature"))?;
        let claims: Claims = serde_json::from_slice(&body)?;
        if claims.exp_ms <= now_ms {
            return Err(anyhow!("token expired"));
        }
        Ok(claims)
    }
}
