//! Encryption at rest for users' OpenRouter API keys

use crate::error::{config_error, credential_error, AppResult, Error};
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::fmt;
use tracing::warn;

pub const UNREADABLE_KEY: &str =
    "Stored API key could not be decrypted. Please re-configure your key in settings.";

const NONCE_LEN: usize = 12;

/// Base64 ciphertext and nonce as stored in `user_settings`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedKey {
    pub ciphertext: String,
    /// Stored in the `iv` column
    pub iv: String,
}

/// AES-256-GCM cipher for API keys
#[derive(Clone)]
pub struct ApiKeyCipher {
    cipher: Aes256Gcm,
}

impl fmt::Debug for ApiKeyCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl ApiKeyCipher {
    /// Build from a base64 encoded 32 byte key
    pub fn new(encoded_key: &str) -> AppResult<Self> {
        let key = BASE64
            .decode(encoded_key.trim())
            .map_err(|_| config_error("ENCRYPTION_KEY must be base64"))?;
        if key.len() != 32 {
            return Err(config_error("ENCRYPTION_KEY must decode to exactly 32 bytes"));
        }
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| config_error(&format!("Failed to create cipher: {}", e)))?;
        Ok(Self { cipher })
    }

    /// Encrypt with a fresh random nonce
    pub fn encrypt(&self, plaintext: &str) -> AppResult<EncryptedKey> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| Error::Config(format!("Encryption failed: {}", e)))?;

        Ok(EncryptedKey {
            ciphertext: BASE64.encode(ciphertext),
            iv: BASE64.encode(nonce),
        })
    }

    /// Any failure surfaces as a credential error asking the user to re-enter the key
    pub fn decrypt(&self, ciphertext: &str, iv: &str) -> AppResult<String> {
        self.try_decrypt(ciphertext, iv).map_err(|cause| {
            warn!("API key decryption failed: {}", cause);
            credential_error(UNREADABLE_KEY)
        })
    }

    fn try_decrypt(&self, ciphertext: &str, iv: &str) -> Result<String, String> {
        let nonce = BASE64.decode(iv).map_err(|e| format!("bad iv encoding: {}", e))?;
        if nonce.len() != NONCE_LEN {
            return Err(format!("iv has {} bytes, expected {}", nonce.len(), NONCE_LEN));
        }
        let ciphertext = BASE64
            .decode(ciphertext)
            .map_err(|e| format!("bad ciphertext encoding: {}", e))?;

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref())
            .map_err(|_| "authentication failed".to_string())?;

        String::from_utf8(plaintext).map_err(|_| "plaintext is not UTF-8".to_string())
    }
}
