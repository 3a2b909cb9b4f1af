//! Encrypted at-rest storage for the wallet mnemonic.
//!
//! The recovery phrase is sealed with AES-256-GCM under an argon2-derived
//! key and written as a small JSON envelope in the per-network data
//! directory. A wrong password surfaces as its own error (GCM authentication
//! failure), not as a generic crypto error.

use std::fs;
use std::path::{Path, PathBuf};

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroize;

const KEYSTORE_FILE: &str = "keystore_encrypted.json";
const ENVELOPE_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum KeystoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("unsupported keystore version: {0}")]
    Version(u32),

    #[error("wrong password")]
    WrongPassword,
}

#[derive(Serialize, Deserialize)]
struct KeystoreEnvelope {
    version: u32,
    salt: String,
    nonce: String,
    ciphertext: String,
}

pub struct KeystorePersister {
    file_path: PathBuf,
}

impl KeystorePersister {
    pub fn new(data_dir: &Path, network: &str) -> Self {
        Self {
            file_path: data_dir.join(network).join(KEYSTORE_FILE),
        }
    }

    pub fn exists(&self) -> bool {
        self.file_path.exists()
    }

    fn derive_key(password: &str, salt: &[u8]) -> Result<[u8; 32], KeystoreError> {
        let mut key = [0u8; 32];
        argon2::Argon2::default()
            .hash_password_into(password.as_bytes(), salt, &mut key)
            .map_err(|e| KeystoreError::Crypto(e.to_string()))?;
        Ok(key)
    }

    pub fn save(&self, mnemonic: &str, password: &str) -> Result<(), KeystoreError> {
        let salt: [u8; 16] = rand::random();
        let mut key = Self::derive_key(password, &salt)?;

        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| KeystoreError::Crypto(e.to_string()))?;
        key.zeroize();
        let nonce_bytes: [u8; 12] = rand::random();
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), mnemonic.as_bytes())
            .map_err(|e| KeystoreError::Crypto(e.to_string()))?;

        let envelope = KeystoreEnvelope {
            version: ENVELOPE_VERSION,
            salt: BASE64.encode(salt),
            nonce: BASE64.encode(nonce_bytes),
            ciphertext: BASE64.encode(ciphertext),
        };

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.file_path, serde_json::to_string_pretty(&envelope)?)?;
        Ok(())
    }

    pub fn load(&self, password: &str) -> Result<String, KeystoreError> {
        let contents = fs::read_to_string(&self.file_path)?;
        let envelope: KeystoreEnvelope = serde_json::from_str(&contents)?;
        if envelope.version != ENVELOPE_VERSION {
            return Err(KeystoreError::Version(envelope.version));
        }

        let salt = BASE64
            .decode(&envelope.salt)
            .map_err(|e| KeystoreError::Crypto(e.to_string()))?;
        let mut key = Self::derive_key(password, &salt)?;
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| KeystoreError::Crypto(e.to_string()))?;
        key.zeroize();

        let nonce_bytes = BASE64
            .decode(&envelope.nonce)
            .map_err(|e| KeystoreError::Crypto(e.to_string()))?;
        let ciphertext = BASE64
            .decode(&envelope.ciphertext)
            .map_err(|e| KeystoreError::Crypto(e.to_string()))?;

        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|_| KeystoreError::WrongPassword)?;

        String::from_utf8(plaintext).map_err(|e| KeystoreError::Crypto(e.to_string()))
    }

    pub fn delete(&self) -> Result<(), KeystoreError> {
        if self.file_path.exists() {
            fs::remove_file(&self.file_path)?;
        }
        Ok(())
    }
}
