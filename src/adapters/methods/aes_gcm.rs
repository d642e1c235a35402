//! AES-GCM authenticated encryption method.
//!
//! Ciphertext layout:
//!
//! ```text
//! [nonce: 12 bytes][ciphertext + tag: variable]
//! ```

use std::sync::Arc;

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::aes::Aes192;
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm, Nonce};
use serde::Deserialize;
use tracing::debug;

use crate::adapters::decode_body;
use crate::adapters::random::OsRandom;
use crate::core::errors::{EncryptionError, Result};
use crate::core::models::key_output::KeyOutput;
use crate::core::traits::method::{Method, MethodDescriptor, MethodInstance};
use crate::core::traits::random::RandomSource;

pub const TYPE_NAME: &str = "aes_gcm";

pub const NONCE_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;

type Aes192Gcm = AesGcm<Aes192, U12>;
type AeadResult = std::result::Result<Vec<u8>, aes_gcm::Error>;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AesGcmConfig {
    /// Additional authenticated data bound to every ciphertext.
    #[serde(default)]
    aad: Option<String>,
}

enum Cipher {
    Aes128(Aes128Gcm),
    Aes192(Aes192Gcm),
    Aes256(Aes256Gcm),
}

impl Cipher {
    fn new(key: &[u8], role: &str) -> Result<Self> {
        let cipher = match key.len() {
            16 => Aes128Gcm::new_from_slice(key).map(Self::Aes128),
            24 => Aes192Gcm::new_from_slice(key).map(Self::Aes192),
            32 => Aes256Gcm::new_from_slice(key).map(Self::Aes256),
            other => {
                return Err(EncryptionError::InvalidConfig {
                    subject: format!("{TYPE_NAME} method"),
                    detail: format!(
                        "{role} key is {other} bytes; AES-GCM needs 16, 24 or 32 bytes. \
                         Adjust key_length on the key provider"
                    ),
                });
            }
        };
        cipher.map_err(|e| EncryptionError::InvalidConfig {
            subject: format!("{TYPE_NAME} method"),
            detail: e.to_string(),
        })
    }

    fn seal(&self, nonce: &[u8], payload: Payload<'_, '_>) -> AeadResult {
        let nonce = Nonce::<U12>::from_slice(nonce);
        match self {
            Self::Aes128(c) => c.encrypt(nonce, payload),
            Self::Aes192(c) => c.encrypt(nonce, payload),
            Self::Aes256(c) => c.encrypt(nonce, payload),
        }
    }

    fn open(&self, nonce: &[u8], payload: Payload<'_, '_>) -> AeadResult {
        let nonce = Nonce::<U12>::from_slice(nonce);
        match self {
            Self::Aes128(c) => c.decrypt(nonce, payload),
            Self::Aes192(c) => c.decrypt(nonce, payload),
            Self::Aes256(c) => c.decrypt(nonce, payload),
        }
    }
}

/// Builds AES-GCM methods.
pub struct AesGcmDescriptor {
    random: Arc<dyn RandomSource>,
}

impl AesGcmDescriptor {
    pub fn new() -> Self {
        Self::with_random_source(Arc::new(OsRandom))
    }

    pub fn with_random_source(random: Arc<dyn RandomSource>) -> Self {
        Self { random }
    }
}

impl Default for AesGcmDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

impl MethodDescriptor for AesGcmDescriptor {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn build(&self, body: &toml::Table, keys: Vec<KeyOutput>) -> Result<MethodInstance> {
        let config: AesGcmConfig = decode_body(TYPE_NAME, body)?;
        let aad = config.aad.map(String::into_bytes);
        let method = AesGcmMethod::new(&keys, aad, Arc::clone(&self.random))?;
        Ok(MethodInstance::Cipher(Box::new(method)))
    }
}

/// AES-GCM with a random 96-bit nonce per message.
///
/// The first key provider's encryption key seals data. Opening tries the
/// decryption key of every referenced provider in order, so a method can
/// read data sealed under an older key while writing with a new one.
pub struct AesGcmMethod {
    encryptor: Cipher,
    decryptors: Vec<Cipher>,
    aad: Vec<u8>,
    random: Arc<dyn RandomSource>,
}

impl AesGcmMethod {
    pub fn new(
        keys: &[KeyOutput],
        aad: Option<Vec<u8>>,
        random: Arc<dyn RandomSource>,
    ) -> Result<Self> {
        let Some(primary) = keys.first() else {
            return Err(EncryptionError::InvalidConfig {
                subject: format!("{TYPE_NAME} method"),
                detail: "at least one key provider must be referenced in keys".into(),
            });
        };

        let encryptor = Cipher::new(&primary.encryption_key, "encryption")?;
        let decryptors = keys
            .iter()
            .filter_map(|k| k.decryption_key.as_deref())
            .map(|k| Cipher::new(k, "decryption"))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            encryptor,
            decryptors,
            aad: aad.unwrap_or_default(),
            random,
        })
    }
}

impl Method for AesGcmMethod {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0u8; NONCE_SIZE];
        self.random
            .fill(&mut nonce)
            .map_err(|e| EncryptionError::EncryptionFailed {
                target: TYPE_NAME.into(),
                reason: format!("could not generate nonce: {e}"),
            })?;

        let sealed = self
            .encryptor
            .seal(&nonce, Payload { msg: plaintext, aad: &self.aad })
            .map_err(|_| EncryptionError::EncryptionFailed {
                target: TYPE_NAME.into(),
                reason: "AES-GCM seal failed".into(),
            })?;

        let mut result = Vec::with_capacity(NONCE_SIZE + sealed.len());
        result.extend_from_slice(&nonce);
        result.extend_from_slice(&sealed);
        Ok(result)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
            return Err(EncryptionError::DecryptionFailed);
        }
        let (nonce, sealed) = ciphertext.split_at(NONCE_SIZE);

        for (index, cipher) in self.decryptors.iter().enumerate() {
            match cipher.open(nonce, Payload { msg: sealed, aad: &self.aad }) {
                Ok(plaintext) => return Ok(plaintext),
                Err(_) => debug!(key_index = index, "AES-GCM open failed with key"),
            }
        }
        Err(EncryptionError::DecryptionFailed)
    }

    fn name(&self) -> &str {
        TYPE_NAME
    }
}
