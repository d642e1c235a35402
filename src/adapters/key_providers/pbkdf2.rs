use std::sync::Arc;

use ::pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha512};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::adapters::decode_body;
use crate::adapters::random::OsRandom;
use crate::core::errors::{EncryptionError, Result};
use crate::core::models::encoding::base64_bytes;
use crate::core::models::key_output::KeyOutput;
use crate::core::traits::key_provider::{KeyProvider, KeyProviderDescriptor};
use crate::core::traits::random::RandomSource;

pub const TYPE_NAME: &str = "pbkdf2";

pub const DEFAULT_KEY_LENGTH: usize = 32;
pub const DEFAULT_ITERATIONS: u32 = 600_000;
pub const DEFAULT_SALT_LENGTH: usize = 32;
/// Upper bounds applied to configured and stored parameters alike.
pub const MAX_KEY_LENGTH: usize = 64;
pub const MAX_ITERATIONS: u32 = 10_000_000;
const RECOMMENDED_PASSPHRASE_LENGTH: usize = 16;

/// HMAC hash used by the derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashFunction {
    Sha256,
    #[default]
    Sha512,
}

impl HashFunction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "sha256" => Some(Self::Sha256),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }
}

fn default_key_length() -> usize {
    DEFAULT_KEY_LENGTH
}

fn default_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

fn default_salt_length() -> usize {
    DEFAULT_SALT_LENGTH
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Pbkdf2Config {
    passphrase: String,
    #[serde(default = "default_key_length")]
    key_length: usize,
    #[serde(default = "default_iterations")]
    iterations: u32,
    #[serde(default = "default_salt_length")]
    salt_length: usize,
    #[serde(default)]
    hash_function: HashFunction,
}

impl Pbkdf2Config {
    fn validate(&self) -> Result<()> {
        let invalid = |detail: &str| EncryptionError::InvalidConfig {
            subject: format!("{TYPE_NAME} key provider"),
            detail: detail.to_string(),
        };

        if self.passphrase.is_empty() {
            return Err(invalid("passphrase must not be empty"));
        }
        if self.key_length == 0 || self.key_length > MAX_KEY_LENGTH {
            return Err(invalid(&format!(
                "key_length must be between 1 and {MAX_KEY_LENGTH}"
            )));
        }
        if self.iterations == 0 || self.iterations > MAX_ITERATIONS {
            return Err(invalid(&format!(
                "iterations must be between 1 and {MAX_ITERATIONS}"
            )));
        }
        if self.salt_length == 0 {
            return Err(invalid("salt_length must be greater than zero"));
        }

        if self.passphrase.chars().count() < RECOMMENDED_PASSPHRASE_LENGTH {
            warn!(
                "{TYPE_NAME} passphrase is shorter than {RECOMMENDED_PASSPHRASE_LENGTH} characters"
            );
        }
        if self.iterations < DEFAULT_ITERATIONS {
            warn!(
                iterations = self.iterations,
                "{TYPE_NAME} iteration count is below the recommended {DEFAULT_ITERATIONS}"
            );
        }
        Ok(())
    }
}

/// Derivation parameters stored next to the ciphertext.
///
/// Serialized as JSON: `{"salt": "<base64>", "iterations": n,
/// "hash_function": "sha512", "key_length": n}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pbkdf2Metadata {
    #[serde(with = "base64_bytes", default)]
    pub salt: Vec<u8>,
    #[serde(default)]
    pub iterations: u32,
    #[serde(default)]
    pub hash_function: String,
    #[serde(default)]
    pub key_length: usize,
}

impl Pbkdf2Metadata {
    fn decode(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw).map_err(|e| EncryptionError::InvalidMetadata {
            detail: format!("{TYPE_NAME} metadata is not valid JSON: {e}"),
        })
    }

    /// Salt length is not compared with the configured `salt_length`, so
    /// reconfiguring the provider never orphans existing data.
    fn validate(&self) -> Result<HashFunction> {
        let invalid = |detail: String| EncryptionError::InvalidMetadata { detail };

        if self.salt.is_empty() {
            return Err(invalid(format!("{TYPE_NAME} metadata has no salt")));
        }
        if self.iterations == 0 {
            return Err(invalid(format!("{TYPE_NAME} metadata has no iteration count")));
        }
        if self.iterations > MAX_ITERATIONS {
            return Err(invalid(format!(
                "{TYPE_NAME} metadata iteration count {} exceeds {MAX_ITERATIONS}",
                self.iterations
            )));
        }
        if self.key_length == 0 {
            return Err(invalid(format!("{TYPE_NAME} metadata has no key length")));
        }
        if self.key_length > MAX_KEY_LENGTH {
            return Err(invalid(format!(
                "{TYPE_NAME} metadata key length {} exceeds {MAX_KEY_LENGTH}",
                self.key_length
            )));
        }
        HashFunction::from_name(&self.hash_function).ok_or_else(|| {
            invalid(format!(
                "{TYPE_NAME} metadata names unsupported hash function '{}'",
                self.hash_function
            ))
        })
    }
}

/// Derive `key_length` bytes from a passphrase with PBKDF2-HMAC.
pub fn derive_key(
    passphrase: &[u8],
    salt: &[u8],
    iterations: u32,
    key_length: usize,
    hash: HashFunction,
) -> Vec<u8> {
    let mut key = vec![0u8; key_length];
    match hash {
        HashFunction::Sha256 => pbkdf2_hmac::<Sha256>(passphrase, salt, iterations, &mut key),
        HashFunction::Sha512 => pbkdf2_hmac::<Sha512>(passphrase, salt, iterations, &mut key),
    }
    key
}

/// Builds passphrase-based key providers.
pub struct Pbkdf2Descriptor {
    random: Arc<dyn RandomSource>,
}

impl Pbkdf2Descriptor {
    pub fn new() -> Self {
        Self::with_random_source(Arc::new(OsRandom))
    }

    pub fn with_random_source(random: Arc<dyn RandomSource>) -> Self {
        Self { random }
    }
}

impl Default for Pbkdf2Descriptor {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyProviderDescriptor for Pbkdf2Descriptor {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn build(&self, body: &toml::Table) -> Result<Box<dyn KeyProvider>> {
        let config: Pbkdf2Config = decode_body(TYPE_NAME, body)?;
        config.validate()?;
        Ok(Box::new(Pbkdf2Provider {
            passphrase: Zeroizing::new(config.passphrase),
            key_length: config.key_length,
            iterations: config.iterations,
            salt_length: config.salt_length,
            hash_function: config.hash_function,
            random: Arc::clone(&self.random),
        }))
    }
}

/// Key provider deriving keys from a passphrase.
///
/// Every call produces a fresh salt for the encryption key. When stored
/// metadata is passed in, the decryption key is re-derived from the salt
/// and parameters recorded there, not from the current configuration.
pub struct Pbkdf2Provider {
    passphrase: Zeroizing<String>,
    key_length: usize,
    iterations: u32,
    salt_length: usize,
    hash_function: HashFunction,
    random: Arc<dyn RandomSource>,
}

impl Pbkdf2Provider {
    fn generate_metadata(&self) -> Result<Pbkdf2Metadata> {
        let mut salt = vec![0u8; self.salt_length];
        self.random.fill(&mut salt)?;
        Ok(Pbkdf2Metadata {
            salt,
            iterations: self.iterations,
            hash_function: self.hash_function.as_str().to_string(),
            key_length: self.key_length,
        })
    }
}

impl KeyProvider for Pbkdf2Provider {
    fn provide(&self, meta: Option<&[u8]>) -> Result<(KeyOutput, Option<Vec<u8>>)> {
        let decryption_key = match meta.filter(|raw| !raw.is_empty()) {
            Some(raw) => {
                let stored = Pbkdf2Metadata::decode(raw)?;
                let hash = stored.validate()?;
                debug!(
                    iterations = stored.iterations,
                    hash_function = hash.as_str(),
                    "deriving decryption key from stored parameters"
                );
                Some(derive_key(
                    self.passphrase.as_bytes(),
                    &stored.salt,
                    stored.iterations,
                    stored.key_length,
                    hash,
                ))
            }
            None => None,
        };

        let fresh = self.generate_metadata()?;
        let encryption_key = derive_key(
            self.passphrase.as_bytes(),
            &fresh.salt,
            fresh.iterations,
            fresh.key_length,
            self.hash_function,
        );
        let encoded = serde_json::to_vec(&fresh).map_err(|e| EncryptionError::KeyProviderFailure {
            reason: format!("failed to encode {TYPE_NAME} metadata: {e}"),
        })?;

        Ok((KeyOutput::new(encryption_key, decryption_key), Some(encoded)))
    }
}
