use serde::Deserialize;

use crate::adapters::decode_body;
use crate::core::errors::{EncryptionError, Result};
use crate::core::models::key_output::KeyOutput;
use crate::core::traits::key_provider::{KeyProvider, KeyProviderDescriptor};

pub const TYPE_NAME: &str = "static";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StaticConfig {
    /// Hex-encoded key.
    key: String,
}

/// Key provider returning a fixed, hex-encoded key.
///
/// Meant for tests and for wrapping keys managed outside this tool. The
/// same key encrypts and decrypts, so no metadata is produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticKeyDescriptor;

impl KeyProviderDescriptor for StaticKeyDescriptor {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn build(&self, body: &toml::Table) -> Result<Box<dyn KeyProvider>> {
        let config: StaticConfig = decode_body(TYPE_NAME, body)?;
        Ok(Box::new(StaticKeyProvider::from_hex(&config.key)?))
    }
}

pub struct StaticKeyProvider {
    key: Vec<u8>,
}

impl StaticKeyProvider {
    pub fn from_hex(key: &str) -> Result<Self> {
        let key = hex::decode(key.trim()).map_err(|e| EncryptionError::InvalidConfig {
            subject: format!("{TYPE_NAME} key provider"),
            detail: format!("key must be hex encoded: {e}"),
        })?;
        if key.is_empty() {
            return Err(EncryptionError::InvalidConfig {
                subject: format!("{TYPE_NAME} key provider"),
                detail: "key must not be empty".into(),
            });
        }
        Ok(Self { key })
    }
}

impl KeyProvider for StaticKeyProvider {
    fn provide(&self, _meta: Option<&[u8]>) -> Result<(KeyOutput, Option<Vec<u8>>)> {
        Ok((KeyOutput::new(self.key.clone(), Some(self.key.clone())), None))
    }
}

impl Drop for StaticKeyProvider {
    fn drop(&mut self) {
        zeroize::Zeroize::zeroize(&mut self.key);
    }
}
