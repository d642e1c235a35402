pub mod key_providers;
pub mod methods;
pub mod random;

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::core::errors::{EncryptionError, Result};
use crate::core::services::registry::Registry;

use key_providers::pbkdf2::Pbkdf2Descriptor;
use key_providers::static_key::StaticKeyDescriptor;
use methods::aes_gcm::AesGcmDescriptor;
use methods::unencrypted::UnencryptedDescriptor;

/// Registry holding every built-in key provider and method.
pub fn default_registry() -> Result<Registry> {
    let registry = Registry::new();
    registry.register_key_provider(Arc::new(StaticKeyDescriptor))?;
    registry.register_key_provider(Arc::new(Pbkdf2Descriptor::new()))?;
    registry.register_method(Arc::new(AesGcmDescriptor::new()))?;
    registry.register_method(Arc::new(UnencryptedDescriptor))?;
    Ok(registry)
}

/// Deserialize a block body into a type's typed settings.
pub(crate) fn decode_body<T: DeserializeOwned>(type_name: &str, body: &toml::Table) -> Result<T> {
    toml::Value::Table(body.clone())
        .try_into()
        .map_err(|e: toml::de::Error| EncryptionError::InvalidConfig {
            subject: format!("{type_name} block"),
            detail: e.to_string(),
        })
}
