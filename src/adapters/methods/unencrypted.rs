use crate::core::errors::{EncryptionError, Result};
use crate::core::models::key_output::KeyOutput;
use crate::core::traits::method::{MethodDescriptor, MethodInstance};

pub const TYPE_NAME: &str = "unencrypted";

/// Method that marks a chain step as "data is not encrypted".
///
/// Referenced as a fallback while migrating existing plaintext, or as the
/// primary method while migrating back out of encryption. It takes no keys
/// and no settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnencryptedDescriptor;

impl MethodDescriptor for UnencryptedDescriptor {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn build(&self, body: &toml::Table, keys: Vec<KeyOutput>) -> Result<MethodInstance> {
        if !keys.is_empty() {
            return Err(EncryptionError::InvalidConfig {
                subject: format!("{TYPE_NAME} method"),
                detail: "the unencrypted method does not take keys".into(),
            });
        }
        if let Some(field) = body.keys().next() {
            return Err(EncryptionError::InvalidConfig {
                subject: format!("{TYPE_NAME} method"),
                detail: format!("unexpected setting '{field}'; this method has no settings"),
            });
        }
        Ok(MethodInstance::Unencrypted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_marker() {
        let built = UnencryptedDescriptor.build(&toml::Table::new(), Vec::new()).unwrap();
        assert!(matches!(built, MethodInstance::Unencrypted));
    }

    #[test]
    fn rejects_keys_and_settings() {
        let keys = vec![KeyOutput::new(vec![1; 32], None)];
        assert!(UnencryptedDescriptor.build(&toml::Table::new(), keys).is_err());

        let mut body = toml::Table::new();
        body.insert("aad".into(), toml::Value::String("x".into()));
        assert!(UnencryptedDescriptor.build(&body, Vec::new()).is_err());
    }
}
