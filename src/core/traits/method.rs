use crate::core::errors::Result;
use crate::core::models::key_output::KeyOutput;

/// Port for encryption methods.
///
/// Implementations live in `adapters::methods`. The byte layout produced by
/// `encrypt` is private to the method; the envelope treats it as opaque.
pub trait Method: Send + Sync {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;

    /// Human-readable name of this method (e.g. "aes_gcm").
    fn name(&self) -> &str;
}

/// What a method block builds into.
pub enum MethodInstance {
    Cipher(Box<dyn Method>),
    /// Marks a chain step that expects already unencrypted data.
    Unencrypted,
}

/// Registry entry that builds methods of one type.
pub trait MethodDescriptor: Send + Sync {
    /// Block type this descriptor handles (e.g. "aes_gcm").
    fn type_name(&self) -> &str;

    /// Build a method from the block body and the key material of the key
    /// providers the block references, in reference order.
    fn build(&self, body: &toml::Table, keys: Vec<KeyOutput>) -> Result<MethodInstance>;
}
