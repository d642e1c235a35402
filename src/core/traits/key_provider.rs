use crate::core::errors::Result;
use crate::core::models::key_output::KeyOutput;

/// Port for key providers: the components that turn a secret input
/// (passphrase, static key, remote KMS key) into symmetric key material.
///
/// Implementations live in `adapters::key_providers`.
pub trait KeyProvider: Send + Sync {
    /// Produce key material.
    ///
    /// With `meta == None` the provider returns a fresh encryption key and no
    /// decryption key. With the metadata of a previous encryption it also
    /// reproduces that encryption's key as the decryption key. The returned
    /// metadata (if any) must be persisted with the ciphertext.
    ///
    /// Providers backed by a remote service report network problems as
    /// `KeyProviderFailure` and never retry internally.
    fn provide(&self, meta: Option<&[u8]>) -> Result<(KeyOutput, Option<Vec<u8>>)>;
}

/// Registry entry that builds [`KeyProvider`]s of one type.
pub trait KeyProviderDescriptor: Send + Sync {
    /// Block type this descriptor handles (e.g. "pbkdf2").
    fn type_name(&self) -> &str;

    /// Build a provider from the block body.
    fn build(&self, body: &toml::Table) -> Result<Box<dyn KeyProvider>>;
}
