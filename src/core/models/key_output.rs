use std::collections::BTreeMap;
use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::core::models::addr::KeyProviderAddr;

/// Opaque key provider metadata, keyed by the provider that produced it.
pub type MetaMap = BTreeMap<KeyProviderAddr, Vec<u8>>;

/// Key material produced by a key provider.
///
/// `decryption_key` is only present when the provider was handed the
/// metadata of a previous encryption (or needs none, like a static key).
/// Both keys are wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyOutput {
    pub encryption_key: Vec<u8>,
    pub decryption_key: Option<Vec<u8>>,
}

impl KeyOutput {
    pub fn new(encryption_key: Vec<u8>, decryption_key: Option<Vec<u8>>) -> Self {
        Self {
            encryption_key,
            decryption_key,
        }
    }
}

impl fmt::Debug for KeyOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyOutput")
            .field("encryption_key", &format_args!("[{} bytes redacted]", self.encryption_key.len()))
            .field("decryption_key", &self.decryption_key.as_ref().map(|k| k.len()))
            .finish()
    }
}
