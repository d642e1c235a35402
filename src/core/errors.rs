use crate::core::models::addr::PluginKind;
use crate::core::models::diagnostics::Diagnostics;

/// All domain errors for stateseal.
///
/// Configuration problems are accumulated into [`Diagnostics`] and surface
/// through the `Diagnostics` variant; every other variant is a single
/// per-call failure that is fatal to the read or write that produced it.
#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    #[error(
        "Duplicate registration of {kind} type '{type_name}'\n\n  \
         A {kind} with this type name is already registered.\n  \
         Each type name can only be registered once per registry."
    )]
    DuplicateRegistration { kind: PluginKind, type_name: String },

    #[error(
        "Unknown {kind} type '{type_name}'\n\n  \
         No {kind} with this type name is registered.\n  \
         Check the block type in your encryption configuration."
    )]
    UnknownType { kind: PluginKind, type_name: String },

    #[error("Invalid configuration for {subject}: {detail}")]
    InvalidConfig { subject: String, detail: String },

    #[error(
        "Invalid key provider metadata: {detail}\n\n  \
         The metadata stored alongside the encrypted data is incomplete or corrupted.\n  \
         Without it the decryption key cannot be reproduced."
    )]
    InvalidMetadata { detail: String },

    #[error("Key provider failure: {reason}")]
    KeyProviderFailure { reason: String },

    #[error("Encryption of {target} failed: {reason}")]
    EncryptionFailed { target: String, reason: String },

    #[error("Decryption failed: no configured key could authenticate the data")]
    DecryptionFailed,

    #[error(
        "Encryption of {target} is enforced, but no encryption method is configured\n\n  \
         Solutions:\n    \
         → Set 'method' on the {target} block to a configured method\n    \
         → Or remove 'enforced = true' to allow unencrypted writes"
    )]
    EncryptionRequired { target: String },

    #[error(
        "Unencrypted data was provided for {target}, but no fallback allows it\n\n  \
         To migrate existing unencrypted data, add a fallback that uses an\n  \
         unencrypted method:\n    \
         [method.unencrypted.migrate]\n    \
         [{target}.fallback]\n    \
         method = \"method.unencrypted.migrate\""
    )]
    MissingFallbackForPlaintext { target: String },

    #[error(
        "Unsupported encryption envelope version '{found}' (supported: '{supported}')\n\n  \
         The data was written by a newer or incompatible release."
    )]
    UnsupportedEnvelopeVersion {
        found: String,
        supported: &'static str,
    },

    #[error("Malformed encryption envelope: {detail}")]
    MalformedEnvelope { detail: String },

    #[error("Unable to determine the data structure of {target} during decryption: {detail}")]
    UnrecognizedPayload { target: String, detail: String },

    #[error("Invalid payload: {detail}")]
    InvalidPayload { detail: String },

    #[error(
        "Decryption of {target} failed for all configured methods:\n{}",
        bullet_list(.attempts)
    )]
    AllDecryptionAttemptsFailed {
        target: String,
        attempts: Vec<String>,
    },

    #[error(
        "{target} holds encrypted data, but no encryption is configured for it\n\n  \
         Add a {target} block with the method and key provider used to write it."
    )]
    EncryptedWithoutConfig { target: String },

    #[error("{0}")]
    Diagnostics(Diagnostics),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<Diagnostics> for EncryptionError {
    fn from(diags: Diagnostics) -> Self {
        EncryptionError::Diagnostics(diags)
    }
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("  → {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EncryptionError>;
