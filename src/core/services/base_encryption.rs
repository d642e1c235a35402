use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::encryption_config::TargetConfig;
use crate::core::errors::{EncryptionError, Result};
use crate::core::models::chain::ChainEntry;
use crate::core::models::diagnostics::Diagnostics;
use crate::core::models::envelope::{ENCRYPTION_VERSION, Envelope, is_encryption_payload};
use crate::core::models::key_output::MetaMap;
use crate::core::services::payload_validators::Validator;
use crate::core::services::target_resolver::TargetResolver;

struct BoundTarget {
    resolver: Arc<TargetResolver>,
    config: TargetConfig,
}

/// Encryption engine for one logical target (state, plan, ...).
///
/// The method chain and the key provider metadata used for writing are
/// built once, when the engine is constructed. Every later `encrypt` reuses
/// them, so writes keep working even if a key provider becomes unreachable
/// mid-run. Both are immutable afterwards; one engine can be shared across
/// threads.
pub struct BaseEncryption {
    target: Option<BoundTarget>,
    enforced: bool,
    name: String,
    chain: Vec<ChainEntry>,
    enc_meta: MetaMap,
}

impl BaseEncryption {
    /// Build the engine for `target`. `None` yields a pass-through engine.
    pub fn new(
        resolver: Arc<TargetResolver>,
        target: Option<TargetConfig>,
        enforced: bool,
        name: impl Into<String>,
    ) -> std::result::Result<Self, Diagnostics> {
        let name = name.into();
        let Some(config) = target else {
            return Ok(Self::disabled(name));
        };

        let (chain, enc_meta) = resolver.resolve(&config, &name, &MetaMap::new())?;
        debug!(target_name = %name, enforced, steps = chain.len(), "encryption target ready");
        Ok(Self {
            target: Some(BoundTarget { resolver, config }),
            enforced,
            name,
            chain,
            enc_meta,
        })
    }

    /// An engine that passes data through untouched.
    pub fn disabled(name: impl Into<String>) -> Self {
        Self {
            target: None,
            enforced: false,
            name: name.into(),
            chain: Vec::new(),
            enc_meta: MetaMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_configured(&self) -> bool {
        self.target.is_some()
    }

    pub fn is_enforced(&self) -> bool {
        self.enforced
    }

    /// The steps tried on decryption, in order. The first one encrypts.
    pub fn chain(&self) -> &[ChainEntry] {
        &self.chain
    }

    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        if self.target.is_none() {
            return Ok(data.to_vec());
        }

        let Some(ChainEntry::Method { addr, method }) = self.chain.first() else {
            if self.enforced {
                return Err(EncryptionError::EncryptionRequired {
                    target: self.name.clone(),
                });
            }
            warn!(target_name = %self.name, "no encryption method configured, writing unencrypted data");
            return Ok(data.to_vec());
        };

        let sealed = method
            .encrypt(data)
            .map_err(|e| EncryptionError::EncryptionFailed {
                target: self.name.clone(),
                reason: e.to_string(),
            })?;
        debug!(target_name = %self.name, method = %addr, "encrypted payload");
        Envelope::new(self.enc_meta.clone(), sealed).to_vec()
    }

    /// Decrypt `data`, or accept it as already unencrypted when `validator`
    /// recognizes it and the chain allows plaintext.
    pub fn decrypt(&self, data: &[u8], validator: &Validator) -> Result<Vec<u8>> {
        let Some(target) = &self.target else {
            if is_encryption_payload(data) {
                return Err(EncryptionError::EncryptedWithoutConfig {
                    target: self.name.clone(),
                });
            }
            return Ok(data.to_vec());
        };

        let version = match Envelope::probe(data) {
            Ok(Some(version)) => version,
            Ok(None) => return self.accept_plaintext(data, validator, None),
            Err(parse_err) => return self.accept_plaintext(data, validator, Some(parse_err)),
        };

        if version != ENCRYPTION_VERSION {
            return Err(EncryptionError::UnsupportedEnvelopeVersion {
                found: version,
                supported: ENCRYPTION_VERSION,
            });
        }

        let envelope = Envelope::from_slice(data)?;
        let (chain, _) = target.resolver.resolve(&target.config, &self.name, &envelope.meta)?;

        if chain.is_empty() {
            validator(data).map_err(|e| EncryptionError::UnrecognizedPayload {
                target: self.name.clone(),
                detail: e.to_string(),
            })?;
            return Ok(data.to_vec());
        }

        let mut attempts = Vec::with_capacity(chain.len());
        for entry in &chain {
            match entry {
                ChainEntry::Plaintext { .. } => match validator(data) {
                    Ok(()) => return Ok(data.to_vec()),
                    Err(e) => attempts.push(format!("{entry}: payload is not already decrypted: {e}")),
                },
                ChainEntry::Method { addr, method } => match method.decrypt(&envelope.data) {
                    Ok(plaintext) => {
                        debug!(target_name = %self.name, method = %addr, "decrypted payload");
                        return Ok(plaintext);
                    }
                    Err(e) => {
                        debug!(target_name = %self.name, method = %addr, "decryption attempt failed");
                        attempts.push(format!("{addr}: {e}"));
                    }
                },
            }
        }

        Err(EncryptionError::AllDecryptionAttemptsFailed {
            target: self.name.clone(),
            attempts,
        })
    }

    fn accept_plaintext(
        &self,
        data: &[u8],
        validator: &Validator,
        parse_err: Option<serde_json::Error>,
    ) -> Result<Vec<u8>> {
        if let Err(e) = validator(data) {
            let detail = match parse_err {
                Some(parse_err) => format!("{parse_err}; {e}"),
                None => e.to_string(),
            };
            return Err(EncryptionError::UnrecognizedPayload {
                target: self.name.clone(),
                detail,
            });
        }

        if self.chain.iter().any(ChainEntry::is_plaintext) {
            warn!(target_name = %self.name, "reading unencrypted data through a fallback");
            return Ok(data.to_vec());
        }
        Err(EncryptionError::MissingFallbackForPlaintext {
            target: self.name.clone(),
        })
    }
}
