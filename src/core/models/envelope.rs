use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::errors::{EncryptionError, Result};
use crate::core::models::encoding::{base64_bytes, base64_map};
use crate::core::models::key_output::MetaMap;

/// The only envelope format version this build reads and writes.
pub const ENCRYPTION_VERSION: &str = "v0";

/// The JSON wrapper around every encrypted payload.
///
/// ```json
/// {
///   "meta": {"key_provider.pbkdf2.main": "eyJzYWx0Ijoi..."},
///   "encrypted_data": "q83vEjRW...",
///   "encryption_version": "v0"
/// }
/// ```
///
/// `encryption_version` is both the sigil that distinguishes an envelope
/// from arbitrary JSON and the compatibility tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, with = "base64_map")]
    pub meta: MetaMap,
    #[serde(rename = "encrypted_data", default, with = "base64_bytes")]
    pub data: Vec<u8>,
    #[serde(rename = "encryption_version", default)]
    pub version: String,
}

impl Envelope {
    /// Wrap method output and key metadata in a current-version envelope.
    pub fn new(meta: MetaMap, data: Vec<u8>) -> Self {
        Self {
            meta,
            data,
            version: ENCRYPTION_VERSION.to_string(),
        }
    }

    /// Return the envelope version if `data` is envelope-shaped.
    ///
    /// The check only looks at `encryption_version`, independent of whether
    /// the rest of the envelope decodes. `Err` carries the JSON parse error
    /// for input that is not a JSON object at all. Arrays are rejected even
    /// though a derived struct visitor would accept them positionally.
    pub fn probe(data: &[u8]) -> std::result::Result<Option<String>, serde_json::Error> {
        let mut object: Map<String, Value> = serde_json::from_slice(data)?;
        match object.remove("encryption_version") {
            None | Some(Value::Null) => Ok(None),
            Some(version) => {
                let version: String = serde_json::from_value(version)?;
                Ok(Some(version).filter(|v| !v.is_empty()))
            }
        }
    }

    pub fn from_slice(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|e| EncryptionError::MalformedEnvelope {
            detail: e.to_string(),
        })
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| EncryptionError::MalformedEnvelope {
            detail: format!("unable to encode encrypted data as JSON: {e}"),
        })
    }
}

/// Whether `data` is an encryption envelope, without decrypting it.
pub fn is_encryption_payload(data: &[u8]) -> bool {
    matches!(Envelope::probe(data), Ok(Some(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::addr::KeyProviderAddr;

    #[test]
    fn wire_format_uses_expected_field_names() {
        let mut meta = MetaMap::new();
        meta.insert(KeyProviderAddr::new("pbkdf2", "main").unwrap(), b"{}".to_vec());
        let envelope = Envelope::new(meta, vec![1, 2, 3]);

        let json: serde_json::Value = serde_json::from_slice(&envelope.to_vec().unwrap()).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 3);
        assert_eq!(obj["encryption_version"], "v0");
        assert_eq!(obj["encrypted_data"], "AQID");
        assert_eq!(obj["meta"]["key_provider.pbkdf2.main"], "e30=");
    }

    #[test]
    fn envelope_decodes_back() {
        let envelope = Envelope::new(MetaMap::new(), b"ciphertext".to_vec());
        let decoded = Envelope::from_slice(&envelope.to_vec().unwrap()).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn null_meta_decodes_as_empty() {
        let raw = br#"{"meta": null, "encrypted_data": "AQID", "encryption_version": "v0"}"#;
        let envelope = Envelope::from_slice(raw).unwrap();
        assert!(envelope.meta.is_empty());
        assert_eq!(envelope.data, vec![1, 2, 3]);
    }

    #[test]
    fn detects_envelopes_only() {
        let envelope = Envelope::new(MetaMap::new(), vec![9]).to_vec().unwrap();
        assert!(is_encryption_payload(&envelope));

        assert!(!is_encryption_payload(br#"{"version": 4, "serial": 1}"#));
        assert!(!is_encryption_payload(br#"{"encryption_version": ""}"#));
        assert!(!is_encryption_payload(b"PK\x03\x04 not json"));
        assert!(!is_encryption_payload(b"[1, 2, 3]"));
    }

    #[test]
    fn arrays_are_never_envelopes() {
        assert!(!is_encryption_payload(br#"["v0"]"#));
        assert!(!is_encryption_payload(br#"[{}, "AQID", "v0"]"#));
        assert!(Envelope::probe(br#"["v0"]"#).is_err());
    }

    #[test]
    fn non_string_version_is_not_an_envelope() {
        assert!(!is_encryption_payload(br#"{"encryption_version": 0}"#));
        assert!(!is_encryption_payload(br#"{"encryption_version": null}"#));
    }

    #[test]
    fn probe_ignores_undecodable_siblings() {
        // Shape detection must not depend on the rest of the envelope decoding.
        let raw = br#"{"encrypted_data": "***not base64***", "encryption_version": "v0"}"#;
        assert_eq!(Envelope::probe(raw).unwrap().as_deref(), Some("v0"));
        assert!(matches!(
            Envelope::from_slice(raw),
            Err(EncryptionError::MalformedEnvelope { .. })
        ));
    }
}
