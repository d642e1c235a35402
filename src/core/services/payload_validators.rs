//! Checks that decide whether bytes are already-decrypted data for a target.

use serde::Deserialize;

use crate::core::errors::{EncryptionError, Result};

/// Signature shared by every plaintext validator.
pub type Validator = dyn Fn(&[u8]) -> Result<()> + Send + Sync;

const ZIP_LOCAL_FILE_HEADER: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_ARCHIVE: &[u8] = b"PK\x05\x06";

#[derive(Deserialize)]
struct StateHeader {
    version: Option<serde_json::Value>,
}

/// A state snapshot is a JSON object carrying a numeric `version`.
pub fn validate_state(data: &[u8]) -> Result<()> {
    let header: StateHeader = serde_json::from_slice(data).map_err(|e| EncryptionError::InvalidPayload {
        detail: format!("not a JSON state document: {e}"),
    })?;
    match header.version {
        Some(serde_json::Value::Number(_)) => Ok(()),
        Some(_) => Err(EncryptionError::InvalidPayload {
            detail: "state 'version' must be a number".into(),
        }),
        None => Err(EncryptionError::InvalidPayload {
            detail: "state document has no 'version' field".into(),
        }),
    }
}

/// A plan file is a zip archive.
pub fn validate_plan(data: &[u8]) -> Result<()> {
    if data.starts_with(ZIP_LOCAL_FILE_HEADER) || data.starts_with(ZIP_EMPTY_ARCHIVE) {
        Ok(())
    } else {
        Err(EncryptionError::InvalidPayload {
            detail: "plan data is not a zip archive".into(),
        })
    }
}
