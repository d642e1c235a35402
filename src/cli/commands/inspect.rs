use std::path::Path;

use crate::cli::output;
use crate::core::errors::Result;
use crate::core::models::envelope::{ENCRYPTION_VERSION, Envelope};
use crate::core::services::payload_validators::{validate_plan, validate_state};

/// Execute the `stateseal inspect` command.
///
/// Reports whether a file is an encryption envelope and which key
/// providers recorded metadata in it. Needs no configuration and never
/// decrypts.
pub fn execute(file: &Path) -> Result<()> {
    let data = std::fs::read(file)?;
    output::header(&file.display().to_string());

    let version = match Envelope::probe(&data) {
        Ok(Some(version)) => version,
        _ => {
            output::warning("Not encrypted");
            output::detail("content", plaintext_kind(&data));
            return Ok(());
        }
    };

    output::success("Encrypted envelope");
    output::detail("version", &version);
    if version != ENCRYPTION_VERSION {
        output::warning(&format!(
            "Version '{version}' is not supported by this release (supported: '{ENCRYPTION_VERSION}')"
        ));
        return Ok(());
    }

    let envelope = Envelope::from_slice(&data)?;
    output::detail("payload", &format!("{} bytes", envelope.data.len()));
    if envelope.meta.is_empty() {
        output::detail("key metadata", "none");
    }
    for (addr, meta) in &envelope.meta {
        output::detail(&addr.to_string(), &describe_meta(meta));
    }
    Ok(())
}

fn plaintext_kind(data: &[u8]) -> &'static str {
    if validate_state(data).is_ok() {
        "state document"
    } else if validate_plan(data).is_ok() {
        "plan archive"
    } else {
        "unrecognized data"
    }
}

/// Summarize key provider metadata. JSON objects list their scalar fields;
/// anything else is reported by size.
fn describe_meta(meta: &[u8]) -> String {
    let Ok(fields) = serde_json::from_slice::<serde_json::Map<String, serde_json::Value>>(meta) else {
        return format!("{} bytes", meta.len());
    };
    fields
        .iter()
        .map(|(key, value)| match value {
            serde_json::Value::String(s) if key == "salt" => format!("salt=({} chars)", s.len()),
            serde_json::Value::String(s) => format!("{key}={s}"),
            other => format!("{key}={other}"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_pbkdf2_style_metadata() {
        let meta = br#"{"salt":"AAEC","iterations":600000,"hash_function":"sha512","key_length":32}"#;
        let text = describe_meta(meta);
        assert!(text.contains("iterations=600000"));
        assert!(text.contains("hash_function=sha512"));
        assert!(text.contains("salt=(4 chars)"));
    }

    #[test]
    fn opaque_metadata_is_reported_by_size() {
        assert_eq!(describe_meta(&[0xff, 0x00, 0x01]), "3 bytes");
    }

    #[test]
    fn classifies_plaintext() {
        assert_eq!(plaintext_kind(br#"{"version": 4}"#), "state document");
        assert_eq!(plaintext_kind(b"PK\x03\x04"), "plan archive");
        assert_eq!(plaintext_kind(b"hello"), "unrecognized data");
    }
}
