use std::sync::Arc;
use std::thread;

use proptest::prelude::*;

use stateseal::adapters::default_registry;
use stateseal::config::encryption_config::EncryptionConfig;
use stateseal::core::errors::EncryptionError;
use stateseal::core::models::envelope::{Envelope, is_encryption_payload};
use stateseal::core::services::encryption::Encryption;

const STATE: &[u8] = br#"{"version": 4, "terraform_version": "1.7.0", "serial": 12, "resources": []}"#;
const PLAN: &[u8] = b"PK\x03\x04\x14\x00\x00\x00tfplan";

const PASSPHRASE_CONFIG: &str = r#"
[key_provider.pbkdf2.main]
passphrase = "correct horse battery staple"
iterations = 1000

[method.aes_gcm.secure]
keys = "key_provider.pbkdf2.main"

[state]
method = "method.aes_gcm.secure"

[plan]
method = "method.aes_gcm.secure"
"#;

/// Build every target of a TOML configuration with the built-in registry.
fn encryption(src: &str) -> Encryption {
    let config = EncryptionConfig::from_toml_str(src, "encryption.toml").unwrap();
    Encryption::new(Arc::new(default_registry().unwrap()), &config).unwrap()
}

fn try_encryption(src: &str) -> Result<Encryption, EncryptionError> {
    let config = EncryptionConfig::from_toml_str(src, "encryption.toml")?;
    Encryption::new(Arc::new(default_registry()?), &config)
}

#[test]
fn passphrase_round_trip_for_state_and_plan() {
    let enc = encryption(PASSPHRASE_CONFIG);

    let sealed_state = enc.state_file().encrypt_state(STATE).unwrap();
    let sealed_plan = enc.plan_file().encrypt_plan(PLAN).unwrap();
    assert!(is_encryption_payload(&sealed_state));
    assert!(is_encryption_payload(&sealed_plan));

    // A fresh process derives the key again from the stored metadata.
    let reopened = encryption(PASSPHRASE_CONFIG);
    assert_eq!(reopened.state_file().decrypt_state(&sealed_state).unwrap(), STATE);
    assert_eq!(reopened.plan_file().decrypt_plan(&sealed_plan).unwrap(), PLAN);
}

#[test]
fn envelope_wire_format() {
    let enc = encryption(PASSPHRASE_CONFIG);
    let sealed = enc.state_file().encrypt_state(STATE).unwrap();

    let json: serde_json::Value = serde_json::from_slice(&sealed).unwrap();
    let object = json.as_object().unwrap();
    let mut fields: Vec<&str> = object.keys().map(String::as_str).collect();
    fields.sort_unstable();
    assert_eq!(fields, vec!["encrypted_data", "encryption_version", "meta"]);
    assert_eq!(object["encryption_version"], "v0");
    assert!(object["meta"].get("key_provider.pbkdf2.main").is_some());
}

#[test]
fn plaintext_json_is_not_an_envelope() {
    assert!(!is_encryption_payload(STATE));
    assert!(!is_encryption_payload(b"not even json"));
    assert!(!is_encryption_payload(br#"{"encryption_version": ""}"#));
}

#[test]
fn migrating_into_encryption() {
    let enc = encryption(
        r#"
[key_provider.pbkdf2.main]
passphrase = "correct horse battery staple"
iterations = 1000

[method.aes_gcm.secure]
keys = "key_provider.pbkdf2.main"

[method.unencrypted.migrate]

[state]
method = "method.aes_gcm.secure"

[state.fallback]
method = "method.unencrypted.migrate"
"#,
    );

    // Existing unencrypted state is still readable...
    assert_eq!(enc.state_file().decrypt_state(STATE).unwrap(), STATE);
    // ...but every write is encrypted.
    let sealed = enc.state_file().encrypt_state(STATE).unwrap();
    assert!(is_encryption_payload(&sealed));
    assert_eq!(enc.state_file().decrypt_state(&sealed).unwrap(), STATE);
}

#[test]
fn migrating_between_key_providers() {
    let old = encryption(
        r#"
[key_provider.static.old]
key = "6f6c642d6b65792d6f6c642d6b65792d6f6c642d6b65792d6f6c642d6b657921"

[method.aes_gcm.old]
keys = "key_provider.static.old"

[state]
method = "method.aes_gcm.old"
"#,
    );
    let written_by_old = old.state_file().encrypt_state(STATE).unwrap();

    let rotated = encryption(
        r#"
[key_provider.static.old]
key = "6f6c642d6b65792d6f6c642d6b65792d6f6c642d6b65792d6f6c642d6b657921"

[key_provider.pbkdf2.new]
passphrase = "correct horse battery staple"
iterations = 1000

[method.aes_gcm.old]
keys = "key_provider.static.old"

[method.aes_gcm.new]
keys = "key_provider.pbkdf2.new"

[state]
enforced = true
method = "method.aes_gcm.new"

[state.fallback]
method = "method.aes_gcm.old"
"#,
    );

    assert_eq!(rotated.state_file().decrypt_state(&written_by_old).unwrap(), STATE);
    let rewritten = rotated.state_file().encrypt_state(STATE).unwrap();
    let envelope = Envelope::from_slice(&rewritten).unwrap();
    assert_eq!(envelope.meta.len(), 1, "only the pbkdf2 provider records metadata");
    assert!(old.state_file().decrypt_state(&rewritten).is_err());
}

#[test]
fn migrating_out_of_encryption() {
    let sealed = encryption(PASSPHRASE_CONFIG)
        .state_file()
        .encrypt_state(STATE)
        .unwrap();

    let leaving = encryption(
        r#"
[key_provider.pbkdf2.main]
passphrase = "correct horse battery staple"
iterations = 1000

[method.aes_gcm.secure]
keys = "key_provider.pbkdf2.main"

[method.unencrypted.migrate]

[state]
method = "method.unencrypted.migrate"

[state.fallback]
method = "method.aes_gcm.secure"
"#,
    );

    assert_eq!(leaving.state_file().decrypt_state(&sealed).unwrap(), STATE);
    assert_eq!(leaving.state_file().encrypt_state(STATE).unwrap(), STATE);
}

#[test]
fn enforced_target_rejects_unencrypted_writes() {
    let enc = encryption(
        r#"
[method.unencrypted.migrate]

[state]
enforced = true
method = "method.unencrypted.migrate"
"#,
    );
    let err = enc.state_file().encrypt_state(STATE).unwrap_err();
    assert!(matches!(err, EncryptionError::EncryptionRequired { .. }));
    assert!(err.to_string().contains("enforced"));
}

#[test]
fn wrong_passphrase_fails_without_plaintext_fallback() {
    let sealed = encryption(PASSPHRASE_CONFIG)
        .state_file()
        .encrypt_state(STATE)
        .unwrap();

    let other = encryption(&PASSPHRASE_CONFIG.replace("correct horse", "incorrect horse"));
    let err = other.state_file().decrypt_state(&sealed).unwrap_err();
    assert!(matches!(err, EncryptionError::AllDecryptionAttemptsFailed { .. }));
}

#[test]
fn corrupted_metadata_is_reported() {
    let enc = encryption(PASSPHRASE_CONFIG);
    let sealed = enc.state_file().encrypt_state(STATE).unwrap();

    let mut envelope = Envelope::from_slice(&sealed).unwrap();
    for meta in envelope.meta.values_mut() {
        *meta = br#"{"salt":"","iterations":0,"hash_function":"sha512","key_length":32}"#.to_vec();
    }
    let err = enc
        .state_file()
        .decrypt_state(&envelope.to_vec().unwrap())
        .unwrap_err();
    assert!(err.to_string().contains("Invalid key provider metadata"), "{err}");
}

#[test]
fn oversized_metadata_fails_closed() {
    let enc = encryption(PASSPHRASE_CONFIG);
    let sealed = enc.state_file().encrypt_state(STATE).unwrap();

    let hostile: [&[u8]; 2] = [
        br#"{"salt":"AQID","iterations":1,"hash_function":"sha512","key_length":18446744073709551615}"#,
        br#"{"salt":"AQID","iterations":4294967295,"hash_function":"sha512","key_length":32}"#,
    ];
    for raw in hostile {
        let mut envelope = Envelope::from_slice(&sealed).unwrap();
        for meta in envelope.meta.values_mut() {
            *meta = raw.to_vec();
        }
        let err = enc
            .state_file()
            .decrypt_state(&envelope.to_vec().unwrap())
            .unwrap_err();
        assert!(err.to_string().contains("Invalid key provider metadata"), "{err}");
    }
}

#[test]
fn json_arrays_are_treated_as_plaintext() {
    assert!(!is_encryption_payload(br#"["v0"]"#));

    let err = encryption(PASSPHRASE_CONFIG)
        .state_file()
        .decrypt_state(br#"["v0"]"#)
        .unwrap_err();
    assert!(!matches!(err, EncryptionError::MalformedEnvelope { .. }), "{err}");
}

#[test]
fn configuration_errors_are_reported_together() {
    let err = try_encryption(
        r#"
[key_provider.vault.main]

[method.aes_gcm.secure]
keys = "key_provider.pbkdf2.missing"

[state]
method = "method.aes_gcm.nowhere"
"#,
    )
    .err()
    .unwrap();

    let EncryptionError::Diagnostics(diags) = err else {
        panic!("expected diagnostics");
    };
    assert_eq!(diags.len(), 3);
    assert!(diags.iter().all(|d| d.subject.as_deref().unwrap().starts_with("encryption.toml: ")));
}

#[test]
fn remote_data_sources_use_named_then_default_configuration() {
    let enc = encryption(
        r#"
[key_provider.static.shared]
key = "000102030405060708090a0b0c0d0e0f"

[key_provider.static.network]
key = "0f0e0d0c0b0a09080706050403020100"

[method.aes_gcm.shared]
keys = "key_provider.static.shared"

[method.aes_gcm.network]
keys = "key_provider.static.network"

[remote_state_data_sources.default]
method = "method.aes_gcm.shared"

[remote_state_data_sources.remote.network]
method = "method.aes_gcm.network"
"#,
    );

    let from_network = enc.remote_state("network").encrypt_state(STATE).unwrap();
    let from_other = enc.remote_state("storage").encrypt_state(STATE).unwrap();

    assert_eq!(enc.remote_state("network").decrypt_state(&from_network).unwrap(), STATE);
    assert_eq!(enc.remote_state("storage").decrypt_state(&from_other).unwrap(), STATE);
    assert!(enc.remote_state("storage").decrypt_state(&from_network).is_err());
}

#[test]
fn one_instance_serves_concurrent_callers() {
    let enc = Arc::new(encryption(PASSPHRASE_CONFIG));

    let handles: Vec<_> = (0..8u8)
        .map(|i| {
            let enc = Arc::clone(&enc);
            thread::spawn(move || {
                let state = format!(r#"{{"version": 4, "serial": {i}}}"#).into_bytes();
                let sealed = enc.state_file().encrypt_state(&state).unwrap();
                let opened = enc.state_file().decrypt_state(&sealed).unwrap();
                assert_eq!(opened, state);
                Envelope::from_slice(&sealed).unwrap().meta
            })
        })
        .collect();

    let metas: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(metas.windows(2).all(|w| w[0] == w[1]));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn static_key_round_trips_any_plan(body in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let enc = encryption(
            r#"
[key_provider.static.k]
key = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f"

[method.aes_gcm.m]
keys = "key_provider.static.k"

[plan]
method = "method.aes_gcm.m"
"#,
        );
        let mut plan = b"PK\x03\x04".to_vec();
        plan.extend_from_slice(&body);

        let sealed = enc.plan_file().encrypt_plan(&plan).unwrap();
        prop_assert!(is_encryption_payload(&sealed));
        prop_assert_eq!(enc.plan_file().decrypt_plan(&sealed).unwrap(), plan);
    }
}
