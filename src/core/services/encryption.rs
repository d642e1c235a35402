use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::encryption_config::EncryptionConfig;
use crate::core::errors::Result;
use crate::core::models::diagnostics::Diagnostics;
use crate::core::services::base_encryption::BaseEncryption;
use crate::core::services::payload_validators::{validate_plan, validate_state};
use crate::core::services::registry::Registry;
use crate::core::services::target_resolver::{
    TargetResolver, remote_default_name, remote_target_name,
};

/// Encryption for state snapshots (local state, backend, remote sources).
pub struct StateEncryption {
    base: BaseEncryption,
}

impl StateEncryption {
    /// Pass-through encryption for callers that have none configured.
    pub fn disabled() -> Self {
        Self {
            base: BaseEncryption::disabled("state"),
        }
    }

    pub fn encrypt_state(&self, state: &[u8]) -> Result<Vec<u8>> {
        self.base.encrypt(state)
    }

    pub fn decrypt_state(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.base.decrypt(data, &validate_state)
    }

    pub fn base(&self) -> &BaseEncryption {
        &self.base
    }
}

/// Encryption for plan files.
pub struct PlanEncryption {
    base: BaseEncryption,
}

impl PlanEncryption {
    pub fn disabled() -> Self {
        Self {
            base: BaseEncryption::disabled("plan"),
        }
    }

    pub fn encrypt_plan(&self, plan: &[u8]) -> Result<Vec<u8>> {
        self.base.encrypt(plan)
    }

    pub fn decrypt_plan(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.base.decrypt(data, &validate_plan)
    }

    pub fn base(&self) -> &BaseEncryption {
        &self.base
    }
}

/// Every encryption target of one configuration.
///
/// Construction validates the configuration, then builds each configured
/// target once. Problems across all targets are reported together.
pub struct Encryption {
    state: StateEncryption,
    plan: PlanEncryption,
    backend: StateEncryption,
    remote_default: StateEncryption,
    remote: HashMap<String, StateEncryption>,
}

impl Encryption {
    pub fn new(registry: Arc<Registry>, config: &EncryptionConfig) -> Result<Self> {
        let resolver = Arc::new(TargetResolver::new(registry, config)?);
        let mut diags = Diagnostics::new();

        let mut build = |target: Option<_>, enforced: bool, name: String| {
            match BaseEncryption::new(Arc::clone(&resolver), target, enforced, name.clone()) {
                Ok(base) => base,
                Err(errors) => {
                    diags.extend(errors);
                    BaseEncryption::disabled(name)
                }
            }
        };

        let state = build(
            config.state_file.as_ref().map(|t| t.as_target_config()),
            config.state_file.as_ref().is_some_and(|t| t.enforced),
            "state".into(),
        );
        let plan = build(
            config.plan_file.as_ref().map(|t| t.as_target_config()),
            config.plan_file.as_ref().is_some_and(|t| t.enforced),
            "plan".into(),
        );
        let backend = build(
            config.backend.as_ref().map(|t| t.as_target_config()),
            config.backend.as_ref().is_some_and(|t| t.enforced),
            "backend".into(),
        );

        let remote_config = config.remote.as_ref();
        let remote_default = build(
            remote_config.and_then(|r| r.default.clone()),
            false,
            remote_default_name(),
        );
        let mut remote = HashMap::new();
        for named in remote_config.map(|r| r.targets.as_slice()).unwrap_or_default() {
            let base = build(Some(named.target.clone()), false, remote_target_name(&named.name));
            remote.insert(named.name.clone(), StateEncryption { base });
        }

        if diags.has_errors() {
            return Err(diags.into());
        }
        debug!(remote_targets = remote.len(), "encryption configured");

        Ok(Self {
            state: StateEncryption { base: state },
            plan: PlanEncryption { base: plan },
            backend: StateEncryption { base: backend },
            remote_default: StateEncryption { base: remote_default },
            remote,
        })
    }

    pub fn state_file(&self) -> &StateEncryption {
        &self.state
    }

    pub fn plan_file(&self) -> &PlanEncryption {
        &self.plan
    }

    pub fn backend(&self) -> &StateEncryption {
        &self.backend
    }

    /// Encryption for a named remote state data source, falling back to the
    /// default remote configuration.
    pub fn remote_state(&self, name: &str) -> &StateEncryption {
        self.remote.get(name).unwrap_or(&self.remote_default)
    }

    /// Names of the configured remote targets, sorted.
    pub fn remote_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.remote.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::default_registry;
    use crate::core::errors::EncryptionError;
    use crate::core::models::envelope::is_encryption_payload;

    const CONFIG: &str = r#"
[key_provider.static.main]
key = "000102030405060708090a0b0c0d0e0f000102030405060708090a0b0c0d0e0f"

[key_provider.static.remote]
key = "0f0e0d0c0b0a09080706050403020100"

[method.aes_gcm.main]
keys = "key_provider.static.main"

[method.aes_gcm.remote]
keys = "key_provider.static.remote"

[state]
enforced = true
method = "method.aes_gcm.main"

[plan]
method = "method.aes_gcm.main"

[remote_state_data_sources.default]
method = "method.aes_gcm.main"

[remote_state_data_sources.remote.network]
method = "method.aes_gcm.remote"
"#;

    const STATE: &[u8] = br#"{"version": 4, "serial": 1}"#;
    const PLAN: &[u8] = b"PK\x03\x04plan-body";

    fn encryption(src: &str) -> Result<Encryption> {
        let config = EncryptionConfig::from_toml_str(src, "enc.toml")?;
        Encryption::new(Arc::new(default_registry()?), &config)
    }

    #[test]
    fn state_and_plan_round_trip() {
        let enc = encryption(CONFIG).unwrap();

        let sealed = enc.state_file().encrypt_state(STATE).unwrap();
        assert!(is_encryption_payload(&sealed));
        assert_eq!(enc.state_file().decrypt_state(&sealed).unwrap(), STATE);
        assert!(enc.state_file().base().is_enforced());

        let sealed = enc.plan_file().encrypt_plan(PLAN).unwrap();
        assert_eq!(enc.plan_file().decrypt_plan(&sealed).unwrap(), PLAN);
    }

    #[test]
    fn unconfigured_backend_passes_through() {
        let enc = encryption(CONFIG).unwrap();
        assert!(!enc.backend().base().is_configured());
        assert_eq!(enc.backend().encrypt_state(STATE).unwrap(), STATE);
    }

    #[test]
    fn remote_state_prefers_named_target() {
        let enc = encryption(CONFIG).unwrap();
        assert_eq!(
            enc.remote_state("network").base().name(),
            "remote_state_data_sources.remote.network"
        );
        assert_eq!(
            enc.remote_state("elsewhere").base().name(),
            "remote_state_data_sources.default"
        );
        assert_eq!(enc.remote_names(), vec!["network"]);

        let sealed = enc.remote_state("network").encrypt_state(STATE).unwrap();
        assert!(enc.remote_state("elsewhere").decrypt_state(&sealed).is_err());
        assert_eq!(enc.remote_state("network").decrypt_state(&sealed).unwrap(), STATE);
    }

    #[test]
    fn build_errors_across_targets_are_collected() {
        let src = r#"
[key_provider.static.short]
key = "00ff"

[method.aes_gcm.bad]
keys = "key_provider.static.short"

[state]
method = "method.aes_gcm.bad"

[plan]
method = "method.aes_gcm.bad"
"#;
        let Err(EncryptionError::Diagnostics(diags)) = encryption(src) else {
            panic!("expected diagnostics");
        };
        assert_eq!(diags.len(), 2);
    }

    #[test]
    fn disabled_encryptors_pass_through() {
        assert_eq!(StateEncryption::disabled().encrypt_state(STATE).unwrap(), STATE);
        assert_eq!(PlanEncryption::disabled().decrypt_plan(PLAN).unwrap(), PLAN);
    }
}
