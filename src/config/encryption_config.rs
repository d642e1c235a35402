use std::collections::BTreeMap;
use std::env::VarError;
use std::path::Path;

use serde::Deserialize;

use crate::core::errors::{EncryptionError, Result};
use crate::core::models::addr::{KeyProviderAddr, MethodAddr, validate_ident};
use crate::core::models::diagnostics::{Diagnostic, Diagnostics};

/// Decoded encryption configuration.
///
/// Built from TOML by [`EncryptionConfig::from_toml_str`] or assembled
/// directly in code. Block bodies stay opaque: each descriptor decodes its
/// own body when the block is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncryptionConfig {
    pub key_providers: Vec<KeyProviderConfig>,
    pub methods: Vec<MethodConfig>,
    pub state_file: Option<EnforcableTargetConfig>,
    pub plan_file: Option<EnforcableTargetConfig>,
    pub backend: Option<EnforcableTargetConfig>,
    pub remote: Option<RemoteConfig>,
    /// Where this configuration came from, used in diagnostics.
    pub source: Option<String>,
}

/// A `[key_provider.<type>.<name>]` block.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyProviderConfig {
    pub type_name: String,
    pub name: String,
    pub body: toml::Table,
}

impl KeyProviderConfig {
    pub fn addr(&self) -> Result<KeyProviderAddr> {
        KeyProviderAddr::new(&self.type_name, &self.name)
    }
}

/// A `[method.<type>.<name>]` block. `keys` is split out of the body so the
/// key material can be resolved before the method is built.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodConfig {
    pub type_name: String,
    pub name: String,
    pub keys: Vec<KeyProviderAddr>,
    pub body: toml::Table,
}

impl MethodConfig {
    pub fn addr(&self) -> Result<MethodAddr> {
        MethodAddr::new(&self.type_name, &self.name)
    }
}

/// Method selection for one target plus an optional fallback chain.
///
/// `method == None` means the step expects unencrypted data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    #[serde(default)]
    pub method: Option<MethodAddr>,
    #[serde(default)]
    pub fallback: Option<Box<TargetConfig>>,
}

/// A target that can require encryption.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnforcableTargetConfig {
    #[serde(default)]
    pub enforced: bool,
    #[serde(default)]
    pub method: Option<MethodAddr>,
    #[serde(default)]
    pub fallback: Option<Box<TargetConfig>>,
}

impl EnforcableTargetConfig {
    pub fn as_target_config(&self) -> TargetConfig {
        TargetConfig {
            method: self.method.clone(),
            fallback: self.fallback.clone(),
        }
    }
}

/// A named remote state data source target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedTargetConfig {
    pub name: String,
    pub target: TargetConfig,
}

/// The `[remote_state_data_sources]` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteConfig {
    pub default: Option<TargetConfig>,
    pub targets: Vec<NamedTargetConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    key_provider: BTreeMap<String, BTreeMap<String, toml::Table>>,
    #[serde(default)]
    method: BTreeMap<String, BTreeMap<String, toml::Table>>,
    state: Option<EnforcableTargetConfig>,
    plan: Option<EnforcableTargetConfig>,
    backend: Option<EnforcableTargetConfig>,
    remote_state_data_sources: Option<RawRemote>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRemote {
    default: Option<TargetConfig>,
    #[serde(default)]
    remote: BTreeMap<String, TargetConfig>,
}

impl EncryptionConfig {
    /// Load the configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EncryptionError::InvalidConfig {
                subject: path.display().to_string(),
                detail: "configuration file not found".into(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    /// Load an override configuration from an environment variable holding
    /// TOML. Returns `None` when the variable is unset or blank.
    pub fn from_env(var: &str) -> Result<Option<Self>> {
        match std::env::var(var) {
            Ok(content) if !content.trim().is_empty() => Self::from_toml_str(&content, var).map(Some),
            Ok(_) | Err(VarError::NotPresent) => Ok(None),
            Err(VarError::NotUnicode(_)) => Err(EncryptionError::InvalidConfig {
                subject: var.to_string(),
                detail: "value is not valid UTF-8".into(),
            }),
        }
    }

    /// Decode TOML source. `source_name` prefixes every diagnostic subject.
    pub fn from_toml_str(content: &str, source_name: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content).map_err(|e| {
            EncryptionError::Diagnostics(
                Diagnostic::new("Failed to parse encryption configuration", e.to_string())
                    .with_subject(source_name)
                    .into(),
            )
        })?;

        let mut diags = Diagnostics::new();
        let subject = |block: &str| format!("{source_name}: {block}");

        let mut key_providers = Vec::new();
        for (type_name, blocks) in raw.key_provider {
            for (name, body) in blocks {
                let config = KeyProviderConfig {
                    type_name: type_name.clone(),
                    name,
                    body,
                };
                if let Err(e) = config.addr() {
                    let block = format!("key_provider.{}.{}", config.type_name, config.name);
                    diags.push(Diagnostic::from_error("Invalid key provider block", subject(&block), &e));
                }
                key_providers.push(config);
            }
        }

        let mut methods = Vec::new();
        for (type_name, blocks) in raw.method {
            for (name, mut body) in blocks {
                let block = format!("method.{type_name}.{name}");
                if let Err(e) = validate_ident(&type_name, "type").and_then(|_| validate_ident(&name, "name")) {
                    diags.push(Diagnostic::from_error("Invalid method block", subject(&block), &e));
                }
                let keys = match parse_key_refs(body.remove("keys")) {
                    Ok(keys) => keys,
                    Err(e) => {
                        diags.push(Diagnostic::from_error("Invalid key provider reference", subject(&block), &e));
                        Vec::new()
                    }
                };
                methods.push(MethodConfig {
                    type_name: type_name.clone(),
                    name,
                    keys,
                    body,
                });
            }
        }

        let remote = raw.remote_state_data_sources.map(|r| RemoteConfig {
            default: r.default,
            targets: r
                .remote
                .into_iter()
                .map(|(name, target)| NamedTargetConfig { name, target })
                .collect(),
        });

        let config = Self {
            key_providers,
            methods,
            state_file: raw.state,
            plan_file: raw.plan,
            backend: raw.backend,
            remote,
            source: Some(source_name.to_string()),
        };
        diags.into_result(config).map_err(EncryptionError::Diagnostics)
    }

    /// Merge `override_config` on top of this configuration.
    ///
    /// Blocks with the same type and name are replaced, new blocks are
    /// appended. Targets set in the override replace the base target;
    /// named remote targets are merged by name.
    pub fn merge(&self, override_config: &EncryptionConfig) -> EncryptionConfig {
        let mut key_providers = self.key_providers.clone();
        for kp in &override_config.key_providers {
            match key_providers
                .iter_mut()
                .find(|existing| existing.type_name == kp.type_name && existing.name == kp.name)
            {
                Some(existing) => *existing = kp.clone(),
                None => key_providers.push(kp.clone()),
            }
        }

        let mut methods = self.methods.clone();
        for m in &override_config.methods {
            match methods
                .iter_mut()
                .find(|existing| existing.type_name == m.type_name && existing.name == m.name)
            {
                Some(existing) => *existing = m.clone(),
                None => methods.push(m.clone()),
            }
        }

        let remote = match (&self.remote, &override_config.remote) {
            (None, None) => None,
            (Some(base), None) => Some(base.clone()),
            (None, Some(over)) => Some(over.clone()),
            (Some(base), Some(over)) => {
                let mut targets = base.targets.clone();
                for named in &over.targets {
                    match targets.iter_mut().find(|t| t.name == named.name) {
                        Some(existing) => *existing = named.clone(),
                        None => targets.push(named.clone()),
                    }
                }
                Some(RemoteConfig {
                    default: over.default.clone().or_else(|| base.default.clone()),
                    targets,
                })
            }
        };

        let source = match (&self.source, &override_config.source) {
            (Some(base), Some(over)) => Some(format!("{base} + {over}")),
            (base, over) => over.clone().or_else(|| base.clone()),
        };

        EncryptionConfig {
            key_providers,
            methods,
            state_file: override_config.state_file.clone().or_else(|| self.state_file.clone()),
            plan_file: override_config.plan_file.clone().or_else(|| self.plan_file.clone()),
            backend: override_config.backend.clone().or_else(|| self.backend.clone()),
            remote,
            source,
        }
    }

    /// Prefix a block address with the configuration source.
    pub fn subject(&self, block: &str) -> String {
        match &self.source {
            Some(source) => format!("{source}: {block}"),
            None => block.to_string(),
        }
    }
}

/// `keys` accepts a single address or a list of addresses.
fn parse_key_refs(value: Option<toml::Value>) -> Result<Vec<KeyProviderAddr>> {
    let invalid = |detail: &str| EncryptionError::InvalidConfig {
        subject: "keys".into(),
        detail: detail.to_string(),
    };

    match value {
        None => Ok(Vec::new()),
        Some(toml::Value::String(s)) => Ok(vec![s.parse()?]),
        Some(toml::Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                toml::Value::String(s) => s.parse(),
                _ => Err(invalid("every entry must be a key provider address string")),
            })
            .collect(),
        Some(_) => Err(invalid("expected a key provider address or a list of addresses")),
    }
}
