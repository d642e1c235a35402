use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::config::encryption_config::{
    EncryptionConfig, KeyProviderConfig, MethodConfig, TargetConfig,
};
use crate::core::errors::{EncryptionError, Result};
use crate::core::models::addr::{KeyProviderAddr, MethodAddr, validate_ident};
use crate::core::models::chain::ChainEntry;
use crate::core::models::diagnostics::{Diagnostic, Diagnostics};
use crate::core::models::key_output::{KeyOutput, MetaMap};
use crate::core::services::registry::Registry;
use crate::core::traits::method::MethodInstance;

/// Turns target blocks into live method chains.
///
/// Construction validates the whole configuration statically (addresses,
/// types, references) without touching any key material. [`resolve`]
/// then builds the key providers and methods one target needs.
///
/// [`resolve`]: TargetResolver::resolve
pub struct TargetResolver {
    registry: Arc<Registry>,
    key_providers: HashMap<KeyProviderAddr, KeyProviderConfig>,
    methods: HashMap<MethodAddr, MethodConfig>,
    source: Option<String>,
}

impl TargetResolver {
    /// Index and validate `config`. Every problem found is reported.
    pub fn new(
        registry: Arc<Registry>,
        config: &EncryptionConfig,
    ) -> std::result::Result<Self, Diagnostics> {
        let mut diags = Diagnostics::new();
        let mut key_providers = HashMap::new();
        let mut methods = HashMap::new();

        for kp in &config.key_providers {
            let block = format!("key_provider.{}.{}", kp.type_name, kp.name);
            let addr = match kp.addr() {
                Ok(addr) => addr,
                Err(e) => {
                    diags.push(Diagnostic::from_error("Invalid key provider block", config.subject(&block), &e));
                    continue;
                }
            };
            if let Err(e) = registry.key_provider_by_name(&kp.type_name) {
                diags.push(Diagnostic::from_error("Unknown key provider type", config.subject(&block), &e));
            }
            if key_providers.insert(addr, kp.clone()).is_some() {
                diags.push(
                    Diagnostic::new("Duplicate key provider", format!("{block} is defined more than once"))
                        .with_subject(config.subject(&block)),
                );
            }
        }

        for m in &config.methods {
            let block = format!("method.{}.{}", m.type_name, m.name);
            let addr = match m.addr() {
                Ok(addr) => addr,
                Err(e) => {
                    diags.push(Diagnostic::from_error("Invalid method block", config.subject(&block), &e));
                    continue;
                }
            };
            if let Err(e) = registry.method_by_name(&m.type_name) {
                diags.push(Diagnostic::from_error("Unknown method type", config.subject(&block), &e));
            }
            for key in &m.keys {
                if !key_providers.contains_key(key) {
                    diags.push(
                        Diagnostic::new(
                            "Undefined key provider",
                            format!("{key} is referenced in keys but not defined"),
                        )
                        .with_subject(config.subject(&block)),
                    );
                }
            }
            if methods.insert(addr, m.clone()).is_some() {
                diags.push(
                    Diagnostic::new("Duplicate method", format!("{block} is defined more than once"))
                        .with_subject(config.subject(&block)),
                );
            }
        }

        let mut targets: Vec<(String, TargetConfig)> = Vec::new();
        if let Some(state) = &config.state_file {
            targets.push(("state".into(), state.as_target_config()));
        }
        if let Some(plan) = &config.plan_file {
            targets.push(("plan".into(), plan.as_target_config()));
        }
        if let Some(backend) = &config.backend {
            targets.push(("backend".into(), backend.as_target_config()));
        }
        if let Some(remote) = &config.remote {
            if let Some(default) = &remote.default {
                targets.push((remote_default_name(), default.clone()));
            }
            let mut seen = BTreeSet::new();
            for named in &remote.targets {
                let name = remote_target_name(&named.name);
                if let Err(e) = validate_ident(&named.name, "remote target name") {
                    diags.push(Diagnostic::from_error("Invalid remote target", config.subject(&name), &e));
                }
                if !seen.insert(named.name.as_str()) {
                    diags.push(
                        Diagnostic::new(
                            "Duplicate remote target",
                            format!("remote target '{}' is defined more than once", named.name),
                        )
                        .with_subject(config.subject(&name)),
                    );
                }
                targets.push((name, named.target.clone()));
            }
        }

        for (name, target) in &targets {
            for (block, method) in chain_steps(target, name) {
                if let Some(addr) = method {
                    if !methods.contains_key(addr) {
                        diags.push(
                            Diagnostic::new(
                                "Undefined encryption method",
                                format!("{addr} is referenced but not defined"),
                            )
                            .with_subject(config.subject(&block)),
                        );
                    }
                }
            }
        }

        let resolver = Self {
            registry,
            key_providers,
            methods,
            source: config.source.clone(),
        };
        diags.into_result(resolver)
    }

    /// Build the method chain for `target`.
    ///
    /// `input_meta` is the key provider metadata stored with previously
    /// encrypted data (empty when encrypting). Each key provider runs at
    /// most once; the metadata it produces is returned for the next write.
    pub fn resolve(
        &self,
        target: &TargetConfig,
        target_name: &str,
        input_meta: &MetaMap,
    ) -> std::result::Result<(Vec<ChainEntry>, MetaMap), Diagnostics> {
        let mut diags = Diagnostics::new();
        let mut chain = Vec::new();
        let mut output_meta = MetaMap::new();
        let mut keys: HashMap<KeyProviderAddr, KeyOutput> = HashMap::new();

        for (block, method) in chain_steps(target, target_name) {
            let Some(addr) = method else {
                chain.push(ChainEntry::Plaintext { addr: None });
                continue;
            };
            match self.build_method(addr, input_meta, &mut keys, &mut output_meta) {
                Ok(entry) => chain.push(entry),
                Err(e) => diags.push(Diagnostic::from_error(
                    "Unable to build encryption method",
                    self.subject(&block),
                    &e,
                )),
            }
        }

        debug!(
            target_name,
            chain = %chain.iter().map(ToString::to_string).collect::<Vec<_>>().join(" -> "),
            "resolved method chain"
        );
        diags.into_result((chain, output_meta))
    }

    fn build_method(
        &self,
        addr: &MethodAddr,
        input_meta: &MetaMap,
        keys: &mut HashMap<KeyProviderAddr, KeyOutput>,
        output_meta: &mut MetaMap,
    ) -> Result<ChainEntry> {
        let config = self.methods.get(addr).ok_or_else(|| EncryptionError::InvalidConfig {
            subject: addr.to_string(),
            detail: "method is not defined".into(),
        })?;

        let mut material = Vec::with_capacity(config.keys.len());
        for key_addr in &config.keys {
            if !keys.contains_key(key_addr) {
                let (output, meta) = self.provide_key(key_addr, input_meta)?;
                if let Some(meta) = meta {
                    output_meta.insert(key_addr.clone(), meta);
                }
                keys.insert(key_addr.clone(), output);
            }
            if let Some(output) = keys.get(key_addr) {
                material.push(output.clone());
            }
        }

        let descriptor = self.registry.method_by_name(&config.type_name)?;
        match descriptor.build(&config.body, material)? {
            MethodInstance::Cipher(method) => Ok(ChainEntry::Method {
                addr: addr.clone(),
                method: Arc::from(method),
            }),
            MethodInstance::Unencrypted => Ok(ChainEntry::Plaintext {
                addr: Some(addr.clone()),
            }),
        }
    }

    fn provide_key(
        &self,
        addr: &KeyProviderAddr,
        input_meta: &MetaMap,
    ) -> Result<(KeyOutput, Option<Vec<u8>>)> {
        let config = self.key_providers.get(addr).ok_or_else(|| EncryptionError::InvalidConfig {
            subject: addr.to_string(),
            detail: "key provider is not defined".into(),
        })?;
        let provider = self
            .registry
            .key_provider_by_name(&config.type_name)?
            .build(&config.body)?;
        debug!(key_provider = %addr, has_meta = input_meta.contains_key(addr), "providing key");
        provider.provide(input_meta.get(addr).map(Vec::as_slice))
    }

    fn subject(&self, block: &str) -> String {
        match &self.source {
            Some(source) => format!("{source}: {block}"),
            None => block.to_string(),
        }
    }
}

/// Walk a target and its fallbacks, yielding each step's block path.
fn chain_steps<'a>(target: &'a TargetConfig, name: &str) -> Vec<(String, Option<&'a MethodAddr>)> {
    let mut steps = Vec::new();
    let mut block = name.to_string();
    let mut current = Some(target);
    while let Some(step) = current {
        steps.push((block.clone(), step.method.as_ref()));
        block.push_str(".fallback");
        current = step.fallback.as_deref();
    }
    steps
}

pub fn remote_default_name() -> String {
    "remote_state_data_sources.default".to_string()
}

pub fn remote_target_name(name: &str) -> String {
    format!("remote_state_data_sources.remote.{name}")
}
