use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::errors::{EncryptionError, Result};

/// The two kinds of pluggable components a registry catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PluginKind {
    KeyProvider,
    Method,
}

impl PluginKind {
    /// Address prefix for this kind (`key_provider` or `method`).
    pub fn prefix(&self) -> &'static str {
        match self {
            PluginKind::KeyProvider => "key_provider",
            PluginKind::Method => "method",
        }
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

static IDENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_-]*$").expect("identifier pattern is always valid")
});

/// Check that a block type or name is a valid identifier.
pub fn validate_ident(value: &str, what: &str) -> Result<()> {
    if IDENT.is_match(value) {
        Ok(())
    } else {
        Err(EncryptionError::InvalidConfig {
            subject: value.to_string(),
            detail: format!(
                "invalid {what} '{value}': must start with a letter or underscore and \
                 contain only letters, digits, underscores and dashes"
            ),
        })
    }
}

/// Parse `<prefix>.<type>.<name>` into its type and name.
fn parse_addr(raw: &str, kind: PluginKind) -> Result<(String, String)> {
    let invalid = |detail: String| EncryptionError::InvalidConfig {
        subject: raw.to_string(),
        detail,
    };

    let mut parts = raw.split('.');
    let (Some(prefix), Some(type_name), Some(name), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid(format!(
            "expected an address of the form {}.<type>.<name>",
            kind.prefix()
        )));
    };

    if prefix != kind.prefix() {
        return Err(invalid(format!(
            "expected a {} reference, found '{prefix}'",
            kind.prefix()
        )));
    }

    validate_ident(type_name, "type")?;
    validate_ident(name, "name")?;
    Ok((type_name.to_string(), name.to_string()))
}

macro_rules! plugin_addr {
    ($(#[$doc:meta])* $name:ident, $kind:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            type_name: String,
            name: String,
        }

        impl $name {
            /// Build an address from a block type and name, validating both.
            pub fn new(type_name: &str, name: &str) -> Result<Self> {
                validate_ident(type_name, "type")?;
                validate_ident(name, "name")?;
                Ok(Self {
                    type_name: type_name.to_string(),
                    name: name.to_string(),
                })
            }

            pub fn type_name(&self) -> &str {
                &self.type_name
            }

            pub fn name(&self) -> &str {
                &self.name
            }
        }

        impl FromStr for $name {
            type Err = EncryptionError;

            fn from_str(raw: &str) -> Result<Self> {
                let (type_name, name) = parse_addr(raw, $kind)?;
                Ok(Self { type_name, name })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}.{}.{}", $kind.prefix(), self.type_name, self.name)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

plugin_addr!(
    /// Address of a configured key provider: `key_provider.<type>.<name>`.
    ///
    /// Envelope metadata is keyed by this address, so metadata survives the
    /// reordering of key provider blocks in the configuration.
    KeyProviderAddr,
    PluginKind::KeyProvider
);

plugin_addr!(
    /// Address of a configured method: `method.<type>.<name>`.
    MethodAddr,
    PluginKind::Method
);
