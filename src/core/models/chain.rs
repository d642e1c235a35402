use std::fmt;
use std::sync::Arc;

use crate::core::models::addr::MethodAddr;
use crate::core::traits::method::Method;

/// One step of a target's method chain.
///
/// The first entry encrypts; during decryption every entry is tried in
/// order. `Plaintext` is the explicit "no method" step: it accepts input
/// that already validates as unencrypted data.
#[derive(Clone)]
pub enum ChainEntry {
    Method {
        addr: MethodAddr,
        method: Arc<dyn Method>,
    },
    /// `addr` is `None` when the target block sets no method at all.
    Plaintext { addr: Option<MethodAddr> },
}

impl ChainEntry {
    pub fn is_plaintext(&self) -> bool {
        matches!(self, ChainEntry::Plaintext { .. })
    }
}

impl fmt::Display for ChainEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainEntry::Method { addr, .. } => write!(f, "{addr}"),
            ChainEntry::Plaintext { addr: Some(addr) } => write!(f, "{addr} (unencrypted)"),
            ChainEntry::Plaintext { addr: None } => f.write_str("(unencrypted)"),
        }
    }
}

impl fmt::Debug for ChainEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainEntry({self})")
    }
}
