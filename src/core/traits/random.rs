use crate::core::errors::Result;

/// Source of cryptographically secure random bytes.
///
/// Injected into key providers and methods so tests can pin salts and
/// nonces or simulate an exhausted source.
pub trait RandomSource: Send + Sync {
    fn fill(&self, buf: &mut [u8]) -> Result<()>;
}
