use rand::RngCore;
use rand::rngs::OsRng;

use crate::core::errors::{EncryptionError, Result};
use crate::core::traits::random::RandomSource;

/// Random source backed by the operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| EncryptionError::KeyProviderFailure {
                reason: format!("failed to obtain {} bytes of random data: {e}", buf.len()),
            })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_distinct_buffers() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        OsRandom.fill(&mut a).unwrap();
        OsRandom.fill(&mut b).unwrap();
        assert_ne!(a, b);
    }
}
