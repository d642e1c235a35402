pub mod key_provider;
pub mod method;
pub mod random;
