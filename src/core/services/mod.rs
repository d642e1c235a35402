pub mod base_encryption;
pub mod encryption;
pub mod payload_validators;
pub mod registry;
pub mod target_resolver;
