pub mod addr;
pub mod chain;
pub mod diagnostics;
pub mod encoding;
pub mod envelope;
pub mod key_output;
