//! Encryption at rest for infrastructure state and plan files.
//!
//! Payloads are sealed with pluggable methods whose keys come from
//! pluggable key providers. Both kinds are looked up by type name in a
//! [`Registry`](crate::core::services::registry::Registry); see
//! [`adapters::default_registry`](crate::adapters::default_registry) for the built-in set.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
