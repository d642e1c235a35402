pub mod encryption_config;
