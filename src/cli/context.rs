use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tempfile::NamedTempFile;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::adapters::default_registry;
use crate::cli::TargetArg;
use crate::config::encryption_config::EncryptionConfig;
use crate::core::errors::Result;
use crate::core::services::encryption::Encryption;

/// Environment variable holding inline TOML merged over the config file.
pub const ENCRYPTION_ENV: &str = "STATESEAL_ENCRYPTION";

/// Install the stderr log subscriber. `RUST_LOG` wins over the flags.
pub fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Load the configuration file, merged with the `STATESEAL_ENCRYPTION`
/// override. Either source alone is enough.
pub fn load_config(path: &Path) -> Result<EncryptionConfig> {
    let override_config = EncryptionConfig::from_env(ENCRYPTION_ENV)?;
    match override_config {
        Some(over) if path.exists() => {
            debug!(path = %path.display(), "merging {ENCRYPTION_ENV} over configuration file");
            Ok(EncryptionConfig::load(path)?.merge(&over))
        }
        Some(over) => Ok(over),
        None => EncryptionConfig::load(path),
    }
}

/// Load the configuration and build every encryption target.
pub fn build_encryption(path: &Path) -> Result<Encryption> {
    let config = load_config(path)?;
    let registry = Arc::new(default_registry()?);
    Encryption::new(registry, &config)
}

pub fn encrypt_for(encryption: &Encryption, target: &TargetArg, data: &[u8]) -> Result<Vec<u8>> {
    match target {
        TargetArg::State => encryption.state_file().encrypt_state(data),
        TargetArg::Plan => encryption.plan_file().encrypt_plan(data),
        TargetArg::Backend => encryption.backend().encrypt_state(data),
        TargetArg::Remote(name) => encryption.remote_state(name).encrypt_state(data),
    }
}

pub fn decrypt_for(encryption: &Encryption, target: &TargetArg, data: &[u8]) -> Result<Vec<u8>> {
    match target {
        TargetArg::State => encryption.state_file().decrypt_state(data),
        TargetArg::Plan => encryption.plan_file().decrypt_plan(data),
        TargetArg::Backend => encryption.backend().decrypt_state(data),
        TargetArg::Remote(name) => encryption.remote_state(name).decrypt_state(data),
    }
}

/// Write `data` to `path`, or to stdout when no path is given.
///
/// Files are written to a temporary sibling and renamed into place, so an
/// interrupted write leaves the previous content intact.
pub fn write_output(path: Option<&Path>, data: &[u8]) -> Result<()> {
    let Some(path) = path else {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(data)?;
        stdout.flush()?;
        return Ok(());
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
