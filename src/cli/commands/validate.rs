use std::path::Path;

use colored::Colorize;

use crate::cli::{context, output};
use crate::core::errors::Result;
use crate::core::services::base_encryption::BaseEncryption;

/// Execute the `stateseal validate` command.
///
/// Loads the configuration and builds every target, which runs each
/// referenced key provider once. All configuration problems are reported
/// together.
pub fn execute(config: &Path) -> Result<()> {
    let encryption = context::build_encryption(config)?;

    output::header("Encryption targets");
    print_target(encryption.state_file().base());
    print_target(encryption.plan_file().base());
    print_target(encryption.backend().base());
    print_target(encryption.remote_state("").base());
    for name in encryption.remote_names() {
        print_target(encryption.remote_state(name).base());
    }

    output::success("Configuration is valid");
    Ok(())
}

fn print_target(base: &BaseEncryption) {
    if !base.is_configured() {
        output::detail(base.name(), &"not configured".dimmed().to_string());
        return;
    }
    let chain = base
        .chain()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" → ");
    let enforced = if base.is_enforced() { " (enforced)" } else { "" };
    output::detail(base.name(), &format!("{chain}{enforced}"));
}
