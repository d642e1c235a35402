use std::path::Path;

use crate::cli::{TargetArg, context, output};
use crate::core::errors::Result;
use crate::core::models::envelope::is_encryption_payload;

/// Execute the `stateseal encrypt` command.
///
/// Encrypts `file` with the method configured for `target` and writes the
/// envelope to `dest`, or to stdout.
pub fn execute(config: &Path, file: &Path, target: &TargetArg, dest: Option<&Path>) -> Result<()> {
    let encryption = context::build_encryption(config)?;
    let data = std::fs::read(file)?;

    let sealed = context::encrypt_for(&encryption, target, &data)?;
    context::write_output(dest, &sealed)?;

    if let Some(dest) = dest {
        if is_encryption_payload(&sealed) {
            output::success(&format!(
                "Encrypted {} for {target} → {}",
                file.display(),
                dest.display()
            ));
        } else {
            output::warning(&format!(
                "No encryption method configured for {target}; {} written unencrypted",
                dest.display()
            ));
        }
    }

    Ok(())
}
