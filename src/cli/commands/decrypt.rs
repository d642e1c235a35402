use std::path::Path;

use crate::cli::{TargetArg, context, output};
use crate::core::errors::Result;
use crate::core::models::envelope::is_encryption_payload;

/// Execute the `stateseal decrypt` command.
///
/// Unwraps an envelope produced by `encrypt`. Unencrypted input is
/// accepted only when the target's chain allows it.
pub fn execute(config: &Path, file: &Path, target: &TargetArg, dest: Option<&Path>) -> Result<()> {
    let encryption = context::build_encryption(config)?;
    let data = std::fs::read(file)?;
    let was_encrypted = is_encryption_payload(&data);

    let plaintext = context::decrypt_for(&encryption, target, &data)?;
    context::write_output(dest, &plaintext)?;

    if let Some(dest) = dest {
        if was_encrypted {
            output::success(&format!(
                "Decrypted {} for {target} → {}",
                file.display(),
                dest.display()
            ));
        } else {
            output::warning(&format!(
                "{} was not encrypted; copied to {}",
                file.display(),
                dest.display()
            ));
        }
    }

    Ok(())
}
