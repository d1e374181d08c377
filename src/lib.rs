pub mod codecs;
pub mod fixtures;
pub mod id3;
pub mod strip;
pub mod tone;

mod prelude;

use std::path::{Path, PathBuf};

use crate::prelude::*;

/// Generate the full fixture set into `dir` with the default tone settings.
pub fn generate_fixtures(dir: &Path, force: bool) -> R<fixtures::FixtureSet> {
    fixtures::generate(dir, &fixtures::FixtureSpec::default(), force)
}

/// Check a previously generated fixture set against the default settings.
pub fn verify_fixtures(dir: &Path) -> R<()> {
    fixtures::verify(dir, &fixtures::FixtureSpec::default())
}

/// Write `data` to `path` through a uniquely named sibling temp file so a
/// failure mid-write never leaves a truncated target behind.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> R<()> {
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(format!(".tmp{:08x}", rand::random::<u32>()));
    let temp_file = PathBuf::from(temp_name);

    std::fs::write(&temp_file, data)?;
    match std::fs::rename(&temp_file, path) {
        Ok(_) => Ok(()),
        Err(e) => {
            // As a fallback, try to copy then delete
            if let Err(_copy_err) = std::fs::copy(&temp_file, path) {
                Err(e.into()) // Return the original error
            } else {
                let _ = std::fs::remove_file(&temp_file); // Try to cleanup
                Ok(())
            }
        }
    }
}
