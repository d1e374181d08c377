//! File-level tag stripping: read a tagged file, drop any ID3v1/ID3v2
//! blocks, and write the remaining bytes to a new file.

use crate::id3;
use crate::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const STRIPPED_PREFIX: &str = "[STRIPPED] ";

/// Default output path when none is given: the input file name with a
/// marker prefix, in the same directory.
pub fn stripped_output_path(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match input.parent() {
        Some(parent) => parent.join(format!("{}{}", STRIPPED_PREFIX, name)),
        None => PathBuf::from(format!("{}{}", STRIPPED_PREFIX, name)),
    }
}

/// Strip ID3 tags from `input` into `output`, returning the output path and
/// the number of bytes written. Refuses to clobber an existing output file
/// unless `overwrite` is set.
pub fn strip_file(input: &Path, output: Option<&Path>, overwrite: bool) -> R<(PathBuf, u64)> {
    let output_path = match output {
        Some(path) => path.to_path_buf(),
        None => {
            warn!(
                "No output file was specified. Falling back to adding a \
                 prefix to the input file."
            );
            stripped_output_path(input)
        }
    };
    info!("Input file: {}", input.display());
    info!("Output file: {}", output_path.display());

    if output_path.exists() && !overwrite {
        return Err(anyhow!(
            "Output file already exists: {} (use --overwrite to replace it)",
            output_path.display()
        ));
    }

    let file = std::fs::File::open(input)?;
    let mapped_file = unsafe { MmapOptions::new().map(&file)? };

    if id3::has_id3v2(&mapped_file) {
        let header = id3::Id3v2Header::parse(&mapped_file)?;
        info!(
            "Found an ID3v2 header (version 2.{}.{}).",
            header.major_version, header.revision
        );
        debug!(
            "Reading the file starting at offset {} bytes.",
            header.total_len()
        );
    }
    if id3::find_id3v1(&mapped_file).is_some() {
        info!("Found an ID3v1 trailer.");
    }

    let body = id3::strip_tags(&mapped_file)?;
    let bytes_written = body.len() as u64;
    std::fs::write(&output_path, body)?;

    info!("Successfully wrote {} bytes to output.", bytes_written);
    Ok((output_path, bytes_written))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id3::{Id3v1Tag, Id3v2Tag, write_id3v1, write_id3v2};

    fn scratch_file(name: &str, contents: &[u8]) -> PathBuf {
        let path =
            std::env::temp_dir().join(format!("strip-{}-{:08x}", name, rand::random::<u32>()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn strips_both_tag_formats() {
        let path = scratch_file("both", b"audio payload");
        write_id3v2(&path, &Id3v2Tag::with_comment("id3v1 and id3v2")).unwrap();
        write_id3v1(&path, &Id3v1Tag::with_comment("id3v1 and id3v2")).unwrap();

        let out = path.with_extension("out");
        let (written_to, bytes) = strip_file(&path, Some(&out), false).unwrap();
        assert_eq!(written_to, out);
        assert_eq!(bytes, b"audio payload".len() as u64);
        assert_eq!(std::fs::read(&out).unwrap(), b"audio payload");

        std::fs::remove_file(&path).unwrap();
        std::fs::remove_file(&out).unwrap();
    }

    #[test]
    fn refuses_to_clobber_without_overwrite() {
        let path = scratch_file("in", b"payload");
        let out = scratch_file("existing", b"keep me");

        assert!(strip_file(&path, Some(&out), false).is_err());
        assert_eq!(std::fs::read(&out).unwrap(), b"keep me");

        // Same call with overwrite succeeds
        strip_file(&path, Some(&out), true).unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"payload");

        std::fs::remove_file(&path).unwrap();
        std::fs::remove_file(&out).unwrap();
    }

    #[test]
    fn default_output_name_is_prefixed() {
        let out = stripped_output_path(Path::new("/tmp/res/v1-only.flac"));
        assert_eq!(out, PathBuf::from("/tmp/res/[STRIPPED] v1-only.flac"));
    }
}
