//! The fixture pipeline: synthesize a tone, normalize the WAV container,
//! encode to FLAC, fan the result out into four copies, and tag three of
//! them. `verify` re-checks a generated set from disk.

use crate::codecs::{FlacCodec, WavCodec, wav};
use crate::id3::{self, Id3v1Tag, Id3v2Tag};
use crate::prelude::*;
use crate::tone;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// Intermediate files
pub const WAV_FILE: &str = "input.wav";
pub const FLAC_FILE: &str = "input.flac";

// Fixture files, named for their tag state
pub const UNTAGGED_FILE: &str = "stripped.flac";
pub const V1_ONLY_FILE: &str = "v1-only.flac";
pub const V2_ONLY_FILE: &str = "v2-only.flac";
pub const V1_AND_V2_FILE: &str = "v1-and-v2.flac";

// Comment strings identifying which tag formats are present
pub const V1_ONLY_COMMENT: &str = "id3v1 only";
pub const V2_ONLY_COMMENT: &str = "id3v2 only";
pub const V1_AND_V2_COMMENT: &str = "id3v1 and id3v2";

/// Tone settings for the generated fixtures.
#[derive(Debug, Clone)]
pub struct FixtureSpec {
    pub frequency_hz: f32,
    pub sample_rate: u32,
    pub duration_secs: f32,
    pub channels: u16,
    pub amplitude: f32,
}

impl Default for FixtureSpec {
    fn default() -> Self {
        Self {
            frequency_hz: tone::FIXTURE_FREQUENCY_HZ,
            sample_rate: tone::FIXTURE_SAMPLE_RATE,
            duration_secs: tone::FIXTURE_DURATION_SECS,
            channels: tone::FIXTURE_CHANNELS,
            amplitude: tone::FIXTURE_AMPLITUDE,
        }
    }
}

impl FixtureSpec {
    pub fn expected_frames(&self) -> usize {
        (self.sample_rate as f32 * self.duration_secs) as usize
    }
}

/// Paths of a fixture set rooted at one directory.
#[derive(Debug, Clone)]
pub struct FixtureSet {
    pub dir: PathBuf,
}

impl FixtureSet {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn wav(&self) -> PathBuf {
        self.dir.join(WAV_FILE)
    }

    pub fn flac(&self) -> PathBuf {
        self.dir.join(FLAC_FILE)
    }

    pub fn untagged(&self) -> PathBuf {
        self.dir.join(UNTAGGED_FILE)
    }

    pub fn v1_only(&self) -> PathBuf {
        self.dir.join(V1_ONLY_FILE)
    }

    pub fn v2_only(&self) -> PathBuf {
        self.dir.join(V2_ONLY_FILE)
    }

    pub fn v1_and_v2(&self) -> PathBuf {
        self.dir.join(V1_AND_V2_FILE)
    }

    /// The four final fixtures.
    pub fn fixtures(&self) -> [PathBuf; 4] {
        [
            self.untagged(),
            self.v1_only(),
            self.v2_only(),
            self.v1_and_v2(),
        ]
    }

    fn outputs(&self) -> [PathBuf; 6] {
        [
            self.wav(),
            self.flac(),
            self.untagged(),
            self.v1_only(),
            self.v2_only(),
            self.v1_and_v2(),
        ]
    }
}

/// Run the whole pipeline into `dir`. Aborts on the first failure; any
/// files written up to that point are left in place.
pub fn generate(dir: &Path, spec: &FixtureSpec, force: bool) -> R<FixtureSet> {
    std::fs::create_dir_all(dir)?;
    let set = FixtureSet::new(dir);

    if !force {
        for path in set.outputs() {
            if path.exists() {
                return Err(anyhow!(
                    "Refusing to overwrite {} (use --force to regenerate)",
                    path.display()
                ));
            }
        }
    }

    // Step 1: synthesize the tone into a WAV container. The writer stamps a
    // LIST/INFO chunk, like the synthesis tools this replaces.
    info!(
        "Synthesizing {} Hz tone: {} Hz sample rate, {} s, {} channels",
        spec.frequency_hz, spec.sample_rate, spec.duration_secs, spec.channels
    );
    let buffer = tone::sine(
        spec.frequency_hz,
        spec.sample_rate,
        spec.duration_secs,
        spec.channels,
        spec.amplitude,
    );
    let raw_wav = WavCodec.encode(&buffer)?;
    std::fs::write(set.wav(), &raw_wav)?;
    debug!("Wrote {} ({} bytes)", set.wav().display(), raw_wav.len());

    // Step 2: normalize the container by dropping the LIST chunk.
    info!("Removing LIST chunk from {}", WAV_FILE);
    let clean_wav = wav::remove_list_chunk(&raw_wav)?;
    crate::write_atomic(&set.wav(), &clean_wav)?;

    // Step 3: encode the clean container losslessly.
    info!("Encoding {} to {}", WAV_FILE, FLAC_FILE);
    let decoded = WavCodec.decode(&clean_wav)?;
    let flac_data = FlacCodec.encode(&decoded)?;
    std::fs::write(set.flac(), &flac_data)?;
    debug!("Wrote {} ({} bytes)", set.flac().display(), flac_data.len());

    // Step 4: fan out into the four fixture files before any tagging, so
    // tagging one copy cannot affect its siblings.
    info!("Copying {} into the four fixture files", FLAC_FILE);
    for path in set.fixtures() {
        std::fs::copy(set.flac(), &path)?;
    }

    // Step 5: tag three of the four copies in place.
    info!("Tagging fixtures");
    id3::write_id3v1(&set.v1_only(), &Id3v1Tag::with_comment(V1_ONLY_COMMENT))?;
    id3::write_id3v2(&set.v2_only(), &Id3v2Tag::with_comment(V2_ONLY_COMMENT))?;
    id3::write_id3v2(&set.v1_and_v2(), &Id3v2Tag::with_comment(V1_AND_V2_COMMENT))?;
    id3::write_id3v1(&set.v1_and_v2(), &Id3v1Tag::with_comment(V1_AND_V2_COMMENT))?;

    info!("Fixture set complete in {}", dir.display());
    Ok(set)
}

/// Check a generated fixture set: tag presence matrix, comment strings,
/// identical acoustic payloads, and a normalized intermediate WAV.
pub fn verify(dir: &Path, spec: &FixtureSpec) -> R<()> {
    let set = FixtureSet::new(dir);

    // The intermediate WAV must have been normalized
    let wav_data = std::fs::read(set.wav())?;
    if wav::contains_chunk(&wav_data, wav::LIST_CHUNK_ID)? {
        return Err(anyhow!("{} still contains a LIST chunk", WAV_FILE));
    }

    let untagged = std::fs::read(set.untagged())?;
    if id3::has_id3v2(&untagged) || id3::find_id3v1(&untagged).is_some() {
        return Err(anyhow!("{} must carry no tags", UNTAGGED_FILE));
    }

    // The untagged baseline must be a well-formed FLAC stream with no
    // metadata of its own
    let baseline_tag = metaflac::Tag::read_from_path(set.untagged())?;
    if baseline_tag.vorbis_comments().is_some() {
        return Err(anyhow!(
            "{} unexpectedly carries Vorbis comments",
            UNTAGGED_FILE
        ));
    }

    check_tagged_fixture(&set.v1_only(), &untagged, Some(V1_ONLY_COMMENT), None)?;
    check_tagged_fixture(&set.v2_only(), &untagged, None, Some(V2_ONLY_COMMENT))?;
    check_tagged_fixture(
        &set.v1_and_v2(),
        &untagged,
        Some(V1_AND_V2_COMMENT),
        Some(V1_AND_V2_COMMENT),
    )?;

    // All four fixtures decode to the same samples
    let reference = FlacCodec.decode(&untagged)?;
    if reference.frames() != spec.expected_frames() {
        return Err(anyhow!(
            "Expected {} frames per channel, found {}",
            spec.expected_frames(),
            reference.frames()
        ));
    }
    if reference.channels != spec.channels || reference.sample_rate != spec.sample_rate {
        return Err(anyhow!("Fixture stream parameters do not match"));
    }

    for path in set.fixtures() {
        let data = std::fs::read(&path)?;
        let decoded = FlacCodec.decode(id3::strip_tags(&data)?)?;
        if decoded.data != reference.data {
            return Err(anyhow!(
                "{} decodes to different samples than {}",
                path.display(),
                UNTAGGED_FILE
            ));
        }
    }

    info!("Fixture set in {} verified", dir.display());
    Ok(())
}

fn check_tagged_fixture(
    path: &Path,
    untagged: &[u8],
    v1_comment: Option<&str>,
    v2_comment: Option<&str>,
) -> R<()> {
    let data = std::fs::read(path)?;

    match v1_comment {
        Some(expected) => {
            let tag = id3::read_id3v1(&data)?
                .ok_or_else(|| anyhow!("{} is missing its ID3v1 trailer", path.display()))?;
            if tag.comment != expected {
                return Err(anyhow!(
                    "{}: ID3v1 comment is {:?}, expected {:?}",
                    path.display(),
                    tag.comment,
                    expected
                ));
            }
        }
        None => {
            if id3::find_id3v1(&data).is_some() {
                return Err(anyhow!(
                    "{} unexpectedly carries an ID3v1 trailer",
                    path.display()
                ));
            }
        }
    }

    match v2_comment {
        Some(expected) => {
            if !id3::has_id3v2(&data) {
                return Err(anyhow!("{} is missing its ID3v2 header", path.display()));
            }
            let comment = id3::read_id3v2_comment(&data)?
                .ok_or_else(|| anyhow!("{} has no COMM frame", path.display()))?;
            if comment != expected {
                return Err(anyhow!(
                    "{}: ID3v2 comment is {:?}, expected {:?}",
                    path.display(),
                    comment,
                    expected
                ));
            }
        }
        None => {
            if id3::has_id3v2(&data) {
                return Err(anyhow!(
                    "{} unexpectedly carries an ID3v2 header",
                    path.display()
                ));
            }
        }
    }

    // Removing the tags must recover the untagged baseline byte for byte
    if id3::strip_tags(&data)? != untagged {
        return Err(anyhow!(
            "{}: payload differs from {} after stripping tags",
            path.display(),
            UNTAGGED_FILE
        ));
    }

    Ok(())
}
