//! End-to-end pipeline tests: generate a fixture set into a scratch
//! directory and check the properties the fixtures exist to provide.

use std::path::PathBuf;

use fixturegen_lib::codecs::{Codec, FlacCodec};
use fixturegen_lib::{fixtures, id3, strip};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "fixturegen-{}-{:08x}",
        name,
        rand::random::<u32>()
    ));
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

fn short_spec() -> fixtures::FixtureSpec {
    // A short clip keeps the encode fast; everything else matches the
    // default settings
    fixtures::FixtureSpec {
        duration_secs: 0.1,
        ..fixtures::FixtureSpec::default()
    }
}

#[test]
fn generate_then_verify_succeeds() {
    let dir = scratch_dir("verify");
    let spec = short_spec();

    fixtures::generate(&dir, &spec, false).expect("generate fixtures");
    fixtures::verify(&dir, &spec).expect("verify fixtures");

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn exactly_four_fixtures_plus_intermediates() {
    let dir = scratch_dir("count");
    let set = fixtures::generate(&dir, &short_spec(), false).unwrap();

    for path in set.fixtures() {
        assert!(path.exists(), "missing fixture {}", path.display());
    }
    assert!(set.wav().exists());
    assert!(set.flac().exists());

    let entries = std::fs::read_dir(&dir).unwrap().count();
    assert_eq!(entries, 6, "unexpected files in the output directory");

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn tag_matrix_is_correct() {
    let dir = scratch_dir("matrix");
    let set = fixtures::generate(&dir, &short_spec(), false).unwrap();

    let untagged = std::fs::read(set.untagged()).unwrap();
    assert!(!id3::has_id3v2(&untagged));
    assert!(id3::find_id3v1(&untagged).is_none());

    let v1_only = std::fs::read(set.v1_only()).unwrap();
    assert!(!id3::has_id3v2(&v1_only));
    let v1_tag = id3::read_id3v1(&v1_only).unwrap().expect("v1 trailer");
    assert_eq!(v1_tag.comment, fixtures::V1_ONLY_COMMENT);

    let v2_only = std::fs::read(set.v2_only()).unwrap();
    assert!(id3::find_id3v1(&v2_only).is_none());
    assert_eq!(
        id3::read_id3v2_comment(&v2_only).unwrap().as_deref(),
        Some(fixtures::V2_ONLY_COMMENT)
    );

    let both = std::fs::read(set.v1_and_v2()).unwrap();
    let both_v1 = id3::read_id3v1(&both).unwrap().expect("v1 trailer");
    assert_eq!(both_v1.comment, fixtures::V1_AND_V2_COMMENT);
    assert_eq!(
        id3::read_id3v2_comment(&both).unwrap().as_deref(),
        Some(fixtures::V1_AND_V2_COMMENT)
    );

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn fixtures_share_one_acoustic_payload() {
    let dir = scratch_dir("payload");
    let set = fixtures::generate(&dir, &short_spec(), false).unwrap();

    let untagged = std::fs::read(set.untagged()).unwrap();
    let reference = FlacCodec.decode(&untagged).unwrap();
    assert_eq!(reference.frames(), short_spec().expected_frames());

    for path in set.fixtures() {
        let data = std::fs::read(&path).unwrap();
        let payload = id3::strip_tags(&data).unwrap();
        assert_eq!(payload, untagged.as_slice(), "{}", path.display());

        let decoded = FlacCodec.decode(payload).unwrap();
        assert_eq!(decoded.data, reference.data, "{}", path.display());
    }

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn regeneration_is_byte_identical() {
    let dir = scratch_dir("idempotent");
    let spec = short_spec();

    let set = fixtures::generate(&dir, &spec, false).unwrap();
    let first: Vec<Vec<u8>> = set
        .fixtures()
        .iter()
        .map(|p| std::fs::read(p).unwrap())
        .collect();

    fixtures::generate(&dir, &spec, true).unwrap();
    let second: Vec<Vec<u8>> = set
        .fixtures()
        .iter()
        .map(|p| std::fs::read(p).unwrap())
        .collect();

    assert_eq!(first, second);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn generate_refuses_to_overwrite_without_force() {
    let dir = scratch_dir("noclobber");
    fixtures::generate(&dir, &short_spec(), false).unwrap();

    let err = fixtures::generate(&dir, &short_spec(), false).unwrap_err();
    assert!(err.to_string().contains("--force"), "{}", err);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn stripping_tagged_fixtures_recovers_the_baseline() {
    let dir = scratch_dir("strip");
    let set = fixtures::generate(&dir, &short_spec(), false).unwrap();
    let untagged = std::fs::read(set.untagged()).unwrap();

    for path in [set.v1_only(), set.v2_only(), set.v1_and_v2()] {
        let out = dir.join(format!(
            "stripped-{}",
            path.file_name().unwrap().to_string_lossy()
        ));
        strip::strip_file(&path, Some(&out), false).unwrap();
        assert_eq!(
            std::fs::read(&out).unwrap(),
            untagged,
            "{}",
            path.display()
        );
    }

    std::fs::remove_dir_all(&dir).unwrap();
}
