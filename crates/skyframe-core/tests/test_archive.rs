mod common;

use std::path::Path;

use common::*;
use skyframe_core::codec::archive::decode_image_archive;
use skyframe_core::codec::DecodeContext;
use skyframe_core::consts::{MODE_UID_KEY, REQUEST_START_KEY, SITE_UID_KEY};
use skyframe_core::frame::{DecodedFile, FramePixels, MetadataValue};
use skyframe_core::{CancellationToken, ErrorKind, Instrument, ReadOptions, Result};

fn decode(path: &Path, options: &ReadOptions) -> Result<DecodedFile> {
    let cancel = CancellationToken::new();
    let ctx = DecodeContext::new(Instrument::Rgb.format(), options, &cancel);
    decode_image_archive(path, &ctx)
}

fn scratch_options(scratch: &Path) -> ReadOptions {
    ReadOptions::default().with_scratch_dir(scratch)
}

#[test]
fn test_members_decoded_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    // Written out of order on purpose.
    let members: Vec<(String, Vec<u8>)> = [3usize, 0, 4, 1, 2]
        .iter()
        .map(|&i| (burst_member_name(i), png_bytes(5, 4, i as u8)))
        .collect();
    let path = dir.path().join("burst.png.tar");
    write_tar(&path, &members);

    let decoded = decode(&path, &scratch_options(scratch.path())).unwrap();
    assert_eq!(decoded.frame_count(), 5);
    assert!(decoded.problem.is_none());

    for (i, frame) in decoded.frames.iter().enumerate() {
        let FramePixels::U8(pixels) = &frame.pixels else {
            panic!("png frames are 8-bit");
        };
        assert_eq!(pixels.dim(), (4, 5, 3));
        assert_eq!(pixels[[0, 0, 0]], i as u8);
        assert_eq!(pixels[[2, 3, 1]], 3);
        assert_eq!(pixels[[2, 3, 2]], 2);
    }

    let starts: Vec<&MetadataValue> = decoded
        .frames
        .iter()
        .map(|f| &f.metadata[REQUEST_START_KEY])
        .collect();
    assert!(starts.windows(2).all(|w| match (w[0], w[1]) {
        (MetadataValue::Timestamp(a), MetadataValue::Timestamp(b)) => a < b,
        _ => false,
    }));
    assert_eq!(
        decoded.frames[0].metadata[MODE_UID_KEY],
        MetadataValue::from("burst")
    );
    assert_eq!(
        decoded.frames[0].metadata[SITE_UID_KEY],
        MetadataValue::from("gill")
    );
}

#[test]
fn test_scratch_directory_removed() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let path = write_burst_archive(dir.path(), "a.png.tar", 3, 4, 4);

    decode(&path, &scratch_options(scratch.path())).unwrap();
    let leftovers: Vec<_> = std::fs::read_dir(scratch.path()).unwrap().collect();
    assert!(leftovers.is_empty(), "scratch not cleaned: {leftovers:?}");
}

#[test]
fn test_first_frame_only() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let path = write_burst_archive(dir.path(), "a.png.tar", 6, 4, 4);

    let options = scratch_options(scratch.path()).with_first_frame(true);
    let decoded = decode(&path, &options).unwrap();
    assert_eq!(decoded.frame_count(), 1);
    let FramePixels::U8(pixels) = &decoded.frames[0].pixels else {
        panic!("png frames are 8-bit");
    };
    assert_eq!(pixels[[0, 0, 0]], 0);
}

#[test]
fn test_no_metadata_accepts_any_member_name() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.png.tar");
    write_tar(
        &path,
        &[
            ("frame_b.png".to_string(), png_bytes(4, 4, 1)),
            ("frame_a.png".to_string(), png_bytes(4, 4, 0)),
        ],
    );

    let options = scratch_options(scratch.path()).with_no_metadata(true);
    let decoded = decode(&path, &options).unwrap();
    assert_eq!(decoded.frame_count(), 2);
    assert!(decoded.problem.is_none());
    assert!(decoded.frames.iter().all(|f| f.metadata.is_empty()));
}

#[test]
fn test_bad_member_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.png.tar");
    write_tar(
        &path,
        &[
            (burst_member_name(0), png_bytes(4, 4, 0)),
            (burst_member_name(1), b"not a png".to_vec()),
            (burst_member_name(2), png_bytes(4, 4, 2)),
            ("badly-named.png".to_string(), png_bytes(4, 4, 3)),
        ],
    );

    let decoded = decode(&path, &scratch_options(scratch.path())).unwrap();
    assert_eq!(decoded.frame_count(), 2);
    assert!(decoded.problem.is_some());
}

#[test]
fn test_loose_image_is_one_frame() {
    let dir = tempfile::tempdir().unwrap();
    let name = "20200508_060500_122643_gill_rgb-04_320ms_full.png";
    let path = write_file(dir.path(), name, &png_bytes(6, 3, 9));

    let decoded = decode(&path, &ReadOptions::default()).unwrap();
    assert_eq!(decoded.frame_count(), 1);
    assert_eq!(decoded.frames[0].height(), 3);
    assert_eq!(decoded.frames[0].width(), 6);
    assert_eq!(
        decoded.frames[0].metadata[MODE_UID_KEY],
        MetadataValue::from("full")
    );
}

#[test]
fn test_empty_archive_is_problematic() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.png.tar");
    write_tar(&path, &[]);

    let decoded = decode(&path, &scratch_options(scratch.path())).unwrap();
    assert_eq!(decoded.frame_count(), 0);
    assert_eq!(
        decoded.problem.unwrap().error_message,
        "no image data read"
    );
}

#[test]
fn test_missing_archive_is_open_failure() {
    let dir = tempfile::tempdir().unwrap();
    let err = decode(&dir.path().join("gone.png.tar"), &ReadOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OpenFailure);

    let err = decode(&dir.path().join("gone.png"), &ReadOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OpenFailure);
}
