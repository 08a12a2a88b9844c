mod common;

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::*;
use ndarray::Ix3;
use skyframe_core::consts::REQUEST_START_KEY;
use skyframe_core::frame::PixelType;
use skyframe_core::progress::ProgressReporter;
use skyframe_core::{
    read, read_nir, read_reported, read_rgb, CancellationToken, Instrument, ReadOptions,
};

fn nir_files(dir: &std::path::Path, count: usize, frames: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            write_file(
                dir,
                &format!("20220307_06{i:02}_gill_nir-216_8bit.pgm"),
                &build_raw_stream(frames, 8, 6),
            )
        })
        .collect()
}

#[test]
fn test_three_files_two_workers() {
    let dir = tempfile::tempdir().unwrap();
    let files = nir_files(dir.path(), 3, 10);

    let result = read_nir(&files, &ReadOptions::default().with_workers(2));
    assert_eq!(result.images.shape(), &[6, 8, 30]);
    assert_eq!(result.images.pixel_type(), PixelType::U16);
    assert_eq!(result.metadata.len(), 30);
    assert!(result.problematic.is_empty());
}

#[test]
fn test_worker_count_does_not_change_result() {
    let dir = tempfile::tempdir().unwrap();
    let files = nir_files(dir.path(), 5, 4);

    let sequential = read_nir(&files, &ReadOptions::default().with_workers(1));
    let parallel = read_nir(&files, &ReadOptions::default().with_workers(3));
    assert_eq!(sequential, parallel);
}

#[test]
fn test_files_concatenate_in_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "a.pgm", &build_raw_stream(2, 4, 4));
    let mut b_bytes = b"P5\n".to_vec();
    for frame in 5..8 {
        b_bytes.extend(raw_metadata_lines(frame, Some("gill")));
        b_bytes.extend(raw_pixel_block(frame, 4, 4));
    }
    let b = write_file(dir.path(), "b.pgm", &b_bytes);

    let options = ReadOptions::default().with_workers(2);
    let both = read_nir(&[&b, &a], &options);
    let only_b = read_nir(&[&b], &options);
    let only_a = read_nir(&[&a], &options);

    assert_eq!(both.frame_count(), only_a.frame_count() + only_b.frame_count());
    let stack = both
        .images
        .as_u16()
        .unwrap()
        .view()
        .into_dimensionality::<Ix3>()
        .unwrap();
    assert_eq!(stack[[0, 1, 0]], raw_sample(5, 1));
    assert_eq!(stack[[0, 1, 3]], raw_sample(0, 1));
    assert_eq!(both.metadata[..3], only_b.metadata[..]);
    assert_eq!(both.metadata[3..], only_a.metadata[..]);
}

#[test]
fn test_first_frame_per_file() {
    let dir = tempfile::tempdir().unwrap();
    let files = nir_files(dir.path(), 4, 10);

    let result = read_nir(&files, &ReadOptions::default().with_first_frame(true));
    assert_eq!(result.frame_count(), 4);
    assert!(result
        .metadata
        .iter()
        .all(|m| m[REQUEST_START_KEY].as_str() == Some("2022-03-07 06:00:00.000000 UTC")));
}

#[test]
fn test_no_metadata_keeps_frame_count() {
    let dir = tempfile::tempdir().unwrap();
    let files = nir_files(dir.path(), 2, 10);

    let with = read_nir(&files, &ReadOptions::default());
    let without = read_nir(&files, &ReadOptions::default().with_no_metadata(true));
    assert_eq!(with.frame_count(), without.frame_count());
    assert_eq!(with.images, without.images);
    assert!(without.metadata.iter().all(|m| m.is_empty()));
}

#[test]
fn test_two_burst_archives() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let files = vec![
        write_burst_archive(dir.path(), "a.png.tar", 167, 4, 3),
        write_burst_archive(dir.path(), "b.png.tar", 159, 4, 3),
    ];

    let options = ReadOptions::default()
        .with_workers(2)
        .with_scratch_dir(scratch.path());
    let result = read_rgb(&files, &options);
    assert_eq!(result.images.shape(), &[3, 4, 3, 326]);
    assert_eq!(result.images.pixel_type(), PixelType::U8);
    assert_eq!(result.metadata.len(), 326);
    assert!(result.problematic.is_empty());
}

#[test]
fn test_bad_file_listed_and_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let mut files = nir_files(dir.path(), 2, 3);
    let missing = dir.path().join("missing.pgm");
    let unknown = write_file(dir.path(), "notes.txt", b"n/a");
    files.insert(1, missing.clone());
    files.push(unknown.clone());

    let result = read_nir(&files, &ReadOptions::default().with_workers(2));
    assert_eq!(result.frame_count(), 6);
    let names: Vec<&PathBuf> = result.problematic.iter().map(|p| &p.filename).collect();
    assert_eq!(names, vec![&missing, &unknown]);
}

#[test]
fn test_huge_dimension_line_leaves_batch_intact() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_file(dir.path(), "good.pgm", &build_raw_stream(3, 8, 6));
    let mut bad_bytes = b"P5\n".to_vec();
    bad_bytes.extend(raw_metadata_lines(0, Some("gill")));
    bad_bytes.extend_from_slice(b"3000000 3000000\n65535\n");
    let bad = write_file(dir.path(), "bad.pgm", &bad_bytes);

    let result = read_nir(&[&good, &bad], &ReadOptions::default().with_workers(2));
    assert_eq!(result.frame_count(), 3);
    assert_eq!(result.problematic.len(), 1);
    assert_eq!(result.problematic[0].filename, bad);
}

#[test]
fn test_mixed_layouts_reject_later_file() {
    let dir = tempfile::tempdir().unwrap();
    let big = write_file(dir.path(), "big.pgm", &build_raw_stream(2, 8, 6));
    let small = write_file(dir.path(), "small.pgm", &build_raw_stream(2, 4, 4));

    let result = read(Instrument::Nir, &[&big, &small], &ReadOptions::default());
    assert_eq!(result.images.shape(), &[6, 8, 2]);
    assert_eq!(result.problematic.len(), 1);
    assert_eq!(result.problematic[0].filename, small);
    assert!(result.problematic[0]
        .error_message
        .contains("consistency error"));
}

#[test]
fn test_empty_input() {
    let files: Vec<PathBuf> = Vec::new();
    let result = read_nir(&files, &ReadOptions::default());
    assert_eq!(result.images.shape(), &[0, 0, 0]);
    assert!(result.metadata.is_empty());
    assert!(result.problematic.is_empty());
}

#[test]
fn test_precancelled_read_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let files = nir_files(dir.path(), 3, 2);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = read_reported(
        Instrument::Nir.format(),
        &files,
        &ReadOptions::default().with_workers(2),
        &cancel,
        &skyframe_core::progress::NoOpReporter,
    );
    assert_eq!(result.frame_count(), 0);
    assert!(result.metadata.is_empty());
    assert!(result.problematic.is_empty());
}

/// Cancels the read once the first file completes.
struct CancelAfterFirst {
    cancel: CancellationToken,
    begun: AtomicUsize,
    advanced: AtomicUsize,
}

impl ProgressReporter for CancelAfterFirst {
    fn begin(&self, total_files: usize) {
        self.begun.store(total_files, Ordering::SeqCst);
    }

    fn advance(&self, _files_done: usize) {
        self.advanced.fetch_add(1, Ordering::SeqCst);
        self.cancel.cancel();
    }
}

#[test]
fn test_cancel_mid_read_discards_partial_work() {
    let dir = tempfile::tempdir().unwrap();
    let files = nir_files(dir.path(), 4, 2);
    let cancel = CancellationToken::new();
    let reporter = CancelAfterFirst {
        cancel: cancel.clone(),
        begun: AtomicUsize::new(0),
        advanced: AtomicUsize::new(0),
    };

    let result = read_reported(
        Instrument::Nir.format(),
        &files,
        &ReadOptions::default(),
        &cancel,
        &reporter,
    );
    assert_eq!(result.frame_count(), 0);
    assert_eq!(reporter.begun.load(Ordering::SeqCst), 4);
    assert_eq!(reporter.advanced.load(Ordering::SeqCst), 1);
}
