//! Frame persister behaviour against a real filesystem

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use common::{file_count, ready_persister, solid_frame};
use frame_to_file::frame_scale::pixel::BufferMetadata;
use frame_to_file::persist::{FramePersister, PersisterState, read_persisted};
use frame_to_file::processing::{FormatPolicy, FrameVariant, select_variant};
use frame_to_file::FrameError;
use proptest::prelude::*;

fn original(seq: u64) -> FrameVariant {
    select_variant(solid_frame(seq, 4, 4, [10, 20, 30]), None, None, FormatPolicy::Strict).unwrap()
}

#[test]
fn rapid_persists_never_reuse_a_path() {
    let (_dir, persister) = ready_persister(false);
    let variant = original(0);

    let mut seen = HashSet::new();
    for _ in 0..1000 {
        let result = persister.persist(&variant).unwrap();
        assert!(seen.insert(result.path), "path reused");
    }
    assert_eq!(file_count(persister.directory()), 1000);
}

#[test]
fn persists_from_many_threads_stay_unique() {
    let (_dir, persister) = ready_persister(true);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let persister = persister.clone();
            thread::spawn(move || {
                let variant = original(t);
                (0..100)
                    .map(|_| persister.persist(&variant).unwrap().path)
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for path in handle.join().unwrap() {
            assert!(seen.insert(path));
        }
    }
    assert_eq!(seen.len(), 400);
    assert_eq!(persister.state(), PersisterState::Ready);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Bursts of back-to-back writes with short pauses between them never repeat a path.
    #[test]
    fn prop_paths_unique_across_bursts(
        bursts in prop::collection::vec((1usize..40, 0u64..3), 1..6)
    ) {
        let (_dir, persister) = ready_persister(false);
        let variant = original(0);
        let mut seen = HashSet::new();
        for (count, pause_ms) in bursts {
            for _ in 0..count {
                let path = persister.persist(&variant).unwrap().path;
                prop_assert!(seen.insert(path));
            }
            thread::sleep(std::time::Duration::from_millis(pause_ms));
        }
        prop_assert_eq!(file_count(persister.directory()), seen.len());
    }
}

#[test]
fn two_persists_in_the_same_millisecond_differ() {
    let (_dir, persister) = ready_persister(false);
    let variant = original(0);
    let a = persister.persist(&variant).unwrap();
    let b = persister.persist(&variant).unwrap();
    assert_ne!(a.path, b.path);
}

#[test]
fn clear_deletes_exactly_n_files() {
    let (_dir, persister) = ready_persister(true);
    let variant = original(0);
    for _ in 0..25 {
        persister.persist(&variant).unwrap();
    }

    let report = persister.clear_directory();
    assert_eq!(report.deleted, 25);
    assert!(report.is_complete());
    assert_eq!(file_count(persister.directory()), 0);
    assert_eq!(persister.state(), PersisterState::Ready);
}

#[test]
fn clear_on_empty_directory_returns_zero() {
    let (_dir, persister) = ready_persister(true);
    let report = persister.clear_directory();
    assert_eq!(report.deleted, 0);
    assert!(report.failures.is_empty());
}

#[test]
fn initialize_clears_leftovers_from_a_previous_run() {
    let dir = tempfile::tempdir().unwrap();
    let frames = dir.path().join("frames");
    std::fs::create_dir_all(&frames).unwrap();
    for i in 0..3 {
        std::fs::write(frames.join(format!("stale_{i}.raw")), b"old").unwrap();
    }

    let persister = FramePersister::new(&frames, true);
    let report = persister.initialize().unwrap();
    assert_eq!(report.deleted, 3);
    assert_eq!(file_count(&frames), 0);
}

#[test]
fn persist_before_initialize_is_a_state_error() {
    let dir = tempfile::tempdir().unwrap();
    let persister = FramePersister::new(dir.path().join("never"), true);
    let err = persister.persist(&original(0)).unwrap_err();
    assert!(matches!(err, FrameError::State { .. }));
    assert!(!dir.path().join("never").exists());
}

#[test]
fn clear_and_persist_interleave_without_losing_a_write() {
    let (_dir, persister) = ready_persister(false);

    let writer = {
        let persister = persister.clone();
        thread::spawn(move || {
            let variant = original(0);
            let mut paths = Vec::new();
            for _ in 0..200 {
                match persister.persist(&variant) {
                    Ok(result) => paths.push(result.path),
                    // Refused while a clear is in progress.
                    Err(FrameError::State { .. }) => {}
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
            paths
        })
    };
    let clearer = {
        let persister = persister.clone();
        thread::spawn(move || (0..20).map(|_| persister.clear_directory().deleted).sum::<usize>())
    };

    let paths = writer.join().unwrap();
    let cleared = clearer.join().unwrap();
    let remaining = file_count(persister.directory());

    // Every written file was either cleared or is still on disk; none was half-written.
    assert_eq!(cleared + remaining, paths.len());
    assert_eq!(persister.state(), PersisterState::Ready);
}

#[test]
fn headered_resized_file_reads_back_with_its_layout() {
    let (_dir, persister) = ready_persister(true);
    let meta = BufferMetadata::argb8(120, 90);
    let resized = frame_to_file::processing::ResizedBuffer {
        data: vec![7; meta.expected_len()],
        elapsed: std::time::Duration::from_millis(2),
    };
    let variant = select_variant(
        solid_frame(1, 480, 360, [1, 2, 3]),
        Some(resized),
        Some(meta),
        FormatPolicy::Strict,
    )
    .unwrap();

    let result = persister.persist(&variant).unwrap();
    assert!(result.resize_duration_ms.is_some());
    assert_eq!(result.bytes_written, 16 + meta.expected_len());

    let back = read_persisted(&result.path).unwrap();
    assert_eq!(*back.meta(), meta);
    assert!(back.as_bytes().iter().all(|&b| b == 7));
}

#[test]
fn persister_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<FramePersister>();
    assert_send_sync::<Arc<FramePersister>>();
}
