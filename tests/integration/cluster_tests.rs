use photodupe::cache::{HashCache, HashRecord, HashStore, RecordStore};
use photodupe::duplicates::{ClusterConfig, ClusterEngine, ScanEvent, ScanOutcome, ScanStatus};
use photodupe::progress::ProgressCallback;
use photodupe::scanner::{Fingerprint, StandardDecoder};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

fn entry(path: &str, bits: u64) -> (PathBuf, Fingerprint) {
    (PathBuf::from(path), Fingerprint::from_bits(bits))
}

/// `n` low bits set.
fn ones(n: u32) -> u64 {
    if n == 0 {
        0
    } else {
        u64::MAX >> (64 - n)
    }
}

/// A-B at distance 3, B-C at 4 (A-C at 7), D at least 10 from all.
fn chain_entries() -> Vec<(PathBuf, Fingerprint)> {
    vec![
        entry("/img/d.jpg", ones(10) << 54),
        entry("/img/c.jpg", ones(7)),
        entry("/img/a.jpg", 0),
        entry("/img/b.jpg", ones(3)),
    ]
}

#[test]
fn test_transitive_chain_forms_one_group() {
    let engine = ClusterEngine::new(ClusterConfig::default().with_threshold(5));
    let (groups, outcome) = engine.cluster_all(chain_entries());

    assert_eq!(outcome, ScanOutcome::Completed { groups: 1 });
    assert_eq!(groups.len(), 1);
    assert_eq!(
        groups[0].files(),
        &[
            PathBuf::from("/img/a.jpg"),
            PathBuf::from("/img/b.jpg"),
            PathBuf::from("/img/c.jpg"),
        ]
    );
    assert_eq!(groups[0].representative(), Some(PathBuf::from("/img/a.jpg").as_path()));
    assert!(!groups[0].contains(&PathBuf::from("/img/d.jpg")));
}

#[test]
fn test_tighter_threshold_splits_chain() {
    let engine = ClusterEngine::new(ClusterConfig::default().with_threshold(3));
    let (groups, _) = engine.cluster_all(chain_entries());

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
    assert!(groups[0].contains(&PathBuf::from("/img/a.jpg")));
    assert!(groups[0].contains(&PathBuf::from("/img/b.jpg")));
}

#[test]
fn test_streamed_groups_ordered_by_representative() {
    let entries = vec![
        entry("/z/2.jpg", 0xFFFF_0000_0000_0000),
        entry("/a/2.jpg", 0),
        entry("/z/1.jpg", 0xFFFF_0000_0000_0001),
        entry("/a/1.jpg", 1),
    ];
    let engine = ClusterEngine::default();
    let mut reps = Vec::new();
    let outcome = engine.cluster(entries, |group| {
        reps.push(group.representative().map(|p| p.to_path_buf()));
    });

    assert_eq!(outcome, ScanOutcome::Completed { groups: 2 });
    assert_eq!(
        reps,
        vec![Some(PathBuf::from("/a/1.jpg")), Some(PathBuf::from("/z/1.jpg"))]
    );
}

struct StopOnFirstProgress {
    flag: Arc<AtomicBool>,
    calls: AtomicUsize,
}

impl ProgressCallback for StopOnFirstProgress {
    fn on_progress(&self, _processed: usize, _total: usize) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.flag.store(true, Ordering::SeqCst);
    }
}

#[test]
fn test_cancel_from_progress_callback() {
    // Every fingerprint identical: a completed run would yield one huge group
    let entries: Vec<_> = (0..10_000)
        .map(|i| entry(&format!("/bulk/{:05}.jpg", i), 42))
        .collect();

    let flag = Arc::new(AtomicBool::new(false));
    let callback = Arc::new(StopOnFirstProgress {
        flag: flag.clone(),
        calls: AtomicUsize::new(0),
    });
    let engine = ClusterEngine::new(
        ClusterConfig::default()
            .with_workers(1)
            .with_progress_batch(100)
            .with_shutdown_flag(flag)
            .with_progress_callback(callback.clone()),
    );

    let mut emitted = 0;
    let outcome = engine.cluster(entries, |_| emitted += 1);

    assert_eq!(emitted, 0);
    match outcome {
        ScanOutcome::Cancelled { processed, total } => {
            assert_eq!(total, 10_000);
            // One worker stops after the batch whose progress report raised the flag
            assert!(processed > 0);
            assert!(processed <= 100, "processed {} entries", processed);
        }
        other => panic!("expected cancellation, got {:?}", other),
    }
    assert!(callback.calls.load(Ordering::SeqCst) >= 1);
}

#[test]
fn test_scan_store_clusters_cached_snapshot() {
    let records = Arc::new(HashCache::in_memory().unwrap());
    for (path, fp) in chain_entries() {
        records.upsert(&HashRecord::new(path, fp, 0)).unwrap();
    }
    let store = HashStore::new(records, Arc::new(StandardDecoder));

    let engine = ClusterEngine::new(ClusterConfig::default().with_threshold(5));
    let mut groups = Vec::new();
    let outcome = engine.scan_store(&store, |g| groups.push(g)).unwrap();

    // Snapshot entries are used as stored, even though none of the files exist
    assert_eq!(outcome.groups(), Some(1));
    assert_eq!(groups[0].len(), 3);
}

#[test]
fn test_background_scan_of_store() {
    let records = Arc::new(HashCache::in_memory().unwrap());
    for (path, fp) in chain_entries() {
        records.upsert(&HashRecord::new(path, fp, 0)).unwrap();
    }
    let store = HashStore::new(records, Arc::new(StandardDecoder));

    let handle = ClusterEngine::default().spawn_store(store);
    let mut saw_group = false;
    let mut finished = None;
    for event in handle.events().iter() {
        match event {
            ScanEvent::Group(group) => {
                assert_eq!(group.len(), 3);
                saw_group = true;
            }
            ScanEvent::Finished(status) => {
                finished = Some(status);
                break;
            }
            ScanEvent::Progress { .. } => {}
        }
    }

    assert!(saw_group);
    assert!(matches!(finished, Some(ScanStatus::Completed { groups: 1 })));
}
