use image::{GrayImage, Luma};
use photodupe::cache::{HashCache, HashRecord, HashStore, RecordStore, WarmOptions};
use photodupe::duplicates::SimilarityLookup;
use photodupe::scanner::{Fingerprint, StandardDecoder};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const BASE: u64 = 0xF0F0_F0F0_F0F0_F0F0;

fn save_pattern(path: &Path, bits: u64) {
    GrayImage::from_fn(8, 8, |x, y| {
        let shift = 63 - (y * 8 + x);
        Luma([if (bits >> shift) & 1 == 1 { 255 } else { 0 }])
    })
    .save(path)
    .unwrap();
}

struct Fixture {
    _dir: TempDir,
    records: Arc<HashCache>,
    store: HashStore,
    target: PathBuf,
    near: PathBuf,
    far: PathBuf,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("target.png");
    let near = dir.path().join("near.png");
    let far = dir.path().join("far.png");
    save_pattern(&target, BASE);
    save_pattern(&near, BASE ^ 0b11);
    save_pattern(&far, BASE ^ (0b11_1111 << 8));

    let records = Arc::new(HashCache::in_memory().unwrap());
    let store = HashStore::new(records.clone(), Arc::new(StandardDecoder));
    store
        .warm(&[target.clone(), near.clone(), far.clone()], &WarmOptions::default())
        .unwrap();

    Fixture {
        _dir: dir,
        records,
        store,
        target,
        near,
        far,
    }
}

#[test]
fn test_lookup_excludes_target_and_respects_threshold() {
    let f = fixture();

    let matches = SimilarityLookup::new(&f.store)
        .with_threshold(5)
        .find(&f.target)
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].path, f.near);
    assert_eq!(matches[0].distance, 2);

    let matches = SimilarityLookup::new(&f.store)
        .with_threshold(6)
        .find(&f.target)
        .unwrap();
    let found: Vec<_> = matches.iter().map(|m| (m.path.clone(), m.distance)).collect();
    assert_eq!(found, vec![(f.near.clone(), 2), (f.far.clone(), 6)]);
}

#[test]
fn test_lookup_skips_entries_for_deleted_files() {
    let f = fixture();
    f.records
        .upsert(&HashRecord::new(
            "/nonexistent/ghost.png",
            Fingerprint::from_bits(BASE),
            0,
        ))
        .unwrap();

    let matches = SimilarityLookup::new(&f.store).find(&f.target).unwrap();
    assert!(matches.iter().all(|m| m.path != Path::new("/nonexistent/ghost.png")));
    assert_eq!(matches.len(), 1);
}

#[test]
fn test_lookup_is_not_transitive() {
    let f = fixture();
    // One step from `near`, three from `target`
    let chained = f.target.with_file_name("chained.png");
    save_pattern(&chained, BASE ^ 0b11 ^ (0b1 << 20));
    f.store.get(&chained).unwrap();

    let matches = SimilarityLookup::new(&f.store)
        .with_threshold(2)
        .find(&f.target)
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].path, f.near);
}

#[test]
fn test_uncached_target_is_fingerprinted_and_cached() {
    let f = fixture();
    let fresh = f.target.with_file_name("fresh.png");
    save_pattern(&fresh, BASE ^ 0b1);
    assert_eq!(f.store.len().unwrap(), 3);

    let matches = SimilarityLookup::new(&f.store).find(&fresh).unwrap();
    assert_eq!(f.store.len().unwrap(), 4);

    let found: Vec<_> = matches.iter().map(|m| (m.path.clone(), m.distance)).collect();
    assert_eq!(found, vec![(f.near.clone(), 1), (f.target.clone(), 1)]);
}

#[test]
fn test_lookup_of_missing_target_fails() {
    let f = fixture();
    let missing = f.target.with_file_name("missing.png");
    let err = SimilarityLookup::new(&f.store).find(&missing).unwrap_err();
    assert!(err.is_decode());
}
