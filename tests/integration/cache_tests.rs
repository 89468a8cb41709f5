use filetime::FileTime;
use image::{GrayImage, Luma};
use photodupe::cache::{CacheStatus, HashCache, HashStore, WarmOptions};
use photodupe::scanner::StandardDecoder;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn save_pattern(path: &Path, bits: u64) {
    GrayImage::from_fn(8, 8, |x, y| {
        let shift = 63 - (y * 8 + x);
        Luma([if (bits >> shift) & 1 == 1 { 255 } else { 0 }])
    })
    .save(path)
    .unwrap();
}

fn open_store(db: &Path) -> HashStore {
    HashStore::new(
        Arc::new(HashCache::new(db).unwrap()),
        Arc::new(StandardDecoder),
    )
}

#[test]
fn test_fingerprints_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("cache").join("hashes.db");
    let img = dir.path().join("a.png");
    save_pattern(&img, 0xF0F0_F0F0_F0F0_F0F0);

    {
        let store = open_store(&db);
        let fetched = store.fetch(&img).unwrap();
        assert_eq!(fetched.status, CacheStatus::Recomputed);
        assert_eq!(fetched.fingerprint.bits(), 0xF0F0_F0F0_F0F0_F0F0);
    }

    let store = open_store(&db);
    let fetched = store.fetch(&img).unwrap();
    assert_eq!(fetched.status, CacheStatus::Hit);
    assert_eq!(fetched.fingerprint.bits(), 0xF0F0_F0F0_F0F0_F0F0);
    assert_eq!(store.len().unwrap(), 1);
}

#[test]
fn test_touched_file_is_recomputed_after_reopen() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("hashes.db");
    let img = dir.path().join("a.png");
    save_pattern(&img, 0x00FF_00FF_00FF_00FF);

    open_store(&db).get(&img).unwrap();

    // Rewrite with different content and a distinct timestamp
    save_pattern(&img, 0xFF00_FF00_FF00_FF00);
    filetime::set_file_mtime(&img, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();

    let store = open_store(&db);
    let fetched = store.fetch(&img).unwrap();
    assert_eq!(fetched.status, CacheStatus::Recomputed);
    assert_eq!(fetched.fingerprint.bits(), 0xFF00_FF00_FF00_FF00);
    assert_eq!(store.len().unwrap(), 1);
}

#[test]
fn test_warm_then_get_all() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("hashes.db");
    let a = dir.path().join("a.png");
    let b = dir.path().join("b.png");
    let broken = dir.path().join("broken.png");
    save_pattern(&a, 0x1234_5678_9ABC_DEF0);
    save_pattern(&b, 0x0FED_CBA9_8765_4321);
    std::fs::write(&broken, b"not a png").unwrap();

    let store = open_store(&db);
    let paths = vec![a.clone(), b.clone(), broken.clone()];
    let summary = store.warm(&paths, &WarmOptions::default()).unwrap();

    assert_eq!(summary.recomputed, 2);
    assert_eq!(summary.failed, vec![broken]);
    assert!(!summary.interrupted);

    let all = store.get_all().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].0, a);
    assert_eq!(all[1].0, b);

    let again = store.warm(&paths, &WarmOptions::default()).unwrap();
    assert_eq!(again.hits, 2);
    assert_eq!(again.recomputed, 0);
}

#[test]
fn test_prune_after_delete() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("hashes.db");
    let keep = dir.path().join("keep.png");
    let gone = dir.path().join("gone.png");
    save_pattern(&keep, 0xAAAA_AAAA_AAAA_AAAA);
    save_pattern(&gone, 0x5555_5555_5555_5555);

    let store = open_store(&db);
    store.get(&keep).unwrap();
    store.get(&gone).unwrap();
    std::fs::remove_file(&gone).unwrap();

    // get_all reports stored records as-is
    assert_eq!(store.get_all().unwrap().len(), 2);

    assert_eq!(store.prune_missing().unwrap(), 1);
    let remaining = store.get_all().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].0, keep);
    assert_eq!(remaining[0].1.bits(), 0xAAAA_AAAA_AAAA_AAAA);
    assert_eq!(store.clear().unwrap(), 1);
    assert!(store.is_empty().unwrap());
}
