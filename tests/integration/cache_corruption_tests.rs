use photodupe::cache::{CacheError, HashCache, HashRecord, RecordStore};
use photodupe::scanner::Fingerprint;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};

#[test]
fn test_open_corrupted_database() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path();

    // Write garbage to the file
    {
        let mut f = fs::File::create(path).unwrap();
        f.write_all(b"not a sqlite database, just some bytes that are long enough")
            .unwrap();
    }

    let res = HashCache::new(path);
    assert!(matches!(res, Err(CacheError::Sqlite(_))));
}

#[test]
fn test_recreate_after_corruption() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path();

    {
        let mut f = fs::File::create(path).unwrap();
        f.write_all(b"corrupted garbage corrupted garbage corrupted garbage")
            .unwrap();
    }
    assert!(HashCache::new(path).is_err());

    fs::remove_file(path).unwrap();
    let cache = HashCache::new(path).expect("Should succeed after deleting corrupted file");
    assert_eq!(cache.clear().unwrap(), 0);
}

#[test]
fn test_overlong_identity_is_rejected_not_truncated() {
    let cache = HashCache::in_memory().unwrap();
    let long = format!("/{}", "x".repeat(2000));
    let record = HashRecord::new(long.clone(), Fingerprint::from_bits(1), 0);

    let err = cache.upsert(&record).unwrap_err();
    assert!(matches!(err, CacheError::IdentityTooLong { .. }));
    assert!(cache.lookup(Path::new(&long)).is_err());
    assert_eq!(cache.len().unwrap(), 0);
}

#[test]
fn test_cache_in_unwritable_location_fails() {
    let dir = TempDir::new().unwrap();
    // A regular file where a parent directory is expected
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, b"").unwrap();

    let res = HashCache::new(&blocker.join("hashes.db"));
    assert!(res.is_err());
}
