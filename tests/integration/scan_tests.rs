use clap::Parser;
use image::{GrayImage, Luma};
use photodupe::cache::{HashCache, RecordStore};
use photodupe::cli::Cli;
use photodupe::error::ExitCode;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::config_tests::ENV_MUTEX;

const BASE: u64 = 0x0F0F_0F0F_F0F0_F0F0;

fn save_pattern(path: &Path, bits: u64) {
    GrayImage::from_fn(8, 8, |x, y| {
        let shift = 63 - (y * 8 + x);
        Luma([if (bits >> shift) & 1 == 1 { 255 } else { 0 }])
    })
    .save(path)
    .unwrap();
}

struct Workspace {
    photos: TempDir,
    state: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            photos: tempfile::Builder::new().prefix("photos").tempdir().unwrap(),
            state: tempfile::Builder::new().prefix("state").tempdir().unwrap(),
        }
    }

    fn photo(&self, name: &str, bits: u64) -> PathBuf {
        let path = self.photos.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        save_pattern(&path, bits);
        path
    }

    fn db(&self) -> PathBuf {
        self.state.path().join("hashes.db")
    }

    fn run(&self, args: &[&str]) -> anyhow::Result<ExitCode> {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let db = self.db();
        let config = self.state.path().join("config.toml");
        let mut argv = vec![
            "photodupe",
            "-q",
            "--no-color",
            "--cache",
            db.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
        ];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv).unwrap();
        photodupe::run_app(cli)
    }

    fn scan(&self, extra: &[&str]) -> anyhow::Result<ExitCode> {
        let root = self.photos.path().to_str().unwrap().to_string();
        let mut args = vec!["scan", root.as_str(), "-o", "json"];
        args.extend_from_slice(extra);
        self.run(&args)
    }
}

#[test]
fn test_scan_finds_duplicates_and_fills_cache() {
    let ws = Workspace::new();
    ws.photo("a.png", BASE);
    ws.photo("nested/b.png", BASE ^ 0b101);
    ws.photo("c.png", !BASE);

    assert_eq!(ws.scan(&[]).unwrap(), ExitCode::Success);

    let cache = HashCache::new(&ws.db()).unwrap();
    assert_eq!(cache.len().unwrap(), 3);

    // Second run is served from the cache and reaches the same verdict
    assert_eq!(ws.scan(&[]).unwrap(), ExitCode::Success);
    assert_eq!(cache.len().unwrap(), 3);
}

#[test]
fn test_scan_without_duplicates() {
    let ws = Workspace::new();
    ws.photo("a.png", BASE);
    ws.photo("b.png", !BASE);

    assert_eq!(ws.scan(&[]).unwrap(), ExitCode::NoDuplicates);
}

#[test]
fn test_scan_threshold_flag() {
    let ws = Workspace::new();
    ws.photo("a.png", BASE);
    ws.photo("b.png", BASE ^ 0b1111);

    assert_eq!(ws.scan(&["-t", "3"]).unwrap(), ExitCode::NoDuplicates);
    assert_eq!(ws.scan(&["-t", "4"]).unwrap(), ExitCode::Success);
}

#[test]
fn test_undecodable_file_gives_partial_success() {
    let ws = Workspace::new();
    ws.photo("a.png", BASE);
    ws.photo("b.png", BASE);
    std::fs::write(ws.photos.path().join("broken.jpg"), b"garbage").unwrap();

    let root = ws.photos.path().to_str().unwrap();
    assert_eq!(
        ws.run(&["scan", root, "-o", "csv"]).unwrap(),
        ExitCode::PartialSuccess
    );
}

#[test]
fn test_scan_missing_directory_is_an_error() {
    let ws = Workspace::new();
    let missing = ws.photos.path().join("does-not-exist");
    let result = ws.run(&["scan", missing.to_str().unwrap()]);
    assert!(result.is_err());
}

#[test]
fn test_whole_cache_scan_includes_earlier_roots() {
    let first = Workspace::new();
    first.photo("a.png", BASE);
    assert_eq!(first.scan(&[]).unwrap(), ExitCode::NoDuplicates);

    // A different directory sharing the same cache database
    let other = tempfile::Builder::new().prefix("more").tempdir().unwrap();
    save_pattern(&other.path().join("copy.png"), BASE ^ 0b1);
    let root = other.path().to_str().unwrap();

    assert_eq!(first.run(&["scan", root]).unwrap(), ExitCode::NoDuplicates);
    assert_eq!(
        first.run(&["scan", root, "--whole-cache"]).unwrap(),
        ExitCode::Success
    );
}

#[test]
fn test_similar_and_cache_commands() {
    let ws = Workspace::new();
    let a = ws.photo("a.png", BASE);
    let b = ws.photo("b.png", BASE ^ 0b11);
    ws.scan(&[]).unwrap();

    let a_str = a.to_str().unwrap();
    assert_eq!(ws.run(&["similar", a_str]).unwrap(), ExitCode::Success);
    assert_eq!(
        ws.run(&["similar", a_str, "-t", "1", "-o", "json"]).unwrap(),
        ExitCode::NoDuplicates
    );

    assert_eq!(ws.run(&["cache", "stats"]).unwrap(), ExitCode::Success);

    std::fs::remove_file(&b).unwrap();
    assert_eq!(ws.run(&["cache", "prune"]).unwrap(), ExitCode::Success);
    assert_eq!(HashCache::new(&ws.db()).unwrap().len().unwrap(), 1);

    assert_eq!(ws.run(&["cache", "clear"]).unwrap(), ExitCode::Success);
    assert_eq!(HashCache::new(&ws.db()).unwrap().len().unwrap(), 0);
}

#[test]
fn test_no_cache_leaves_no_database() {
    let ws = Workspace::new();
    ws.photo("a.png", BASE);
    ws.photo("b.png", BASE);
    let root = ws.photos.path().to_str().unwrap();
    let config = ws.state.path().join("config.toml");

    let cli = Cli::try_parse_from([
        "photodupe",
        "-q",
        "--no-cache",
        "--config",
        config.to_str().unwrap(),
        "scan",
        root,
    ])
    .unwrap();
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    assert_eq!(photodupe::run_app(cli).unwrap(), ExitCode::Success);
    assert!(!ws.db().exists());
}
