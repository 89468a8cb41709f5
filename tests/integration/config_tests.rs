use figment::providers::Serialized;
use photodupe::cli::OutputFormat;
use photodupe::config::{Config, ConfigError};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::tempdir;

/// Serializes tests that touch `PHOTODUPE_*` environment variables.
pub static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
}

#[test]
fn test_config_load_defaults() {
    // Use figment directly without Env to avoid interference from other tests
    let figment = figment::Figment::from(Serialized::defaults(Config::default()));
    let config: Config = figment.extract().unwrap();
    assert_eq!(config.threshold, 5);
    assert_eq!(config.workers, 0);
    assert_eq!(config.output, OutputFormat::Text);
    assert!(config.extensions.contains(&"jpeg".to_string()));
}

#[test]
fn test_config_load_from_env() {
    let _guard = env_lock();
    std::env::set_var("PHOTODUPE_THRESHOLD", "9");
    std::env::set_var("PHOTODUPE_OUTPUT", "json");
    std::env::set_var("PHOTODUPE_CACHE_PATH", "/srv/hashes.db");

    let dir = tempdir().unwrap();
    let config = Config::try_load_from_path(&dir.path().join("absent.toml"));

    std::env::remove_var("PHOTODUPE_THRESHOLD");
    std::env::remove_var("PHOTODUPE_OUTPUT");
    std::env::remove_var("PHOTODUPE_CACHE_PATH");

    let config = config.unwrap();
    assert_eq!(config.threshold, 9);
    assert_eq!(config.output, OutputFormat::Json);
    assert_eq!(config.cache_path, Some(PathBuf::from("/srv/hashes.db")));
}

#[test]
fn test_config_load_from_toml() {
    let _guard = env_lock();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    let toml_content = r#"
threshold = 7
workers = 3
include_hidden = true
extensions = ["png", "webp"]
output = "csv"
"#;
    fs::write(&config_path, toml_content).unwrap();

    let config = Config::try_load_from_path(&config_path).unwrap();
    assert_eq!(config.threshold, 7);
    assert_eq!(config.workers, 3);
    assert!(config.include_hidden);
    assert_eq!(config.extensions, vec!["png", "webp"]);
    assert_eq!(config.output, OutputFormat::Csv);
    // Unset keys keep their defaults
    assert_eq!(config.progress_batch, 100);
}

#[test]
fn test_env_overrides_toml() {
    let _guard = env_lock();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "threshold = 7\n").unwrap();

    std::env::set_var("PHOTODUPE_THRESHOLD", "2");
    let config = Config::try_load_from_path(&config_path);
    std::env::remove_var("PHOTODUPE_THRESHOLD");

    assert_eq!(config.unwrap().threshold, 2);
}

#[test]
fn test_out_of_range_value_is_rejected() {
    let _guard = env_lock();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "threshold = 100\n").unwrap();

    let err = Config::try_load_from_path(&config_path).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { field: "threshold", .. }));

    // The lenient loader falls back to defaults
    assert_eq!(Config::load_from_path(&config_path), Config::default());
}

#[test]
fn test_malformed_toml_is_rejected() {
    let _guard = env_lock();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "threshold = \"lots\"\n").unwrap();

    assert!(matches!(
        Config::try_load_from_path(&config_path),
        Err(ConfigError::Figment(_))
    ));
}

#[test]
fn test_config_save_and_reload() {
    let _guard = env_lock();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("nested").join("config.toml");

    let config = Config {
        threshold: 11,
        follow_symlinks: true,
        cache_path: Some(temp_dir.path().join("hashes.db")),
        ..Config::default()
    };
    config.save_to_path(&config_path).unwrap();

    let loaded = Config::try_load_from_path(&config_path).unwrap();
    assert_eq!(loaded, config);
}
