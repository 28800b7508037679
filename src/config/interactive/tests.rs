use super::load_existing_config as load_existing_config_impl;
use super::*;
use crate::config::settings::HOME_ENV_VAR;
use serial_test::serial;
use tempfile::TempDir;

#[test]
#[serial]
fn load_existing_config() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut saved = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    saved.ollama.host = "embedding-host".to_string();
    saved.save().expect("should save config");

    // SAFETY: serialised with every other test that touches the environment
    unsafe { std::env::set_var(HOME_ENV_VAR, temp_dir.path()) };
    let config = load_existing_config_impl();
    // SAFETY: as above
    unsafe { std::env::remove_var(HOME_ENV_VAR) };

    let config = config.expect("config loaded successfully");
    assert_eq!(config.ollama.host, "embedding-host");
    assert_eq!(config.base_dir, temp_dir.path());
}

#[test]
#[serial]
fn missing_config_falls_back_to_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    // SAFETY: serialised with every other test that touches the environment
    unsafe { std::env::set_var(HOME_ENV_VAR, temp_dir.path()) };
    let config = load_existing_config_impl();
    // SAFETY: as above
    unsafe { std::env::remove_var(HOME_ENV_VAR) };

    let config = config.expect("defaults loaded successfully");
    assert_eq!(config.ollama, OllamaConfig::default());
    assert_eq!(config.base_dir, temp_dir.path());
}

#[test]
fn path_prompt_validation() {
    assert!(non_empty_path("data/papers.csv").is_ok());
    assert!(non_empty_path("   ").is_err());
}
