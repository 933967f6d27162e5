//! Configuration resolution tests
//!
//! Note: uses serial_test to prevent ENV variable race conditions. Tests
//! that manipulate KARAT_* variables are marked #[serial] so they run
//! sequentially, not in parallel.

use std::env;
use std::path::PathBuf;

use serial_test::serial;

use karat_common::config::{
    resolve, Overrides, DEFAULT_ERROR_TTL_SECS, DEFAULT_SIZE_THRESHOLD, DEFAULT_SUCCESS_TTL_SECS,
};
use karat_common::model::{Appraisal, ProjectRef, ERROR_TYPE_CLONE_FAILED};

fn clear_env() {
    for var in [
        "KARAT_CONFIG",
        "KARAT_DATABASE",
        "KARAT_LISTEN",
        "KARAT_CLONE_ROOT",
        "KARAT_WORKER_SLOTS",
        "KARAT_SIZE_THRESHOLD",
        "KARAT_SUCCESS_TTL_SECS",
        "KARAT_ERROR_TTL_SECS",
        "KARAT_ANALYZER",
        "KARAT_POLL_INTERVAL_MS",
        "KARAT_VISIBILITY_TIMEOUT_SECS",
    ] {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn defaults_match_policy_values() {
    clear_env();
    let settings = resolve(&Overrides::default()).unwrap();

    assert_eq!(settings.size_threshold, DEFAULT_SIZE_THRESHOLD);
    assert_eq!(settings.success_ttl_secs, DEFAULT_SUCCESS_TTL_SECS);
    assert_eq!(settings.error_ttl_secs, DEFAULT_ERROR_TTL_SECS);
    assert_eq!(settings.listen_addr, "127.0.0.1:5780");
    assert!(settings.worker_slots >= 1);
}

#[test]
#[serial]
fn env_overrides_default() {
    clear_env();
    env::set_var("KARAT_DATABASE", "/tmp/karat-test.db");
    env::set_var("KARAT_WORKER_SLOTS", "7");

    let settings = resolve(&Overrides::default()).unwrap();
    assert_eq!(settings.database_path, PathBuf::from("/tmp/karat-test.db"));
    assert_eq!(settings.worker_slots, 7);

    clear_env();
}

#[test]
#[serial]
fn cli_override_beats_env() {
    clear_env();
    env::set_var("KARAT_DATABASE", "/tmp/from-env.db");

    let overrides = Overrides {
        database_path: Some(PathBuf::from("/tmp/from-cli.db")),
        ..Overrides::default()
    };
    let settings = resolve(&overrides).unwrap();
    assert_eq!(settings.database_path, PathBuf::from("/tmp/from-cli.db"));

    clear_env();
}

#[test]
#[serial]
fn toml_file_feeds_unset_fields() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        "listen_addr = \"0.0.0.0:9999\"\nsize_threshold = 42\n",
    )
    .unwrap();
    env::set_var("KARAT_CONFIG", &config_path);

    let settings = resolve(&Overrides::default()).unwrap();
    assert_eq!(settings.listen_addr, "0.0.0.0:9999");
    assert_eq!(settings.size_threshold, 42);

    clear_env();
}

#[test]
#[serial]
fn malformed_toml_is_ignored() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    std::fs::write(&config_path, "listen_addr = [not toml").unwrap();
    env::set_var("KARAT_CONFIG", &config_path);

    let settings = resolve(&Overrides::default()).unwrap();
    assert_eq!(settings.listen_addr, "127.0.0.1:5780");

    clear_env();
}

#[test]
#[serial]
fn zero_worker_slots_is_rejected() {
    clear_env();
    let overrides = Overrides {
        worker_slots: Some(0),
        ..Overrides::default()
    };
    assert!(resolve(&overrides).is_err());
}

#[test]
#[serial]
fn ttl_is_a_pure_function_of_status() {
    clear_env();
    let settings = resolve(&Overrides::default()).unwrap();
    let project = ProjectRef::new("octocat", "hello");

    let failure = Appraisal::error(project.clone(), ERROR_TYPE_CLONE_FAILED, "boom");
    assert_eq!(settings.ttl_for(&failure), 10);

    let tree = karat_common::model::FolderNode {
        path: String::new(),
        line_count: 0,
        total_credits: 0.0,
        credit_share: Default::default(),
        base_files: vec![],
        subfolders: vec![],
        contributors: vec![],
    };
    let success = Appraisal::ok(project, tree);
    assert_eq!(settings.ttl_for(&success), 86_400);
}
