// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Integration tests for the file-backed credential store

use chrono::{Duration, Utc};
use ib_credentials::{
    Error,
    config::BrokerConfig,
    storage::{
        FileStore, ensure_storage_dir, load_identity_file, save_identity_file,
        validate_permissions,
    },
    store::CredentialStore,
    test_utils,
    types::{IdentityFile, IdentityRecord, Secret, StoredIdentity},
};
use tempfile::TempDir;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

fn temp_config() -> (TempDir, BrokerConfig) {
    let temp_dir = TempDir::new().unwrap();
    let config = BrokerConfig::with_storage_path(temp_dir.path().join("credentials"));
    (temp_dir, config)
}

#[test]
fn test_file_store_lifecycle() {
    let log_path = test_utils::setup_test_logging("test_file_store_lifecycle");
    let (_temp_dir, config) = temp_config();
    let store = FileStore::new(config.clone());

    // Nothing on disk yet
    assert!(store.list_identities(&config.account_type).unwrap().is_empty());
    assert!(store.secret("alice").unwrap().is_none());

    store
        .add_identity(
            IdentityRecord::new("alice", config.account_type.as_str()),
            Secret::new("s3cr3t"),
        )
        .unwrap();
    assert!(store.path().unwrap().exists());

    // A fresh store over the same directory sees the identity
    let reopened = FileStore::new(config.clone());
    let listed = reopened.list_identities(&config.account_type).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "alice");
    assert_eq!(
        reopened.secret("alice").unwrap().unwrap().expose_secret(),
        "s3cr3t"
    );

    reopened.delete_identity("alice").unwrap();
    assert!(store.secret("alice").unwrap().is_none());
    assert!(store.list_identities(&config.account_type).unwrap().is_empty());

    // Deleting an absent identity is fine
    store.delete_identity("alice").unwrap();

    assert!(
        log_path.exists(),
        "Test log file should exist at: {}",
        log_path.display()
    );
}

#[test]
fn test_file_store_refuses_second_identity() {
    let (_temp_dir, config) = temp_config();
    let store = FileStore::new(config.clone());

    store
        .add_identity(
            IdentityRecord::new("alice", config.account_type.as_str()),
            Secret::new("one"),
        )
        .unwrap();

    let err = store
        .add_identity(
            IdentityRecord::new("bob", config.account_type.as_str()),
            Secret::new("two"),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = store
        .add_identity(
            IdentityRecord::new("alice", config.account_type.as_str()),
            Secret::new("three"),
        )
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyEnrolled(_)));

    assert_eq!(
        store.secret("alice").unwrap().unwrap().expose_secret(),
        "one"
    );
    assert!(store.secret("bob").unwrap().is_none());
}

#[test]
fn test_load_missing_file_is_empty() {
    let (_temp_dir, config) = temp_config();
    let file = load_identity_file(&config).unwrap();
    assert!(file.is_empty());
}

#[test]
fn test_corrupted_file_is_reported() {
    let (_temp_dir, config) = temp_config();
    ensure_storage_dir(&config).unwrap();
    std::fs::write(config.identities_file().unwrap(), "identities = 42\n").unwrap();

    let err = load_identity_file(&config).unwrap_err();
    assert!(matches!(err, Error::FileCorruption(_)));
}

#[test]
fn test_semantic_validation_on_load() {
    let (_temp_dir, config) = temp_config();
    ensure_storage_dir(&config).unwrap();
    std::fs::write(
        config.identities_file().unwrap(),
        r#"
[[identities]]
name = "bad name"
account-type = "dev.identity-broker.account"
created = "2025-01-01T00:00:00Z"
secret = "s3cr3t"
"#,
    )
    .unwrap();

    let err = load_identity_file(&config).unwrap_err();
    assert!(matches!(err, Error::InvalidIdentityName(_)));
}

#[test]
fn test_future_created_time_rejected_on_load() {
    let (_temp_dir, config) = temp_config();
    ensure_storage_dir(&config).unwrap();
    let created = (Utc::now() + Duration::hours(2)).to_rfc3339();
    std::fs::write(
        config.identities_file().unwrap(),
        format!(
            r#"
[[identities]]
name = "alice"
account-type = "dev.identity-broker.account"
created = "{}"
secret = "s3cr3t"
"#,
            created
        ),
    )
    .unwrap();

    let err = load_identity_file(&config).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    // The store surfaces the same failure instead of treating it as empty
    let store = FileStore::new(config.clone());
    assert!(store.list_identities(&config.account_type).is_err());
}

#[test]
fn test_empty_secret_survives_round_trip() {
    let (_temp_dir, config) = temp_config();
    let mut file = IdentityFile::new();
    file.insert(StoredIdentity::new(
        IdentityRecord::new("alice", config.account_type.as_str()),
        Secret::new(""),
    ));
    save_identity_file(&config, &file).unwrap();

    let store = FileStore::new(config);
    let secret = store.secret("alice").unwrap().unwrap();
    assert!(secret.is_empty());
}

#[cfg(unix)]
#[test]
fn test_permissions_are_owner_only() {
    let (_temp_dir, config) = temp_config();
    let store = FileStore::new(config.clone());
    store
        .add_identity(
            IdentityRecord::new("alice", config.account_type.as_str()),
            Secret::new("s3cr3t"),
        )
        .unwrap();

    let dir_mode = std::fs::metadata(config.storage_dir().unwrap())
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(dir_mode & 0o777, 0o700);

    let file_mode = std::fs::metadata(config.identities_file().unwrap())
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(file_mode & 0o777, 0o600);

    validate_permissions(&config).unwrap();
}

#[cfg(unix)]
#[test]
fn test_validate_permissions_rejects_world_readable_file() {
    let (_temp_dir, config) = temp_config();
    let store = FileStore::new(config.clone());
    store
        .add_identity(
            IdentityRecord::new("alice", config.account_type.as_str()),
            Secret::new("s3cr3t"),
        )
        .unwrap();

    let path = config.identities_file().unwrap();
    let mut permissions = std::fs::metadata(&path).unwrap().permissions();
    permissions.set_mode(0o644);
    std::fs::set_permissions(&path, permissions).unwrap();

    let err = validate_permissions(&config).unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(p) if p == path));
}

#[test]
fn test_validate_permissions_requires_directory() {
    let (_temp_dir, config) = temp_config();
    assert!(validate_permissions(&config).is_err());
}
