// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Test fixtures for the credential broker

use crate::doubles::{CountingStore, RecordingNotifier};
use ib_credentials::{
    BrokerConfig, CredentialBroker, CredentialStore, FileStore, IdentityRecord, MemoryStore,
    Secret,
};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub const TEST_ACCOUNT_TYPE: &str = "test.identity-broker.account";
pub const TEST_TOKEN_TYPE: &str = "test.identity-broker.token";
pub const TEST_TOKEN_LABEL: &str = "Test Broker";

/// Broker configuration with test constants, rooted at `storage_path`
pub fn test_config(storage_path: PathBuf) -> BrokerConfig {
    BrokerConfig {
        account_type: TEST_ACCOUNT_TYPE.to_string(),
        token_type: TEST_TOKEN_TYPE.to_string(),
        token_label: TEST_TOKEN_LABEL.to_string(),
        ..BrokerConfig::with_storage_path(storage_path)
    }
}

/// Broker wired to a counting store and a recording notifier
pub struct BrokerFixture<S> {
    pub config: BrokerConfig,
    pub store: Arc<CountingStore<S>>,
    pub notifier: Arc<RecordingNotifier>,
    pub broker: CredentialBroker,
    // Keeps the storage directory alive for file-backed fixtures
    _temp_dir: Option<TempDir>,
}

impl<S: CredentialStore + 'static> BrokerFixture<S> {
    fn build(config: BrokerConfig, inner: S, temp_dir: Option<TempDir>) -> Self {
        let store = Arc::new(CountingStore::new(inner));
        let notifier = Arc::new(RecordingNotifier::new());
        let broker = CredentialBroker::new(&config, store.clone(), notifier.clone());
        Self {
            config,
            store,
            notifier,
            broker,
            _temp_dir: temp_dir,
        }
    }

    /// Record for `name` with the fixture's account type
    pub fn record(&self, name: &str) -> IdentityRecord {
        IdentityRecord::new(name, self.config.account_type.as_str())
    }
}

impl BrokerFixture<MemoryStore> {
    /// Fixture over an empty in-memory store
    pub fn in_memory() -> Self {
        let config = test_config(std::env::temp_dir().join("ib-unused-storage"));
        Self::build(config, MemoryStore::new(), None)
    }

    /// Fixture over an in-memory store that already holds `name`
    pub fn enrolled(name: &str, secret: &str) -> Self {
        let config = test_config(std::env::temp_dir().join("ib-unused-storage"));
        let inner = MemoryStore::with_identity(
            IdentityRecord::new(name, TEST_ACCOUNT_TYPE),
            Secret::new(secret),
        );
        Self::build(config, inner, None)
    }
}

impl BrokerFixture<FileStore> {
    /// Fixture over a file store in a fresh temporary directory
    pub fn on_disk() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = test_config(temp_dir.path().join("credentials"));
        let inner = FileStore::new(config.clone());
        Self::build(config, inner, Some(temp_dir))
    }
}
