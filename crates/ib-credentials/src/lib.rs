// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Library-first crate for a single-identity credential broker.
//!
//! This crate provides:
//! - The [`CredentialBroker`] behind the host-facing [`Authenticator`] hooks
//! - A [`CredentialStore`] trait with in-memory and TOML file implementations
//! - A fire-and-forget notice channel for user-facing messages
//! - The launch contract handed to an external enrollment flow
//! - Configuration and validation for identity names and stored files

pub mod broker;
pub mod config;
pub mod enrollment;
pub mod error;
pub mod notify;
pub mod storage;
pub mod store;
pub mod types;
pub mod validation;

/// Re-export key types for convenience
pub use broker::{Authenticator, CredentialBroker};
pub use config::BrokerConfig;
pub use enrollment::{
    CancelReason, EnrollmentCompletion, EnrollmentLaunch, EnrollmentOutcome, EnrollmentResponse,
    EnrollmentResult, enrollment_channel,
};
pub use error::{Error, Result};
pub use notify::{ChannelNotifier, Notice, NoticeReceiver, Notifier, notice_channel};
pub use storage::FileStore;
pub use store::{CredentialStore, MemoryStore};
pub use types::{AuthToken, IdentityRecord, Secret, TokenOutcome};

/// Test utilities for logging and fixtures
pub mod test_utils {
    use std::path::PathBuf;
    use std::sync::OnceLock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static TEST_LOG_COUNTER: AtomicUsize = AtomicUsize::new(0);
    static TEST_LOG_DIR: OnceLock<PathBuf> = OnceLock::new();

    /// Get the path for a test log file
    pub fn test_log_path(test_name: &str) -> PathBuf {
        let counter = TEST_LOG_COUNTER.fetch_add(1, Ordering::SeqCst);
        let log_dir =
            TEST_LOG_DIR.get_or_init(|| std::env::temp_dir().join("ib-credentials-test-logs"));

        std::fs::create_dir_all(log_dir).unwrap();

        log_dir.join(format!("test-{}-{}.log", test_name, counter))
    }

    /// Setup test logging for a test and return the log path
    pub fn setup_test_logging(test_name: &str) -> PathBuf {
        let log_path = test_log_path(test_name);

        if let Err(e) = std::fs::write(&log_path, format!("Starting test: {}\n", test_name)) {
            tracing::warn!(
                "Failed to write to test log file {}: {}",
                log_path.display(),
                e
            );
        }

        log_path
    }
}
