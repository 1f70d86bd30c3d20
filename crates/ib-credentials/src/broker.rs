// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The credential broker and the host-facing authenticator hooks

use crate::{
    config::BrokerConfig,
    enrollment::{CancelReason, EnrollmentLaunch, EnrollmentOutcome, EnrollmentResponse},
    error::{Error, Result},
    notify::{Notice, Notifier},
    store::CredentialStore,
    types::{AuthToken, IdentityRecord, Secret, TokenOutcome},
};
use std::sync::Arc;

/// Hooks a host dispatcher invokes on behalf of its callers
///
/// The host may call from any thread. Every hook is a single blocking round
/// trip to the store with no retries.
pub trait Authenticator: Send + Sync {
    /// Ask to add an identity. Cancelled when one already exists, otherwise
    /// returns the parameters for launching the enrollment flow.
    fn request_enrollment(
        &self,
        token_type: &str,
        response: EnrollmentResponse,
    ) -> Result<EnrollmentOutcome>;

    /// Asked to re-confirm credentials. The identity is removed and the answer
    /// is always `false`.
    fn confirm_identity(&self, record: &IdentityRecord) -> bool;

    /// Hand out the token for `record`
    fn get_token(&self, record: &IdentityRecord, token_type: &str) -> Result<TokenOutcome>;

    /// Human-readable label for a token type this broker serves
    fn get_token_label(&self, token_type: &str) -> Option<&str>;

    /// Optional features; none are supported
    fn has_features(&self, record: &IdentityRecord, features: &[&str]) -> bool;

    /// Not supported
    fn edit_properties(&self, account_type: &str) -> Result<()>;

    /// Not supported; identities are never updated in place
    fn update_credentials(&self, record: &IdentityRecord, token_type: &str) -> Result<()>;
}

/// Single-identity broker over a credential store
pub struct CredentialBroker {
    store: Arc<dyn CredentialStore>,
    notifier: Arc<dyn Notifier>,
    account_type: String,
    token_type: String,
    token_label: String,
}

impl CredentialBroker {
    pub fn new(
        config: &BrokerConfig,
        store: Arc<dyn CredentialStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            notifier,
            account_type: config.account_type.clone(),
            token_type: config.token_type.clone(),
            token_label: config.token_label.clone(),
        }
    }

    pub fn account_type(&self) -> &str {
        &self.account_type
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// The store identities are enrolled into
    pub fn store(&self) -> &dyn CredentialStore {
        self.store.as_ref()
    }

    /// The enrolled identity, if any
    pub fn default_identity(&self) -> Result<Option<IdentityRecord>> {
        Ok(self.store.list_identities(&self.account_type)?.into_iter().next())
    }

    pub fn default_identity_name(&self) -> Result<Option<String>> {
        Ok(self.default_identity()?.map(|record| record.name))
    }

    /// Token of the enrolled identity for this broker's own token type
    ///
    /// Failures are logged and reported as `None`.
    pub fn default_token(&self) -> Option<Secret> {
        let record = match self.default_identity() {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::error!("Default identity not found");
                return None;
            }
            Err(e) => {
                tracing::error!("Unable to look up default identity: {}", e);
                return None;
            }
        };

        match self.get_token(&record, &self.token_type) {
            Ok(outcome) => outcome.token().cloned(),
            Err(e) => {
                tracing::error!("Unable to retrieve default identity token: {}", e);
                None
            }
        }
    }

    /// Best-effort removal; store failures are logged, never returned
    fn remove_identity(&self, name: &str) {
        match self.store.delete_identity(name) {
            Ok(()) => tracing::info!(identity = name, "Removed identity"),
            Err(e) => tracing::warn!(identity = name, "Failed to remove identity: {}", e),
        }
    }
}

impl Authenticator for CredentialBroker {
    fn request_enrollment(
        &self,
        token_type: &str,
        response: EnrollmentResponse,
    ) -> Result<EnrollmentOutcome> {
        if self.default_identity()?.is_some() {
            tracing::info!("Enrollment refused: an identity is already enrolled");
            self.notifier.post(Notice::OnlyOneIdentitySupported);
            return Ok(EnrollmentOutcome::Cancelled {
                reason: CancelReason::AlreadyEnrolled,
            });
        }

        tracing::debug!(token_type, "Launching enrollment flow");
        Ok(EnrollmentOutcome::Launch(EnrollmentLaunch {
            token_type: token_type.to_string(),
            account_type: self.account_type.clone(),
            response,
        }))
    }

    fn confirm_identity(&self, record: &IdentityRecord) -> bool {
        // Credential confirmation usually means the device changed under us
        tracing::debug!(identity = %record.name, "Confirming credentials");
        self.remove_identity(&record.name);
        false
    }

    fn get_token(&self, record: &IdentityRecord, token_type: &str) -> Result<TokenOutcome> {
        if token_type != self.token_type {
            return Ok(TokenOutcome::UnsupportedType {
                requested: token_type.to_string(),
            });
        }

        match self.store.secret(&record.name)? {
            Some(secret) if !secret.is_empty() => Ok(TokenOutcome::Issued(AuthToken {
                account_name: record.name.clone(),
                account_type: self.account_type.clone(),
                token: secret,
            })),
            _ => {
                tracing::warn!(identity = %record.name, "Token not found, removing identity");
                self.remove_identity(&record.name);
                Ok(TokenOutcome::NotConfirmed)
            }
        }
    }

    fn get_token_label(&self, token_type: &str) -> Option<&str> {
        (token_type == self.token_type).then_some(self.token_label.as_str())
    }

    fn has_features(&self, _record: &IdentityRecord, _features: &[&str]) -> bool {
        false
    }

    fn edit_properties(&self, _account_type: &str) -> Result<()> {
        Err(Error::UnsupportedOperation("edit_properties"))
    }

    fn update_credentials(&self, _record: &IdentityRecord, _token_type: &str) -> Result<()> {
        Err(Error::UnsupportedOperation("update_credentials"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrollment::enrollment_channel;
    use crate::store::MockCredentialStore;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        posted: Mutex<Vec<Notice>>,
    }

    impl Notifier for RecordingNotifier {
        fn post(&self, notice: Notice) {
            self.posted.lock().unwrap().push(notice);
        }
    }

    fn config() -> BrokerConfig {
        BrokerConfig {
            account_type: "test.account".to_string(),
            token_type: "test.token".to_string(),
            token_label: "Test".to_string(),
            ..BrokerConfig::default()
        }
    }

    fn broker(store: MockCredentialStore) -> (CredentialBroker, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let broker = CredentialBroker::new(&config(), Arc::new(store), notifier.clone());
        (broker, notifier)
    }

    fn alice() -> IdentityRecord {
        IdentityRecord::new("alice", "test.account")
    }

    #[test]
    fn test_unsupported_token_type_never_touches_store() {
        let mut store = MockCredentialStore::new();
        store.expect_secret().never();
        store.expect_delete_identity().never();
        store.expect_list_identities().never();
        let (broker, _) = broker(store);

        let outcome = broker.get_token(&alice(), "other.token").unwrap();
        assert_eq!(
            outcome,
            TokenOutcome::UnsupportedType {
                requested: "other.token".to_string()
            }
        );
    }

    #[test]
    fn test_get_token_returns_secret_as_token() {
        let mut store = MockCredentialStore::new();
        store
            .expect_secret()
            .withf(|name| name == "alice")
            .times(1)
            .returning(|_| Ok(Some(Secret::new("s3cr3t"))));
        store.expect_delete_identity().never();
        let (broker, _) = broker(store);

        let outcome = broker.get_token(&alice(), "test.token").unwrap();
        assert_eq!(
            outcome,
            TokenOutcome::Issued(AuthToken {
                account_name: "alice".to_string(),
                account_type: "test.account".to_string(),
                token: Secret::new("s3cr3t"),
            })
        );
    }

    #[test]
    fn test_empty_secret_removes_identity_even_if_delete_fails() {
        let mut store = MockCredentialStore::new();
        store
            .expect_secret()
            .returning(|_| Ok(Some(Secret::new(""))));
        store
            .expect_delete_identity()
            .withf(|name| name == "alice")
            .times(1)
            .returning(|_| Err(Error::Store("disk full".to_string())));
        let (broker, _) = broker(store);

        let outcome = broker.get_token(&alice(), "test.token").unwrap();
        assert_eq!(outcome, TokenOutcome::NotConfirmed);
    }

    #[test]
    fn test_secret_read_failure_propagates() {
        let mut store = MockCredentialStore::new();
        store
            .expect_secret()
            .returning(|_| Err(Error::Store("unavailable".to_string())));
        store.expect_delete_identity().never();
        let (broker, _) = broker(store);

        assert!(matches!(
            broker.get_token(&alice(), "test.token"),
            Err(Error::Store(_))
        ));
    }

    #[test]
    fn test_confirm_identity_swallows_delete_failure() {
        let mut store = MockCredentialStore::new();
        store
            .expect_delete_identity()
            .times(1)
            .returning(|_| Err(Error::Store("read-only".to_string())));
        let (broker, _) = broker(store);

        assert!(!broker.confirm_identity(&alice()));
    }

    #[test]
    fn test_request_enrollment_when_enrolled_notifies_once() {
        let mut store = MockCredentialStore::new();
        store
            .expect_list_identities()
            .withf(|account_type| account_type == "test.account")
            .returning(|_| Ok(vec![IdentityRecord::new("alice", "test.account")]));
        store.expect_add_identity().never();
        store.expect_delete_identity().never();
        let (broker, notifier) = broker(store);

        let (response, mut completion) = enrollment_channel();
        let outcome = broker.request_enrollment("test.token", response).unwrap();

        assert!(matches!(
            outcome,
            EnrollmentOutcome::Cancelled {
                reason: CancelReason::AlreadyEnrolled
            }
        ));
        assert_eq!(
            *notifier.posted.lock().unwrap(),
            vec![Notice::OnlyOneIdentitySupported]
        );
        assert_eq!(
            completion.try_result(),
            Some(crate::enrollment::EnrollmentResult::Cancelled)
        );
    }

    #[test]
    fn test_request_enrollment_when_absent_launches() {
        let mut store = MockCredentialStore::new();
        store.expect_list_identities().returning(|_| Ok(Vec::new()));
        store.expect_add_identity().never();
        store.expect_delete_identity().never();
        let (broker, notifier) = broker(store);

        let (response, _completion) = enrollment_channel();
        match broker.request_enrollment("test.token", response).unwrap() {
            EnrollmentOutcome::Launch(launch) => {
                assert_eq!(launch.token_type, "test.token");
                assert_eq!(launch.account_type, "test.account");
            }
            other => panic!("expected launch, got {:?}", other),
        }
        assert!(notifier.posted.lock().unwrap().is_empty());
    }

    #[test]
    fn test_labels_and_features() {
        let mut store = MockCredentialStore::new();
        store.expect_secret().never();
        store.expect_list_identities().never();
        let (broker, _) = broker(store);

        assert_eq!(broker.get_token_label("test.token"), Some("Test"));
        assert_eq!(broker.get_token_label(""), None);
        assert_eq!(broker.get_token_label("TEST.TOKEN"), None);
        assert!(!broker.has_features(&alice(), &[]));
        assert!(!broker.has_features(&alice(), &["sync", "push"]));
    }

    #[test]
    fn test_unsupported_operations_abort() {
        let mut store = MockCredentialStore::new();
        store.expect_secret().never();
        store.expect_delete_identity().never();
        store.expect_list_identities().never();
        store.expect_add_identity().never();
        let (broker, _) = broker(store);

        assert!(matches!(
            broker.edit_properties("test.account"),
            Err(Error::UnsupportedOperation("edit_properties"))
        ));
        assert!(matches!(
            broker.update_credentials(&alice(), "test.token"),
            Err(Error::UnsupportedOperation("update_credentials"))
        ));
    }

    #[test]
    fn test_default_token_without_identity() {
        let mut store = MockCredentialStore::new();
        store.expect_list_identities().returning(|_| Ok(Vec::new()));
        store.expect_secret().never();
        let (broker, _) = broker(store);

        assert!(broker.default_token().is_none());
        assert_eq!(broker.default_identity_name().unwrap(), None);
    }
}
