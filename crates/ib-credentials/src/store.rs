// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Credential store interface and an in-memory implementation

use crate::{
    error::{Error, Result},
    types::{IdentityFile, IdentityRecord, Secret, StoredIdentity},
};
use std::sync::{Mutex, MutexGuard};

/// Durable persistence for identity records
///
/// Calls are synchronous and blocking. Implementations serialize access to
/// their records; the broker performs no locking of its own.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialStore: Send + Sync {
    /// Secret stored for `name`, or `None` if there is no such identity
    fn secret(&self, name: &str) -> Result<Option<Secret>>;

    /// Remove the identity. Removing an absent identity is not an error.
    fn delete_identity(&self, name: &str) -> Result<()>;

    /// All identities with the given account type
    fn list_identities(&self, account_type: &str) -> Result<Vec<IdentityRecord>>;

    /// Persist a newly enrolled identity
    fn add_identity(&self, record: IdentityRecord, secret: Secret) -> Result<()>;
}

/// Process-local store backed by a mutex-guarded identity list
#[derive(Debug, Default)]
pub struct MemoryStore {
    identities: Mutex<IdentityFile>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with one identity
    pub fn with_identity(record: IdentityRecord, secret: Secret) -> Self {
        let mut file = IdentityFile::new();
        file.insert(StoredIdentity::new(record, secret));
        Self {
            identities: Mutex::new(file),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, IdentityFile>> {
        self.identities
            .lock()
            .map_err(|_| Error::Store("memory store lock poisoned".to_string()))
    }
}

impl CredentialStore for MemoryStore {
    fn secret(&self, name: &str) -> Result<Option<Secret>> {
        Ok(self.lock()?.find(name).map(|identity| identity.secret.clone()))
    }

    fn delete_identity(&self, name: &str) -> Result<()> {
        self.lock()?.remove(name);
        Ok(())
    }

    fn list_identities(&self, account_type: &str) -> Result<Vec<IdentityRecord>> {
        Ok(self.lock()?.records_of_type(account_type))
    }

    fn add_identity(&self, record: IdentityRecord, secret: Secret) -> Result<()> {
        let mut identities = self.lock()?;
        if identities.find(&record.name).is_some() {
            return Err(Error::AlreadyEnrolled(record.name));
        }
        // At most one identity per account type
        if let Some(existing) = identities
            .records_of_type(&record.account_type)
            .into_iter()
            .next()
        {
            return Err(Error::AlreadyEnrolled(existing.name));
        }
        identities.insert(StoredIdentity::new(record, secret));
        Ok(())
    }
}
