// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Recording doubles for the broker's collaborators

use ib_credentials::{CredentialStore, IdentityRecord, Notice, Notifier, Result, Secret};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Store wrapper that counts every call before delegating
#[derive(Debug, Default)]
pub struct CountingStore<S> {
    inner: S,
    secret_reads: AtomicUsize,
    deletes: AtomicUsize,
    listings: AtomicUsize,
    additions: AtomicUsize,
}

impl<S: CredentialStore> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            secret_reads: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            listings: AtomicUsize::new(0),
            additions: AtomicUsize::new(0),
        }
    }

    pub fn secret_reads(&self) -> usize {
        self.secret_reads.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }

    pub fn additions(&self) -> usize {
        self.additions.load(Ordering::SeqCst)
    }

    /// Calls of any kind
    pub fn total_accesses(&self) -> usize {
        self.secret_reads() + self.deletes() + self.listings() + self.additions()
    }

    /// Calls that change stored state
    pub fn mutations(&self) -> usize {
        self.deletes() + self.additions()
    }
}

impl<S: CredentialStore> CredentialStore for CountingStore<S> {
    fn secret(&self, name: &str) -> Result<Option<Secret>> {
        self.secret_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.secret(name)
    }

    fn delete_identity(&self, name: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_identity(name)
    }

    fn list_identities(&self, account_type: &str) -> Result<Vec<IdentityRecord>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        self.inner.list_identities(account_type)
    }

    fn add_identity(&self, record: IdentityRecord, secret: Secret) -> Result<()> {
        self.additions.fetch_add(1, Ordering::SeqCst);
        self.inner.add_identity(record, secret)
    }
}

/// Notifier that keeps every posted notice instead of displaying it
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    posted: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn posted(&self) -> Vec<Notice> {
        self.posted.lock().map(|posted| posted.clone()).unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn post(&self, notice: Notice) {
        if let Ok(mut posted) = self.posted.lock() {
            posted.push(notice);
        }
    }
}
