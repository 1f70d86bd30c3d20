// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Core types for the credential broker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A password-equivalent secret.
///
/// The stored secret doubles as the bearer token handed out by the broker, so
/// the value is wiped from memory on drop and never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw secret value
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl ZeroizeOnDrop for Secret {}

/// The identity an application is logged in as
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct IdentityRecord {
    /// Identity name (e.g. a user handle or phone number)
    pub name: String,

    /// Account type constant of the broker that owns this identity
    pub account_type: String,

    /// When this identity was enrolled (ISO 8601 string)
    #[schemars(with = "String")]
    pub created: DateTime<Utc>,
}

impl IdentityRecord {
    pub fn new(name: impl Into<String>, account_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            account_type: account_type.into(),
            created: Utc::now(),
        }
    }
}

/// An identity together with its secret, as persisted by a store
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct StoredIdentity {
    pub name: String,
    pub account_type: String,
    #[schemars(with = "String")]
    pub created: DateTime<Utc>,
    /// May be empty when the enrollment flow was interrupted
    #[serde(default = "empty_secret")]
    pub secret: Secret,
}

fn empty_secret() -> Secret {
    Secret::new(String::new())
}

impl StoredIdentity {
    pub fn new(record: IdentityRecord, secret: Secret) -> Self {
        Self {
            name: record.name,
            account_type: record.account_type,
            created: record.created,
            secret,
        }
    }

    /// The public part of this entry
    pub fn record(&self) -> IdentityRecord {
        IdentityRecord {
            name: self.name.clone(),
            account_type: self.account_type.clone(),
            created: self.created,
        }
    }
}

/// On-disk layout of the identities file
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema, Default)]
pub struct IdentityFile {
    #[serde(default)]
    pub identities: Vec<StoredIdentity>,
}

impl IdentityFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, name: &str) -> Option<&StoredIdentity> {
        self.identities.iter().find(|identity| identity.name == name)
    }

    pub fn insert(&mut self, identity: StoredIdentity) {
        self.identities.push(identity);
    }

    /// Remove an identity by name, returning it if it was present
    pub fn remove(&mut self, name: &str) -> Option<StoredIdentity> {
        let pos = self.identities.iter().position(|identity| identity.name == name)?;
        Some(self.identities.remove(pos))
    }

    /// Public records of every identity with the given account type
    pub fn records_of_type(&self, account_type: &str) -> Vec<IdentityRecord> {
        self.identities
            .iter()
            .filter(|identity| identity.account_type == account_type)
            .map(StoredIdentity::record)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

/// A token handed out for the enrolled identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub account_name: String,
    pub account_type: String,
    /// Same bytes as the stored secret
    pub token: Secret,
}

/// Result of a token lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenOutcome {
    Issued(AuthToken),
    /// The requested token type is not the one this broker serves
    UnsupportedType { requested: String },
    /// The stored credential was missing or empty; the identity has been
    /// removed and the caller must enroll again
    NotConfirmed,
}

impl TokenOutcome {
    /// The token, if one was issued
    pub fn token(&self) -> Option<&Secret> {
        match self {
            TokenOutcome::Issued(token) => Some(&token.token),
            _ => None,
        }
    }
}
