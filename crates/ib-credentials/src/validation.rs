// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Validation routines for identity names, secrets, and identity files

use crate::{
    error::{Error, Result},
    types::{IdentityFile, Secret},
};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Validate an identity name
/// Identity names must:
/// - Be 1-128 characters long
/// - Contain only alphanumerics and `.`, `_`, `@`, `+`, `-`
/// - Start with an alphanumeric or `+` and end with an alphanumeric
pub fn validate_identity_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidIdentityName(
            "Identity name cannot be empty".to_string(),
        ));
    }

    if name.len() > 128 {
        return Err(Error::InvalidIdentityName(
            "Identity name cannot be longer than 128 characters".to_string(),
        ));
    }

    // Lazy static regex for performance
    static NAME_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = NAME_REGEX
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9+](?:[A-Za-z0-9._@+-]*[A-Za-z0-9])?$").unwrap());

    if !regex.is_match(name) {
        return Err(Error::InvalidIdentityName(format!(
            "'{}' must contain only alphanumerics and '.', '_', '@', '+', '-', and must end with an alphanumeric",
            name
        )));
    }

    Ok(())
}

/// Validate a secret handed over by the enrollment flow
pub fn validate_secret(secret: &Secret) -> Result<()> {
    if secret.expose_secret().trim().is_empty() {
        return Err(Error::Validation("Secret cannot be empty".to_string()));
    }
    Ok(())
}

/// Validate an identities file for consistency
///
/// Checks names, rejects duplicates, and enforces that at most one identity of
/// any account type is present.
pub fn validate_identity_file(file: &IdentityFile) -> Result<()> {
    let mut seen_names = HashSet::new();
    let mut seen_types = HashSet::new();

    for identity in &file.identities {
        validate_identity_name(&identity.name)?;

        if identity.account_type.is_empty() {
            return Err(Error::Validation(format!(
                "Identity '{}' has an empty account type",
                identity.name
            )));
        }

        if !seen_names.insert(identity.name.as_str()) {
            return Err(Error::Validation(format!(
                "Identity '{}' appears more than once",
                identity.name
            )));
        }

        if !seen_types.insert(identity.account_type.as_str()) {
            return Err(Error::Validation(format!(
                "More than one identity enrolled for account type '{}'",
                identity.account_type
            )));
        }

        // Basic sanity check against clock skew
        let now = chrono::Utc::now();
        if identity.created > now + chrono::Duration::hours(1) {
            return Err(Error::Validation(format!(
                "Identity '{}' created time is too far in the future",
                identity.name
            )));
        }
    }

    Ok(())
}
