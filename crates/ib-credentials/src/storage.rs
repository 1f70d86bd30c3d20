// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! File layout and the file-backed credential store

use crate::{
    config::BrokerConfig,
    error::{Error, Result},
    store::CredentialStore,
    types::{IdentityFile, IdentityRecord, Secret, StoredIdentity},
    validation::validate_identity_file,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Ensure the storage directory exists with owner-only permissions
pub fn ensure_storage_dir(config: &BrokerConfig) -> Result<()> {
    create_dir_with_permissions(&config.storage_dir()?, 0o700)
}

fn create_dir_with_permissions(path: &Path, mode: u32) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }

    #[cfg(unix)]
    {
        let mut permissions = fs::metadata(path)?.permissions();
        permissions.set_mode(mode);
        fs::set_permissions(path, permissions)?;
    }

    #[cfg(not(unix))]
    {
        let _ = mode;
        if !path.exists() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "Failed to create directory on non-Unix platform",
            )));
        }
    }

    Ok(())
}

/// Load the identities file from disk; a missing file is an empty store
pub fn load_identity_file(config: &BrokerConfig) -> Result<IdentityFile> {
    let path = config.identities_file()?;

    if !path.exists() {
        return Ok(IdentityFile::new());
    }

    let content = fs::read_to_string(&path)?;
    let file: IdentityFile = toml::from_str(&content).map_err(|e| {
        tracing::warn!("Failed to parse identities file {}: {}", path.display(), e);
        Error::FileCorruption(path.clone())
    })?;

    validate_file_schema(&file)?;
    validate_identity_file(&file)?;

    Ok(file)
}

/// Validate the identities file against its JSON schema (compiled once)
fn validate_file_schema(file: &IdentityFile) -> Result<()> {
    use schemars::schema_for;
    use std::sync::OnceLock;

    static COMPILED_SCHEMA: OnceLock<std::result::Result<jsonschema::JSONSchema, String>> =
        OnceLock::new();

    let compiled_schema = COMPILED_SCHEMA.get_or_init(|| {
        let schema = schema_for!(IdentityFile);
        let schema_json = serde_json::to_value(&schema)
            .map_err(|e| format!("Failed to serialize schema: {}", e))?;

        jsonschema::JSONSchema::compile(&schema_json)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    let compiled_schema = match compiled_schema {
        Ok(schema) => schema,
        Err(err) => {
            return Err(Error::Validation(format!(
                "Schema compilation failed: {}",
                err
            )));
        }
    };

    let file_json = serde_json::to_value(file)?;
    if let Err(errors) = compiled_schema.validate(&file_json) {
        let error_messages: Vec<String> = errors.map(|e| e.to_string()).collect();
        return Err(Error::Validation(format!(
            "Schema validation failed: {}",
            error_messages.join(", ")
        )));
    }

    Ok(())
}

/// Save the identities file to disk (0600, written through a temp file)
pub fn save_identity_file(config: &BrokerConfig, file: &IdentityFile) -> Result<()> {
    ensure_storage_dir(config)?;

    let path = config.identities_file()?;
    let content = toml::to_string_pretty(file)?;

    let temp_file = path.with_extension("tmp");
    fs::write(&temp_file, &content)?;

    #[cfg(unix)]
    {
        let mut permissions = fs::metadata(&temp_file)?.permissions();
        permissions.set_mode(0o600);
        fs::set_permissions(&temp_file, permissions)?;
    }

    fs::rename(&temp_file, &path)?;

    Ok(())
}

/// Check that the storage directory and identities file are owner-only
pub fn validate_permissions(config: &BrokerConfig) -> Result<()> {
    let dir = config.storage_dir()?;
    if !dir.exists() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("storage directory {} does not exist", dir.display()),
        )));
    }

    #[cfg(unix)]
    {
        // Reject any group or other permissions
        if fs::metadata(&dir)?.permissions().mode() & 0o077 != 0 {
            return Err(Error::PermissionDenied(dir));
        }

        let file = config.identities_file()?;
        if file.exists() && fs::metadata(&file)?.permissions().mode() & 0o177 != 0 {
            return Err(Error::PermissionDenied(file));
        }
    }

    #[cfg(not(unix))]
    {
        tracing::warn!(
            "Permission validation not fully supported on non-Unix platforms for directory: {}",
            dir.display()
        );
    }

    Ok(())
}

/// Credential store persisted as `identities.toml` under the storage directory
///
/// Every operation re-reads the file, so external edits (e.g. by an enrollment
/// process running elsewhere) are observed without a cache.
#[derive(Debug)]
pub struct FileStore {
    config: BrokerConfig,
    guard: Mutex<()>,
}

impl FileStore {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            guard: Mutex::new(()),
        }
    }

    /// Path of the backing identities file
    pub fn path(&self) -> Result<PathBuf> {
        self.config.identities_file()
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.guard
            .lock()
            .map_err(|_| Error::Store("file store lock poisoned".to_string()))
    }
}

impl CredentialStore for FileStore {
    fn secret(&self, name: &str) -> Result<Option<Secret>> {
        let _guard = self.lock()?;
        let file = load_identity_file(&self.config)?;
        Ok(file.find(name).map(|identity| identity.secret.clone()))
    }

    fn delete_identity(&self, name: &str) -> Result<()> {
        let _guard = self.lock()?;
        let mut file = load_identity_file(&self.config)?;
        if file.remove(name).is_some() {
            save_identity_file(&self.config, &file)?;
            tracing::debug!(identity = name, "Removed identity from file store");
        }
        Ok(())
    }

    fn list_identities(&self, account_type: &str) -> Result<Vec<IdentityRecord>> {
        let _guard = self.lock()?;
        Ok(load_identity_file(&self.config)?.records_of_type(account_type))
    }

    fn add_identity(&self, record: IdentityRecord, secret: Secret) -> Result<()> {
        let _guard = self.lock()?;
        let mut file = load_identity_file(&self.config)?;
        if file.find(&record.name).is_some() {
            return Err(Error::AlreadyEnrolled(record.name));
        }
        file.insert(StoredIdentity::new(record, secret));
        validate_identity_file(&file)?;
        save_identity_file(&self.config, &file)
    }
}
