// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for the credential broker

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for broker and store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while brokering or storing credentials
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Only one identity is supported; '{0}' is already enrolled")]
    AlreadyEnrolled(String),

    #[error("Invalid identity name: {0}")]
    InvalidIdentityName(String),

    /// A host called one of the hooks this broker does not implement.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("File corruption detected: {0}")]
    FileCorruption(PathBuf),
}
