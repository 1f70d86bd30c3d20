// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Configuration for the credential broker

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_ACCOUNT_TYPE: &str = "dev.identity-broker.account";
pub const DEFAULT_TOKEN_TYPE: &str = "dev.identity-broker.token";
pub const DEFAULT_TOKEN_LABEL: &str = "Identity Broker";

/// Environment variable that relocates the broker's home directory
pub const HOME_ENV_VAR: &str = "IB_HOME";

/// Broker configuration section
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct BrokerConfig {
    /// Custom storage path for the credentials directory
    /// If not set, uses the standard config directory
    pub storage_path: Option<PathBuf>,

    /// Account type constant attached to every identity
    pub account_type: String,

    /// The single token type this broker serves
    pub token_type: String,

    /// Human-readable label for `token_type`
    pub token_label: String,

    /// Base configuration directory resolved by the host
    #[serde(skip)]
    pub base_config_dir: Option<PathBuf>,

    /// Override for IB_HOME (used for testing to avoid environment conflicts)
    #[serde(skip)]
    pub ib_home_override: Option<PathBuf>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            storage_path: None,
            account_type: DEFAULT_ACCOUNT_TYPE.to_string(),
            token_type: DEFAULT_TOKEN_TYPE.to_string(),
            token_label: DEFAULT_TOKEN_LABEL.to_string(),
            base_config_dir: None,
            ib_home_override: None,
        }
    }
}

impl BrokerConfig {
    /// Configuration rooted at an explicit storage directory
    pub fn with_storage_path(storage_path: impl Into<PathBuf>) -> Self {
        Self {
            storage_path: Some(storage_path.into()),
            ..Self::default()
        }
    }

    /// Set the base configuration directory
    pub fn with_base_config_dir(mut self, base_dir: PathBuf) -> Self {
        self.base_config_dir = Some(base_dir);
        self
    }

    /// Parse and validate a TOML configuration document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: BrokerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file; the file's directory becomes the
    /// base configuration directory
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        if let Some(parent) = path.parent() {
            config.base_config_dir = Some(parent.to_path_buf());
        }
        tracing::debug!(path = %path.display(), "Loaded broker configuration");
        Ok(config)
    }

    /// Load from `path` when given, otherwise fall back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Reject configurations that would make token lookups meaningless
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("account-type", &self.account_type),
            ("token-type", &self.token_type),
            ("token-label", &self.token_label),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{} cannot be empty", key)));
            }
        }
        Ok(())
    }

    /// Get the credentials storage directory path
    /// Precedence: storage_path > IB_HOME > base_config_dir > dirs::config_dir
    pub fn storage_dir(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.storage_path {
            return Ok(custom_path.clone());
        }

        if let Some(ib_home_override) = &self.ib_home_override {
            return Ok(ib_home_override.join("credentials"));
        }
        if let Ok(ib_home) = std::env::var(HOME_ENV_VAR) {
            return Ok(PathBuf::from(ib_home).join("credentials"));
        }

        if let Some(base_dir) = &self.base_config_dir {
            return Ok(base_dir.join("credentials"));
        }

        let base_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;
        Ok(base_dir.join("identity-broker").join("credentials"))
    }

    /// Get the identities.toml file path
    pub fn identities_file(&self) -> Result<PathBuf> {
        Ok(self.storage_dir()?.join("identities.toml"))
    }
}
