// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Shared fixtures and recording test doubles for credential broker tests

pub mod doubles;
pub mod fixtures;

/// Re-export common test utilities
pub use doubles::*;
pub use fixtures::*;
