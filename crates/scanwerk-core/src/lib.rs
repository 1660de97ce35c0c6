// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk: Core types, error definitions, and workflow configuration shared
// across all crates.

pub mod config;
pub mod error;
pub mod human_errors;
pub mod types;

pub use config::{ConfigProvider, JsonFileConfig, SettingsMap, WorkflowConfig};
pub use error::{ErrorKind, ScanwerkError, WorkflowError};
pub use types::*;
