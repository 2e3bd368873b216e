//! Core domain models for depgate
//!
//! This module contains the fundamental types used throughout the application:
//! - Package records under evaluation
//! - Install and update status enums
//! - Run summary with per-status counts

mod package;
mod status;
mod summary;

pub use package::{Package, VersionSummary};
pub use status::{InstallStatus, UpdateStatus};
pub use summary::{RunSummary, EXIT_OK, EXIT_PACKAGE_FAILURES, EXIT_VALIDATION_FAILED};
