//! Shared Types
//!
//! Core data model and the unified error type.

pub mod context;
pub mod error;

pub use context::{
    Category, ClassifiedFindings, DiagnosticContext, LogRecord, LogSource, MountUsage, OsInfo,
    PackageManager, ResourceSnapshot, Severity,
};
pub use error::{InitError, QueryError, Result, SosError};
