//! The versioning service: configuration plus a ready-wired coordinator.

mod api;
mod config;

pub use api::{ServiceError, ServiceResult, Versioner};
pub use config::{SignatureConfig, VersionerConfig};
