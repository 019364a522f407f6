//! DS Reports common library
//!
//! Shared plumbing for the DS Reports workspace:
//!
//! - **Logging**: `tracing` subscriber setup driven by [`logging::LogConfig`]
//! - **Checksums**: SHA-256 digests used when archives are produced and uploaded

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod checksum;
pub mod logging;

pub use logging::{init_logging, LogConfig, LoggingGuard};
