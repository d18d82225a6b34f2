//! Packaging orchestration.
//!
//! - [`orchestrator`] - [`Packager`], the top-level driver
//! - [`bundle`] - application bundling through the external bundler
//! - [`checksum`] - SHA-256 of finished artifacts
//! - [`task_group`] - structured per-platform fan-out
//! - [`tool_detection`] - host runtime version detection

pub mod bundle;
mod checksum;
pub mod orchestrator;
pub mod task_group;
mod tool_detection;

pub use checksum::calculate_sha256;
pub use orchestrator::{BuildArtifact, BuildReport, PAYLOAD_CONFIG_NAME, Packager, PlatformOutcome};
pub use task_group::TaskGroup;
pub use tool_detection::detect_runtime_version;
