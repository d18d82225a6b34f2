//! Packages JavaScript applications as self-contained executables.
//!
//! The [`packager`] module holds the pipeline: a cache of clean runtime
//! binaries, signature stripping, payload preparation, blob injection and
//! macOS signing/notarization, driven per target platform by
//! [`packager::Packager`]. The [`cli`] module wraps it as a command line tool.
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod cli;
pub mod error;
pub mod metadata;
pub mod packager;

// Re-export commonly used types
pub use error::{BundlerError, CliError, Result};
pub use packager::{BuildReport, Packager, PlatformTarget, Settings, SettingsBuilder};
