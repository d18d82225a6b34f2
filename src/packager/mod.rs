//! Single-executable packaging pipeline.
//!
//! Turns an application into self-contained executables by splicing a
//! payload blob into clean copies of the runtime binary:
//!
//! 1. [`cache`] obtains an unsigned runtime binary per `(version, platform)`
//! 2. [`payload`] describes and materializes the payload blob
//! 3. [`binary`] strips signatures and injects the blob
//! 4. [`sign`] signs and notarizes where credentials allow
//! 5. [`builder`] drives all of the above, one task per platform
//!
//! # Example
//!
//! ```no_run
//! use kodegen_bundler_sea::packager::{Packager, SettingsBuilder};
//!
//! # async fn example() -> kodegen_bundler_sea::packager::Result<()> {
//! let settings = SettingsBuilder::new()
//!     .entrypoint("./my-tool")
//!     .runtime_version("22.3.0")
//!     .build()?;
//!
//! let report = Packager::new(settings).build().await?;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

pub mod binary;
pub mod builder;
pub mod cache;
pub mod error;
pub mod payload;
pub mod settings;
pub mod sign;
pub mod utils;

pub use binary::BinaryFormat;
pub use builder::{BuildArtifact, BuildReport, Packager, PlatformOutcome};
pub use cache::{ArchiveSource, ArchiveStream, BinaryCache};
pub use error::{Context, Error, ErrorExt, ErrorKind, Result};
pub use payload::PayloadManifest;
pub use settings::{
    CertificateSource, PlatformFamily, PlatformTarget, Settings, SettingsBuilder,
    SigningCredentials,
};
pub use sign::SigningOutcome;
pub use utils::http::HttpArchiveSource;
pub use utils::process::{CommandOutput, CommandRunner, Invocation, SystemCommandRunner};

/// Normalizes a runtime version: surrounding whitespace and a leading `v`
/// are dropped, and the rest must be a full semantic version.
///
/// ```
/// use kodegen_bundler_sea::packager::normalize_version;
///
/// assert_eq!(normalize_version("v20.11.1\n").unwrap(), "20.11.1");
/// assert!(normalize_version("lts").is_err());
/// ```
pub fn normalize_version(version: &str) -> Result<String> {
    let trimmed = version.trim();
    let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
    semver::Version::parse(bare)
        .map(|v| v.to_string())
        .map_err(|source| Error::InvalidVersion {
            version: version.trim().to_string(),
            source,
        })
}
