//! Configuration structures for packaging runs.
//!
//! This module provides the run configuration ([`Settings`] and its builder),
//! the platform key type, and the signing credentials value that is threaded
//! explicitly into the signer.

mod builder;
mod core;
mod credentials;
mod platform;

pub use builder::SettingsBuilder;
pub use self::core::{DEFAULT_DIST_URL, Settings};
pub use credentials::{
    CertificateSource, ENV_API_KEY_PATH, ENV_CERTIFICATE, ENV_CERTIFICATE_PASSWORD,
    ENV_CERTIFICATE_PATH, ENV_TEAM_ID, SigningCredentials, mask,
};
pub use platform::{ArchiveFormat, PlatformFamily, PlatformTarget};
