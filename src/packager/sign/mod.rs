//! Per-platform signing and notarization.
//!
//! Each platform moves through:
//!
//! ```text
//! Injected -> SkippedSigning -> Done
//!          -> Signed -> Done
//!                    -> Notarized -> Done
//! ```
//!
//! Every reason to skip (not requested, unsupported platform, missing
//! credentials, missing tool, missing API key) is a warning and still
//! yields a usable artifact. Only a failing signing or notarization command
//! is an error, and only for the platform it ran for.

pub mod macos;

use crate::packager::Result;
use crate::packager::settings::{PlatformFamily, PlatformTarget, SigningCredentials};
use crate::packager::utils::process::CommandRunner;
use std::fmt;
use std::path::Path;

/// Signing and notarization tool.
pub const SIGNING_TOOL: &str = "rcodesign";

/// How far signing got for one platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SigningOutcome {
    /// Signing was not requested
    NotRequested,
    /// No signing path exists for the platform family
    Unsupported,
    /// Signing skipped; the named credentials were absent
    MissingCredentials(Vec<&'static str>),
    /// Signing skipped; the signing tool is not installed
    ToolUnavailable,
    /// Signed but not notarized
    Signed,
    /// Signed and notarized
    Notarized,
}

impl SigningOutcome {
    /// Whether the artifact carries a signature.
    pub fn is_signed(&self) -> bool {
        matches!(self, SigningOutcome::Signed | SigningOutcome::Notarized)
    }
}

impl fmt::Display for SigningOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigningOutcome::NotRequested => f.write_str("unsigned"),
            SigningOutcome::Unsupported => f.write_str("unsigned (unsupported)"),
            SigningOutcome::MissingCredentials(_) => f.write_str("unsigned (no credentials)"),
            SigningOutcome::ToolUnavailable => f.write_str("unsigned (no rcodesign)"),
            SigningOutcome::Signed => f.write_str("signed"),
            SigningOutcome::Notarized => f.write_str("signed + notarized"),
        }
    }
}

/// Runs the signing state machine for one platform's executable.
pub async fn sign_and_notarize<R: CommandRunner>(
    runner: &R,
    binary: &Path,
    platform: &PlatformTarget,
    requested: bool,
    credentials: &SigningCredentials,
) -> Result<SigningOutcome> {
    let family = platform.family();

    if !requested {
        if family == PlatformFamily::MacOs {
            log::warn!(
                "{}: executable is unsigned and will not run on macOS until signed (pass --sign)",
                platform
            );
        } else {
            log::info!("{}: code signing not requested", platform);
        }
        return Ok(SigningOutcome::NotRequested);
    }

    if family != PlatformFamily::MacOs {
        log::warn!(
            "{}: code signing is not supported for this platform; leaving executable unsigned",
            platform
        );
        return Ok(SigningOutcome::Unsupported);
    }

    let missing = credentials.missing_for_signing();
    if !missing.is_empty() {
        log::warn!(
            "{}: skipping code signing, missing {}",
            platform,
            missing.join(", ")
        );
        return Ok(SigningOutcome::MissingCredentials(missing));
    }

    if runner.locate(SIGNING_TOOL).is_none() {
        log::warn!(
            "{}: skipping code signing, `{}` not found in PATH",
            platform,
            SIGNING_TOOL
        );
        return Ok(SigningOutcome::ToolUnavailable);
    }

    macos::sign(runner, binary, credentials).await?;

    let Some(api_key) = credentials.api_key() else {
        log::warn!(
            "{}: APPLE_API_KEY_PATH not set; executable is signed but not notarized",
            platform
        );
        return Ok(SigningOutcome::Signed);
    };

    macos::notarize(runner, binary, api_key).await?;
    Ok(SigningOutcome::Notarized)
}
