//! Apple signing and notarization credentials.

use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable naming the Apple developer team.
pub const ENV_TEAM_ID: &str = "APPLE_TEAM_ID";
/// Environment variable with a path to a PKCS#12 signing certificate.
pub const ENV_CERTIFICATE_PATH: &str = "APPLE_CERTIFICATE_PATH";
/// Environment variable with a base64-encoded PKCS#12 signing certificate.
pub const ENV_CERTIFICATE: &str = "APPLE_CERTIFICATE";
/// Environment variable with the certificate password.
pub const ENV_CERTIFICATE_PASSWORD: &str = "APPLE_CERTIFICATE_PASSWORD";
/// Environment variable with a path to an App Store Connect API key.
pub const ENV_API_KEY_PATH: &str = "APPLE_API_KEY_PATH";

/// Where the signing certificate comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum CertificateSource {
    /// PKCS#12 file on disk
    Path(PathBuf),
    /// Base64-encoded PKCS#12 bundle (CI secrets)
    Base64(String),
}

/// Optional credentials for macOS signing and notarization.
///
/// Constructed once by the configuration layer and passed explicitly to the
/// signer. Each field is optional; which ones are present decides how far the
/// signing state machine gets. `Debug` never prints secret values.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SigningCredentials {
    team_id: Option<String>,
    certificate: Option<CertificateSource>,
    certificate_password: Option<String>,
    api_key_path: Option<PathBuf>,
}

impl SigningCredentials {
    /// Empty credentials.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the team identity.
    pub fn team_id(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into()).filter(|s: &String| !s.is_empty());
        self
    }

    /// Sets the certificate source.
    pub fn certificate(mut self, source: CertificateSource) -> Self {
        self.certificate = Some(source);
        self
    }

    /// Sets the certificate password.
    pub fn certificate_password(mut self, password: impl Into<String>) -> Self {
        self.certificate_password = Some(password.into()).filter(|s: &String| !s.is_empty());
        self
    }

    /// Sets the notarization API key path.
    pub fn api_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.api_key_path = Some(path.into());
        self
    }

    /// Team identity, if present.
    pub fn team(&self) -> Option<&str> {
        self.team_id.as_deref()
    }

    /// Certificate source, if present.
    pub fn certificate_source(&self) -> Option<&CertificateSource> {
        self.certificate.as_ref()
    }

    /// Certificate password, if present.
    pub fn password(&self) -> Option<&str> {
        self.certificate_password.as_deref()
    }

    /// Notarization API key path, if present.
    pub fn api_key(&self) -> Option<&Path> {
        self.api_key_path.as_deref()
    }

    /// Names of the signing credentials that are absent.
    ///
    /// Signing needs all of team, certificate and password; an empty result
    /// means signing can be attempted.
    pub fn missing_for_signing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.team_id.is_none() {
            missing.push(ENV_TEAM_ID);
        }
        if self.certificate.is_none() {
            missing.push(ENV_CERTIFICATE_PATH);
        }
        if self.certificate_password.is_none() {
            missing.push(ENV_CERTIFICATE_PASSWORD);
        }
        missing
    }
}

/// Masks a secret for display: keeps the first two characters.
pub fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(2).collect();
    format!("{visible}***")
}

impl fmt::Debug for CertificateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificateSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            CertificateSource::Base64(_) => f.write_str("Base64(<redacted>)"),
        }
    }
}

impl fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("team_id", &self.team_id.as_deref().map(mask))
            .field("certificate", &self.certificate)
            .field(
                "certificate_password",
                &self.certificate_password.as_ref().map(|_| "<redacted>"),
            )
            .field("api_key_path", &self.api_key_path)
            .finish()
    }
}
