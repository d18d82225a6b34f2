//! Command line argument parsing and validation.

use crate::packager::settings::{
    CertificateSource, DEFAULT_DIST_URL, ENV_API_KEY_PATH, ENV_CERTIFICATE,
    ENV_CERTIFICATE_PASSWORD, ENV_CERTIFICATE_PATH, ENV_TEAM_ID,
};
use crate::packager::{PlatformTarget, Settings, SettingsBuilder, SigningCredentials};
use clap::Parser;
use std::path::PathBuf;

/// Package a JavaScript application as self-contained executables
#[derive(Parser, Debug)]
#[command(
    name = "kodegen_bundler_sea",
    version,
    about = "Package a JavaScript application as self-contained executables",
    long_about = "Bundles an application, embeds it into clean copies of the Node.js runtime
binary for each target platform, and optionally signs and notarizes the results.

Usage:
  kodegen_bundler_sea ./my-tool
  kodegen_bundler_sea ./my-tool -p linux-x64 -p darwin-arm64 -p win-x64 -o dist
  kodegen_bundler_sea server.js --runtime-version 22.3.0 --asset-manifest web/.vite/manifest.json
  APPLE_TEAM_ID=... APPLE_CERTIFICATE_PATH=dev.p12 APPLE_CERTIFICATE_PASSWORD=... \\
    kodegen_bundler_sea ./my-tool -p darwin-arm64 --sign

Signing credentials are read from APPLE_TEAM_ID, APPLE_CERTIFICATE_PATH (or
base64 APPLE_CERTIFICATE), APPLE_CERTIFICATE_PASSWORD and APPLE_API_KEY_PATH.

Exit code 0 = every requested platform produced an executable."
)]
pub struct Args {
    /// Entrypoint script, or a package directory containing package.json
    #[arg(value_name = "ENTRYPOINT")]
    pub entrypoint: PathBuf,

    /// Runtime version to embed into (default: version of the host `node`)
    #[arg(short = 'r', long, value_name = "VERSION")]
    pub runtime_version: Option<String>,

    /// Target platform as os-arch, e.g. linux-x64, darwin-arm64, win-x64 (repeatable; default: host)
    #[arg(short = 'p', long = "platform", value_name = "OS-ARCH")]
    pub platforms: Vec<PlatformTarget>,

    /// File to embed as an asset (repeatable)
    #[arg(short = 'a', long = "asset", value_name = "PATH")]
    pub assets: Vec<PathBuf>,

    /// Build-tool manifest whose outputs are embedded as assets
    #[arg(long, value_name = "PATH")]
    pub asset_manifest: Option<PathBuf>,

    /// Output directory (wiped before every run)
    #[arg(short = 'o', long, value_name = "DIR", default_value = "dist")]
    pub out_dir: PathBuf,

    /// Runtime binary cache directory
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Refetch runtime binaries even when cached
    #[arg(long)]
    pub skip_cache: bool,

    /// Embed the entrypoint as-is instead of bundling it
    #[arg(long)]
    pub skip_bundling: bool,

    /// Sign (and, with an API key, notarize) macOS executables
    #[arg(long)]
    pub sign: bool,

    /// Extra bundler define, KEY=VALUE (repeatable)
    #[arg(long = "define", value_name = "KEY=VALUE", value_parser = parse_define)]
    pub defines: Vec<(String, String)>,

    /// Runtime distribution base URL
    #[arg(long, value_name = "URL", default_value = DEFAULT_DIST_URL)]
    pub dist_url: String,

    /// Host runtime executable
    #[arg(long, value_name = "PROGRAM", default_value = "node")]
    pub node: String,

    /// Bundler executable
    #[arg(long, value_name = "PROGRAM", default_value = "esbuild")]
    pub esbuild: String,

    /// Payload injector executable
    #[arg(long, value_name = "PROGRAM", default_value = "postject")]
    pub postject: String,

    /// Apple developer team ID
    #[arg(long, value_name = "ID", env = ENV_TEAM_ID, hide_env_values = true)]
    pub apple_team_id: Option<String>,

    /// PKCS#12 signing certificate
    #[arg(long, value_name = "PATH", env = ENV_CERTIFICATE_PATH, hide_env_values = true)]
    pub apple_certificate_path: Option<PathBuf>,

    /// Base64-encoded PKCS#12 signing certificate
    #[arg(long, value_name = "BASE64", env = ENV_CERTIFICATE, hide_env_values = true, hide = true)]
    pub apple_certificate: Option<String>,

    /// Signing certificate password
    #[arg(long, value_name = "PASSWORD", env = ENV_CERTIFICATE_PASSWORD, hide_env_values = true)]
    pub apple_certificate_password: Option<String>,

    /// App Store Connect API key (JSON) for notarization
    #[arg(long, value_name = "PATH", env = ENV_API_KEY_PATH, hide_env_values = true)]
    pub apple_api_key_path: Option<PathBuf>,

    /// Only print warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print debug detail
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parses `KEY=VALUE`.
fn parse_define(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.entrypoint.as_os_str().is_empty() {
            return Err("Entrypoint cannot be empty".to_string());
        }
        if let Some(platform) = self
            .platforms
            .iter()
            .find(|p| p.os().is_empty() || p.arch().is_empty())
        {
            return Err(format!(
                "Invalid platform `{platform}`: expected os-arch, e.g. linux-x64"
            ));
        }
        if self.skip_bundling && !self.defines.is_empty() {
            return Err("--define has no effect with --skip-bundling".to_string());
        }
        Ok(())
    }

    /// Log filter implied by --quiet / --verbose.
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Signing credentials from flags and environment.
    ///
    /// A certificate path takes precedence over a base64 certificate.
    pub fn credentials(&self) -> SigningCredentials {
        let mut credentials = SigningCredentials::new();
        if let Some(team) = &self.apple_team_id {
            credentials = credentials.team_id(team.trim());
        }
        if let Some(path) = &self.apple_certificate_path {
            credentials = credentials.certificate(CertificateSource::Path(path.clone()));
        } else if let Some(encoded) = self.apple_certificate.as_ref().filter(|s| !s.is_empty()) {
            credentials = credentials.certificate(CertificateSource::Base64(encoded.clone()));
        }
        if let Some(password) = &self.apple_certificate_password {
            credentials = credentials.certificate_password(password.trim());
        }
        if let Some(key) = &self.apple_api_key_path {
            credentials = credentials.api_key_path(key.clone());
        }
        credentials
    }

    /// Builds packaging settings.
    pub fn settings(&self) -> crate::packager::Result<Settings> {
        let mut builder = SettingsBuilder::new()
            .entrypoint(&self.entrypoint)
            .platforms(self.platforms.clone())
            .asset_paths(self.assets.clone())
            .output_dir(&self.out_dir)
            .skip_cache(self.skip_cache)
            .skip_bundling(self.skip_bundling)
            .sign(self.sign)
            .credentials(self.credentials())
            .dist_url(&self.dist_url)
            .defines(self.defines.clone())
            .node_program(&self.node)
            .bundler_program(&self.esbuild)
            .postject_program(&self.postject);
        if let Some(version) = &self.runtime_version {
            builder = builder.runtime_version(version);
        }
        if let Some(manifest) = &self.asset_manifest {
            builder = builder.asset_manifest(manifest);
        }
        if let Some(cache_dir) = &self.cache_dir {
            builder = builder.cache_dir(cache_dir);
        }
        builder.build()
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Output manager for colored terminal output
    output: super::OutputManager,
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            output: super::OutputManager::new(args.verbose, args.quiet),
        }
    }
}

impl RuntimeConfig {
    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_repeated_platforms_and_defines() {
        let args = Args::try_parse_from([
            "kodegen_bundler_sea",
            "./tool",
            "-p",
            "linux-x64",
            "--platform",
            "win-x64",
            "--define",
            "process.env.MODE=\"prod\"",
            "--postject",
            "/opt/tools/postject",
        ])
        .unwrap();
        assert_eq!(
            args.platforms,
            vec![PlatformTarget::parse("linux-x64"), PlatformTarget::parse("win-x64")]
        );
        assert_eq!(
            args.defines,
            vec![("process.env.MODE".to_string(), "\"prod\"".to_string())]
        );
        assert_eq!(args.postject, "/opt/tools/postject");
        assert_eq!(args.out_dir, PathBuf::from("dist"));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn define_without_equals_is_rejected() {
        assert!(parse_define("NOPE").is_err());
        assert!(parse_define("=value").is_err());
        assert_eq!(parse_define("A=b=c").unwrap(), ("A".into(), "b=c".into()));
    }

    #[test]
    fn malformed_platform_fails_validation() {
        let args = Args::try_parse_from(["kodegen_bundler_sea", "./tool", "-p", "linux"]).unwrap();
        assert!(args.validate().is_err());
    }

    #[test]
    fn certificate_path_wins_over_base64() {
        let args = Args::try_parse_from([
            "kodegen_bundler_sea",
            "./tool",
            "--apple-team-id",
            "TEAM",
            "--apple-certificate-path",
            "dev.p12",
            "--apple-certificate",
            "aGVsbG8=",
            "--apple-certificate-password",
            "pw",
        ])
        .unwrap();
        let creds = args.credentials();
        assert_eq!(
            creds.certificate_source(),
            Some(&CertificateSource::Path(PathBuf::from("dev.p12")))
        );
        assert!(creds.missing_for_signing().is_empty());
    }

    #[test]
    fn settings_carry_arguments() {
        let args = Args::try_parse_from([
            "kodegen_bundler_sea",
            "./tool",
            "-r",
            "v22.3.0",
            "-p",
            "darwin-arm64",
            "--cache-dir",
            "/tmp/sea-cache",
            "--skip-bundling",
        ])
        .unwrap();
        let settings = args.settings().unwrap();
        assert_eq!(settings.runtime_version(), Some("22.3.0"));
        assert_eq!(settings.cache_dir(), std::path::Path::new("/tmp/sea-cache"));
        assert!(settings.skip_bundling());
    }
}
