//! Builder for constructing Settings.

use super::{PlatformTarget, Settings, SigningCredentials, core::DEFAULT_DIST_URL};
use std::path::{Path, PathBuf};

/// Builder for constructing [`Settings`].
///
/// Only the entrypoint is required. Everything else has a default:
///
/// - platforms: the host platform
/// - output directory: `dist`
/// - cache directory: `<user cache dir>/kodegen/sea-runtimes`
/// - runtime version: whatever the host runtime reports
#[derive(Default)]
pub struct SettingsBuilder {
    entrypoint: Option<PathBuf>,
    runtime_version: Option<String>,
    platforms: Vec<PlatformTarget>,
    asset_paths: Vec<PathBuf>,
    asset_manifest: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    skip_cache: bool,
    skip_bundling: bool,
    sign: bool,
    credentials: SigningCredentials,
    dist_url: Option<String>,
    defines: Vec<(String, String)>,
    node_program: Option<String>,
    bundler_program: Option<String>,
    postject_program: Option<String>,
}

impl SettingsBuilder {
    /// Creates a new settings builder.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the entrypoint file or package directory.
    ///
    /// # Required
    ///
    /// This field is required for building.
    pub fn entrypoint<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.entrypoint = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the runtime version (`20.11.1` or `v20.11.1`).
    pub fn runtime_version(mut self, version: impl Into<String>) -> Self {
        self.runtime_version = Some(version.into());
        self
    }

    /// Sets the target platforms. Duplicates are dropped, first one wins.
    pub fn platforms(mut self, platforms: Vec<PlatformTarget>) -> Self {
        self.platforms = platforms;
        self
    }

    /// Sets individual asset files.
    pub fn asset_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.asset_paths = paths;
        self
    }

    /// Sets the build-tool asset manifest.
    pub fn asset_manifest<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.asset_manifest = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the output directory.
    pub fn output_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.output_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the runtime cache directory.
    pub fn cache_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Ignore cached runtimes.
    pub fn skip_cache(mut self, skip: bool) -> Self {
        self.skip_cache = skip;
        self
    }

    /// Embed the raw entrypoint without bundling.
    pub fn skip_bundling(mut self, skip: bool) -> Self {
        self.skip_bundling = skip;
        self
    }

    /// Request code signing.
    pub fn sign(mut self, sign: bool) -> Self {
        self.sign = sign;
        self
    }

    /// Sets signing credentials.
    pub fn credentials(mut self, credentials: SigningCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Sets the runtime distribution base URL.
    pub fn dist_url(mut self, url: impl Into<String>) -> Self {
        self.dist_url = Some(url.into());
        self
    }

    /// Sets extra bundler defines.
    pub fn defines(mut self, defines: Vec<(String, String)>) -> Self {
        self.defines = defines;
        self
    }

    /// Overrides the host runtime executable.
    pub fn node_program(mut self, program: impl Into<String>) -> Self {
        self.node_program = Some(program.into());
        self
    }

    /// Overrides the bundler executable.
    pub fn bundler_program(mut self, program: impl Into<String>) -> Self {
        self.bundler_program = Some(program.into());
        self
    }

    /// Overrides the payload injector executable.
    pub fn postject_program(mut self, program: impl Into<String>) -> Self {
        self.postject_program = Some(program.into());
        self
    }

    /// Builds the settings.
    ///
    /// # Errors
    ///
    /// - `entrypoint` is missing
    /// - the runtime version is not a semantic version
    /// - no cache directory was given and none can be determined
    pub fn build(self) -> crate::packager::Result<Settings> {
        use crate::packager::error::Context;

        let entrypoint = self.entrypoint.context("entrypoint is required")?;

        let runtime_version = self
            .runtime_version
            .map(|v| crate::packager::normalize_version(&v))
            .transpose()?;

        let mut platforms: Vec<PlatformTarget> = Vec::with_capacity(self.platforms.len());
        for platform in self.platforms {
            if !platforms.contains(&platform) {
                platforms.push(platform);
            }
        }
        if platforms.is_empty() {
            platforms.push(PlatformTarget::host());
        }

        let cache_dir = match self.cache_dir {
            Some(dir) => dir,
            None => dirs::cache_dir()
                .context("could not determine a cache directory; pass --cache-dir")?
                .join("kodegen")
                .join("sea-runtimes"),
        };

        Ok(Settings::new(
            entrypoint,
            runtime_version,
            platforms,
            self.asset_paths,
            self.asset_manifest,
            self.output_dir.unwrap_or_else(|| PathBuf::from("dist")),
            cache_dir,
            self.skip_cache,
            self.skip_bundling,
            self.sign,
            self.credentials,
            self.dist_url
                .unwrap_or_else(|| DEFAULT_DIST_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            self.defines,
            self.node_program.unwrap_or_else(|| "node".to_string()),
            self.bundler_program.unwrap_or_else(|| "esbuild".to_string()),
            self.postject_program.unwrap_or_else(|| "postject".to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entrypoint_is_required() {
        assert!(SettingsBuilder::new().cache_dir("/tmp/c").build().is_err());
    }

    #[test]
    fn defaults_to_host_platform() {
        let settings = SettingsBuilder::new()
            .entrypoint("app.js")
            .cache_dir("/tmp/c")
            .build()
            .unwrap();
        assert_eq!(settings.platforms(), &[PlatformTarget::host()]);
        assert_eq!(settings.output_dir(), Path::new("dist"));
        assert_eq!(settings.dist_url(), DEFAULT_DIST_URL);
        assert_eq!(settings.runtime_version(), None);
        assert_eq!(settings.postject_program(), "postject");
    }

    #[test]
    fn deduplicates_platforms() {
        let settings = SettingsBuilder::new()
            .entrypoint("app.js")
            .cache_dir("/tmp/c")
            .platforms(vec![
                PlatformTarget::parse("linux-x64"),
                PlatformTarget::parse("darwin-arm64"),
                PlatformTarget::parse("linux-x64"),
            ])
            .build()
            .unwrap();
        assert_eq!(
            settings.platforms(),
            &[
                PlatformTarget::parse("linux-x64"),
                PlatformTarget::parse("darwin-arm64")
            ]
        );
    }

    #[test]
    fn normalizes_runtime_version() {
        let settings = SettingsBuilder::new()
            .entrypoint("app.js")
            .cache_dir("/tmp/c")
            .runtime_version("v20.11.1")
            .build()
            .unwrap();
        assert_eq!(settings.runtime_version(), Some("20.11.1"));
    }

    #[test]
    fn rejects_non_semver_runtime_version() {
        let result = SettingsBuilder::new()
            .entrypoint("app.js")
            .cache_dir("/tmp/c")
            .runtime_version("latest")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn output_paths_are_qualified_only_for_multi_platform_runs() {
        let single = SettingsBuilder::new()
            .entrypoint("app.js")
            .cache_dir("/tmp/c")
            .output_dir("out")
            .platforms(vec![PlatformTarget::parse("win-x64")])
            .build()
            .unwrap();
        assert_eq!(
            single.output_path("tool", &PlatformTarget::parse("win-x64")),
            PathBuf::from("out/tool.exe")
        );

        let multi = SettingsBuilder::new()
            .entrypoint("app.js")
            .cache_dir("/tmp/c")
            .output_dir("out")
            .platforms(vec![
                PlatformTarget::parse("win-x64"),
                PlatformTarget::parse("linux-x64"),
            ])
            .build()
            .unwrap();
        assert_eq!(
            multi.output_path("tool", &PlatformTarget::parse("win-x64")),
            PathBuf::from("out/tool-win-x64.exe")
        );
        assert_eq!(
            multi.output_path("tool", &PlatformTarget::parse("linux-x64")),
            PathBuf::from("out/tool-linux-x64")
        );
    }
}
