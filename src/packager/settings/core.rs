//! Core Settings struct and implementations.

use super::{PlatformTarget, SigningCredentials};
use std::path::{Path, PathBuf};

/// Runtime distribution server used when none is configured.
pub const DEFAULT_DIST_URL: &str = "https://nodejs.org/dist";

/// Main settings for a packaging run.
///
/// Constructed via [`SettingsBuilder`](super::SettingsBuilder), which fills in
/// defaults and validates required fields.
///
/// # Examples
///
/// ```no_run
/// use kodegen_bundler_sea::packager::{PlatformTarget, SettingsBuilder};
///
/// # fn example() -> kodegen_bundler_sea::packager::Result<()> {
/// let settings = SettingsBuilder::new()
///     .entrypoint("./my-tool")
///     .runtime_version("20.11.1")
///     .platforms(vec![PlatformTarget::parse("linux-x64")])
///     .output_dir("dist")
///     .build()?;
/// assert_eq!(settings.platforms().len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Settings {
    /// Entrypoint file or package directory.
    entrypoint: PathBuf,

    /// Runtime version to embed into. None means "ask the host runtime".
    runtime_version: Option<String>,

    /// Target platforms, deduplicated, never empty.
    platforms: Vec<PlatformTarget>,

    /// Individual asset files.
    asset_paths: Vec<PathBuf>,

    /// Build-tool asset manifest.
    asset_manifest: Option<PathBuf>,

    /// Output directory. Wiped at the start of every run.
    output_dir: PathBuf,

    /// Runtime binary cache root.
    cache_dir: PathBuf,

    /// Ignore cached runtime binaries and refetch.
    skip_cache: bool,

    /// Embed the raw entrypoint instead of bundling it first.
    skip_bundling: bool,

    /// Attempt code signing.
    sign: bool,

    /// Signing and notarization credentials.
    credentials: SigningCredentials,


    /// Runtime distribution base URL.
    dist_url: String,

    /// Extra `KEY=VALUE` bundler defines.
    defines: Vec<(String, String)>,

    /// Host runtime executable used for payload materialization.
    node_program: String,

    /// Bundler executable.
    bundler_program: String,

    /// Payload injector executable.
    postject_program: String,
}

impl Settings {
    /// Returns the entrypoint file or package directory.
    pub fn entrypoint(&self) -> &Path {
        &self.entrypoint
    }

    /// Returns the configured runtime version, if any.
    pub fn runtime_version(&self) -> Option<&str> {
        self.runtime_version.as_deref()
    }

    /// Returns the target platforms.
    pub fn platforms(&self) -> &[PlatformTarget] {
        &self.platforms
    }

    /// Returns explicitly listed asset files.
    pub fn asset_paths(&self) -> &[PathBuf] {
        &self.asset_paths
    }

    /// Returns the asset manifest path, if any.
    pub fn asset_manifest(&self) -> Option<&Path> {
        self.asset_manifest.as_deref()
    }

    /// Returns the output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Returns the runtime cache directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Whether cached runtimes are ignored.
    pub fn skip_cache(&self) -> bool {
        self.skip_cache
    }

    /// Whether bundling is skipped.
    pub fn skip_bundling(&self) -> bool {
        self.skip_bundling
    }

    /// Whether signing was requested.
    pub fn sign(&self) -> bool {
        self.sign
    }

    /// Returns the signing credentials.
    pub fn credentials(&self) -> &SigningCredentials {
        &self.credentials
    }

    /// Returns the distribution base URL.
    pub fn dist_url(&self) -> &str {
        &self.dist_url
    }

    /// Returns extra bundler defines.
    pub fn defines(&self) -> &[(String, String)] {
        &self.defines
    }

    /// Returns the host runtime executable name.
    pub fn node_program(&self) -> &str {
        &self.node_program
    }

    /// Returns the bundler executable name.
    pub fn bundler_program(&self) -> &str {
        &self.bundler_program
    }

    /// Returns the payload injector executable name.
    pub fn postject_program(&self) -> &str {
        &self.postject_program
    }

    /// Final path of the executable for `platform`.
    ///
    /// A single-platform run produces `<out>/<name>[.exe]`; a multi-platform
    /// run qualifies every file as `<out>/<name>-<platform>[.exe]` so
    /// concurrent platform tasks never share an output path.
    pub fn output_path(&self, name: &str, platform: &PlatformTarget) -> PathBuf {
        let file_name = if self.platforms.len() > 1 {
            format!("{name}-{platform}{}", platform.exe_extension())
        } else {
            format!("{name}{}", platform.exe_extension())
        };
        self.output_dir.join(file_name)
    }

    /// Creates a new Settings instance (used by SettingsBuilder).
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        entrypoint: PathBuf,
        runtime_version: Option<String>,
        platforms: Vec<PlatformTarget>,
        asset_paths: Vec<PathBuf>,
        asset_manifest: Option<PathBuf>,
        output_dir: PathBuf,
        cache_dir: PathBuf,
        skip_cache: bool,
        skip_bundling: bool,
        sign: bool,
        credentials: SigningCredentials,
        dist_url: String,
        defines: Vec<(String, String)>,
        node_program: String,
        bundler_program: String,
        postject_program: String,
    ) -> Self {
        Self {
            entrypoint,
            runtime_version,
            platforms,
            asset_paths,
            asset_manifest,
            output_dir,
            cache_dir,
            skip_cache,
            skip_bundling,
            sign,
            credentials,
            dist_url,
            defines,
            node_program,
            bundler_program,
            postject_program,
        }
    }
}
