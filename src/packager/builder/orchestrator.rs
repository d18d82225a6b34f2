//! Main packaging orchestration.
//!
//! One run resolves the entrypoint, bundles it, materializes a single payload
//! blob and then fans out one independent pipeline per target platform:
//!
//! ```text
//! cache -> inject -> chmod -> sign/notarize -> checksum
//! ```
//!
//! Platform pipelines share only the read-only blob and the runtime cache.
//! Everything the run reads from must live outside the output directory,
//! which is wiped before bundling.

use super::{
    bundle::bundle_entrypoint, checksum::calculate_sha256, task_group::TaskGroup,
    tool_detection::detect_runtime_version,
};
use crate::bail;
use crate::metadata::{Entrypoint, resolve_entrypoint};
use crate::packager::{
    Error, Result, normalize_version,
    binary::BlobInjector,
    cache::{ArchiveSource, BinaryCache},
    error::ErrorExt,
    payload,
    settings::{PlatformTarget, Settings, SigningCredentials},
    sign::{SigningOutcome, sign_and_notarize},
    utils::{
        fs::{create_dir_all, make_executable, remove_file_best_effort},
        http::HttpArchiveSource,
        process::{CommandRunner, SystemCommandRunner},
    },
};
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name of the transient payload config written to the output directory.
pub const PAYLOAD_CONFIG_NAME: &str = "sea-config.json";

/// One finished executable.
#[derive(Clone, Debug)]
pub struct BuildArtifact {
    /// Platform the executable runs on
    pub platform: PlatformTarget,
    /// Where it was written
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Hex-encoded SHA-256 of the final file
    pub checksum: String,
    /// How far signing got
    pub signing: SigningOutcome,
}

/// Result of one platform's pipeline.
#[derive(Debug)]
pub struct PlatformOutcome {
    /// Platform the pipeline ran for
    pub platform: PlatformTarget,
    /// The artifact, or why the pipeline failed
    pub result: Result<BuildArtifact>,
}

/// Outcome of a whole packaging run.
#[derive(Debug)]
pub struct BuildReport {
    /// Output name shared by every artifact
    pub name: String,
    /// Application version
    pub version: String,
    /// Runtime version embedded into
    pub runtime_version: String,
    /// Per-platform outcomes, in requested platform order
    pub outcomes: Vec<PlatformOutcome>,
}

impl BuildReport {
    /// Whether every platform produced an artifact.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Successfully produced artifacts.
    pub fn artifacts(&self) -> impl Iterator<Item = &BuildArtifact> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    /// Failed platforms with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&PlatformTarget, &Error)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (&o.platform, e)))
    }
}

/// Everything one platform pipeline needs, owned so it can move into a task.
struct PlatformJob<R, S> {
    platform: PlatformTarget,
    runtime_version: String,
    output: PathBuf,
    cache: Arc<BinaryCache<S>>,
    injector: Arc<BlobInjector<R>>,
    runner: Arc<R>,
    sign: bool,
    credentials: SigningCredentials,
}

impl<R: CommandRunner, S: ArchiveSource> PlatformJob<R, S> {
    async fn run(self) -> Result<BuildArtifact> {
        log::info!("[{}] Building {}", self.platform, self.output.display());

        self.cache
            .obtain(&self.runtime_version, &self.platform, &self.output)
            .await?;
        self.injector.inject(&self.output, &self.platform).await?;

        log::info!("[{}] Marking {} executable", self.platform, self.output.display());
        make_executable(&self.output).await?;

        let signing = sign_and_notarize(
            self.runner.as_ref(),
            &self.output,
            &self.platform,
            self.sign,
            &self.credentials,
        )
        .await?;

        let size = tokio::fs::metadata(&self.output)
            .await
            .fs_context("reading artifact metadata", &self.output)?
            .len();
        let checksum = calculate_sha256(&self.output).await?;

        log::info!("[{}] ✓ {}", self.platform, self.output.display());
        Ok(BuildArtifact {
            platform: self.platform,
            path: self.output,
            size,
            checksum,
            signing,
        })
    }
}

/// Packages an application into self-contained executables.
///
/// # Examples
///
/// ```no_run
/// use kodegen_bundler_sea::packager::{Packager, PlatformTarget, SettingsBuilder};
///
/// # async fn example() -> kodegen_bundler_sea::packager::Result<()> {
/// let settings = SettingsBuilder::new()
///     .entrypoint("./my-tool")
///     .platforms(vec![
///         PlatformTarget::parse("linux-x64"),
///         PlatformTarget::parse("darwin-arm64"),
///     ])
///     .build()?;
///
/// let report = Packager::new(settings).build().await?;
/// for artifact in report.artifacts() {
///     println!("{} {} ({} bytes)", artifact.checksum, artifact.path.display(), artifact.size);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Packager<R = SystemCommandRunner, S = HttpArchiveSource> {
    settings: Settings,
    runner: Arc<R>,
    source: Arc<S>,
}

impl Packager {
    /// Creates a packager that runs real processes and downloads over HTTP.
    pub fn new(settings: Settings) -> Self {
        Self::with_collaborators(
            settings,
            Arc::new(SystemCommandRunner),
            Arc::new(HttpArchiveSource::new()),
        )
    }
}

impl<R, S> Packager<R, S>
where
    R: CommandRunner + 'static,
    S: ArchiveSource + 'static,
{
    /// Creates a packager with explicit command and archive collaborators.
    pub fn with_collaborators(settings: Settings, runner: Arc<R>, source: Arc<S>) -> Self {
        Self {
            settings,
            runner,
            source,
        }
    }

    /// Returns the packager settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Runs the whole pipeline.
    ///
    /// Errors before the fan-out (entrypoint, bundling, payload) abort the
    /// run. Errors inside a platform pipeline are reported in that
    /// platform's [`PlatformOutcome`] and never stop its siblings.
    pub async fn build(&self) -> Result<BuildReport> {
        let settings = &self.settings;

        let entry = resolve_entrypoint(settings.entrypoint()).await?;
        let output_dir = settings
            .output_dir()
            .absolutize()
            .fs_context("resolving output directory", settings.output_dir())?
            .into_owned();
        ensure_outside(&output_dir, &entry.main, "entrypoint")?;
        if let Some(manifest) = settings.asset_manifest() {
            ensure_outside(&output_dir, manifest, "asset manifest")?;
        }
        for asset in settings.asset_paths() {
            ensure_outside(&output_dir, asset, "asset")?;
        }
        ensure_outside(&output_dir, settings.cache_dir(), "cache directory")?;

        let runtime_version = match settings.runtime_version() {
            Some(version) => normalize_version(version)?,
            None => detect_runtime_version(self.runner.as_ref(), settings.node_program()).await?,
        };
        log::info!(
            "Packaging {} v{} on runtime v{} for {}",
            entry.name,
            entry.version,
            runtime_version,
            settings
                .platforms()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );

        log::info!("Preparing output directory {}", output_dir.display());
        create_dir_all(&output_dir, true).await?;

        let bundle_path = output_dir.join(format!("{}.bundle.cjs", entry.name));
        let main_module = if settings.skip_bundling() {
            log::info!("Bundling skipped, embedding {}", entry.main.display());
            entry.main.clone()
        } else {
            bundle_entrypoint(
                self.runner.as_ref(),
                settings.bundler_program(),
                &entry.main,
                &bundle_path,
                &entry.version,
                settings.defines(),
            )
            .await?
        };

        let blob_path = output_dir.join(format!("{}.blob", entry.name));
        let config_path = output_dir.join(PAYLOAD_CONFIG_NAME);
        let manifest = payload::prepare(
            &main_module,
            &blob_path,
            settings.asset_paths(),
            settings.asset_manifest(),
        )
        .await?;
        payload::write_config(&manifest, &config_path).await?;
        payload::materialize(
            self.runner.as_ref(),
            settings.node_program(),
            &manifest,
            &config_path,
        )
        .await?;

        let blob_size = tokio::fs::metadata(&blob_path)
            .await
            .fs_context("reading payload blob", &blob_path)?
            .len();
        log::debug!("Payload blob is {} bytes", blob_size);

        let outcomes = self
            .fan_out(&entry, &output_dir, &runtime_version, &blob_path)
            .await;

        log::info!("Cleaning up transient files");
        remove_file_best_effort(&config_path).await;
        remove_file_best_effort(&blob_path).await;
        if !settings.skip_bundling() {
            remove_file_best_effort(&bundle_path).await;
        }

        Ok(BuildReport {
            name: entry.name,
            version: entry.version,
            runtime_version,
            outcomes,
        })
    }

    /// Runs every platform pipeline concurrently and collects all outcomes.
    async fn fan_out(
        &self,
        entry: &Entrypoint,
        output_dir: &Path,
        runtime_version: &str,
        blob_path: &Path,
    ) -> Vec<PlatformOutcome> {
        let settings = &self.settings;
        let cache = Arc::new(
            BinaryCache::new(self.source.clone(), settings.cache_dir())
                .with_dist_url(settings.dist_url())
                .with_skip_cache(settings.skip_cache()),
        );
        let injector = Arc::new(BlobInjector::new(
            self.runner.clone(),
            settings.postject_program(),
            blob_path.to_path_buf(),
        ));

        let mut group = TaskGroup::new();
        for platform in settings.platforms() {
            let output = settings.output_path(&entry.name, platform);
            let output = match output.file_name() {
                Some(file_name) => output_dir.join(file_name),
                None => output,
            };
            let job = PlatformJob {
                platform: platform.clone(),
                runtime_version: runtime_version.to_string(),
                output,
                cache: cache.clone(),
                injector: injector.clone(),
                runner: self.runner.clone(),
                sign: settings.sign(),
                credentials: settings.credentials().clone(),
            };
            group.spawn(platform.to_string(), job.run());
        }

        let mut outcomes = Vec::with_capacity(settings.platforms().len());
        for (platform, result) in settings.platforms().iter().zip(group.join_all().await) {
            let result = result.and_then(|r| r);
            if let Err(e) = &result {
                log::error!("[{}] {}", platform, e);
            }
            outcomes.push(PlatformOutcome {
                platform: platform.clone(),
                result,
            });
        }
        outcomes
    }
}

/// Fails when `path` lies inside `output_dir`, which is wiped on every run.
fn ensure_outside(output_dir: &Path, path: &Path, what: &str) -> Result<()> {
    let path = path
        .absolutize()
        .fs_context("resolving input path", path)?;
    if path.starts_with(output_dir) {
        bail!(
            "{} {} is inside the output directory {}, which is wiped on every run",
            what,
            path.display(),
            output_dir.display()
        );
    }
    Ok(())
}
