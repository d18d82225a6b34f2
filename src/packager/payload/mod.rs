//! Payload preparation.
//!
//! The payload blob is produced by the host runtime from a JSON config
//! describing the main module, the blob's output path and the embedded
//! assets. It is built once per run and shared by every platform.

pub mod assets;

pub use assets::{expand_asset_manifest, explicit_assets};

use crate::packager::error::{Error, ErrorExt, Result};
use crate::packager::utils::process::{CommandRunner, Invocation, run_checked};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Payload config consumed by `node --experimental-sea-config`.
///
/// Assets are kept in a `BTreeMap` so the serialized config, and therefore
/// the blob, is identical across runs with identical inputs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadManifest {
    /// Main module (bundled output or raw entrypoint)
    pub main: PathBuf,
    /// Where the blob is written
    pub output: PathBuf,
    /// Suppress the runtime's experimental-feature warning
    pub disable_experimental_warning: bool,
    /// Start from a V8 startup snapshot instead of a script
    pub use_snapshot: bool,
    /// Embed a V8 code cache for the main module
    pub use_code_cache: bool,
    /// Logical asset name to source file
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub assets: BTreeMap<String, PathBuf>,
}

impl PayloadManifest {
    /// Creates a manifest with no assets and the standard feature flags.
    pub fn new(main: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            main: main.into(),
            output: output.into(),
            disable_experimental_warning: true,
            use_snapshot: false,
            use_code_cache: false,
            assets: BTreeMap::new(),
        }
    }
}

/// Builds the payload manifest.
///
/// Explicit assets are added first; entries from the asset manifest win on
/// key collisions.
pub async fn prepare(
    main: &Path,
    output: &Path,
    asset_paths: &[PathBuf],
    asset_manifest: Option<&Path>,
) -> Result<PayloadManifest> {
    log::info!("Preparing payload for {}", main.display());

    let mut manifest = PayloadManifest::new(main, output);
    manifest.assets.extend(explicit_assets(asset_paths)?);
    if let Some(asset_manifest) = asset_manifest {
        manifest
            .assets
            .extend(expand_asset_manifest(asset_manifest).await?);
    }

    log::debug!("Payload embeds {} assets", manifest.assets.len());
    Ok(manifest)
}

/// Writes the manifest as pretty JSON to `path`.
pub async fn write_config(manifest: &PayloadManifest, path: &Path) -> Result<()> {
    let json = serde_json::to_vec_pretty(manifest)?;
    tokio::fs::write(path, json)
        .await
        .fs_context("writing payload config", path)
}

/// Runs the host runtime to turn the config at `config_path` into a blob.
///
/// Returns the blob path. A non-zero exit is fatal for the whole build since
/// every platform shares the blob.
pub async fn materialize<R: CommandRunner>(
    runner: &R,
    node_program: &str,
    manifest: &PayloadManifest,
    config_path: &Path,
) -> Result<PathBuf> {
    log::info!("Generating payload blob {}", manifest.output.display());

    let invocation = Invocation::new(node_program)
        .arg("--experimental-sea-config")
        .arg(config_path);
    run_checked(runner, &invocation).await?;

    match tokio::fs::try_exists(&manifest.output).await {
        Ok(true) => Ok(manifest.output.clone()),
        Ok(false) => Err(Error::GenericError(format!(
            "`{}` succeeded but wrote no blob to {}",
            invocation.display(),
            manifest.output.display()
        ))),
        Err(e) => Err(e).fs_context("checking payload blob", &manifest.output),
    }
}
