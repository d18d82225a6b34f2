//! Asset map construction.
//!
//! Assets are embedded under a logical key (a forward-slash relative path)
//! and resolved at build time to an absolute source path.

use crate::packager::error::{Error, ErrorExt, Result};
use path_absolutize::Absolutize;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// One entry of a build-tool manifest (`.vite/manifest.json` layout).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestChunk {
    file: String,
    #[serde(default)]
    is_entry: bool,
    #[serde(default)]
    css: Vec<String>,
    #[serde(default)]
    assets: Vec<String>,
}

fn malformed(path: &Path, reason: impl Into<String>) -> Error {
    Error::MalformedManifest {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Joins the normal components of `path` with `/`.
fn asset_key(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Validates a manifest-relative reference and returns its key.
fn relative_key(manifest: &Path, reference: &str) -> Result<String> {
    let path = Path::new(reference);
    if reference.is_empty() {
        return Err(malformed(manifest, "empty file reference"));
    }
    if path.is_absolute() || path.has_root() {
        return Err(malformed(
            manifest,
            format!("`{reference}` must be relative to the manifest"),
        ));
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(malformed(
            manifest,
            format!("`{reference}` escapes the manifest directory"),
        ));
    }
    Ok(asset_key(path))
}

/// Expands a build-tool asset manifest into an explicit asset map.
///
/// The map holds the manifest itself, every `file`, `css` and `assets`
/// output it lists, and the source key of each entry marked `isEntry`.
/// Keys are relative to the manifest's directory; values are absolute.
/// Whether the files exist is left to payload materialization.
pub async fn expand_asset_manifest(manifest_path: &Path) -> Result<BTreeMap<String, PathBuf>> {
    log::info!("Expanding asset manifest {}", manifest_path.display());

    let manifest_path = manifest_path
        .absolutize()
        .fs_context("resolving asset manifest", manifest_path)?
        .into_owned();
    let contents = tokio::fs::read(&manifest_path)
        .await
        .fs_context("reading asset manifest", &manifest_path)?;
    let chunks: BTreeMap<String, ManifestChunk> = serde_json::from_slice(&contents)
        .map_err(|e| malformed(&manifest_path, e.to_string()))?;

    let base = manifest_path
        .parent()
        .ok_or_else(|| malformed(&manifest_path, "manifest has no parent directory"))?;
    let file_name = manifest_path
        .file_name()
        .ok_or_else(|| malformed(&manifest_path, "manifest has no file name"))?;

    let mut assets = BTreeMap::new();
    assets.insert(
        file_name.to_string_lossy().into_owned(),
        manifest_path.clone(),
    );

    for (key, chunk) in &chunks {
        let mut references: Vec<&str> = vec![chunk.file.as_str()];
        references.extend(chunk.css.iter().map(String::as_str));
        references.extend(chunk.assets.iter().map(String::as_str));
        if chunk.is_entry {
            references.push(key.as_str());
        }

        for reference in references {
            let asset = relative_key(&manifest_path, reference)?;
            let source = base.join(&asset);
            assets.insert(asset, source);
        }
    }

    log::debug!("Asset manifest lists {} files", assets.len());
    Ok(assets)
}

/// Builds the asset map for explicitly listed files.
///
/// Relative paths keep their relative path as key; absolute paths are keyed
/// by file name.
pub fn explicit_assets(paths: &[PathBuf]) -> Result<BTreeMap<String, PathBuf>> {
    let mut assets = BTreeMap::new();
    for path in paths {
        let key = if path.is_absolute() {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            asset_key(path)
        };
        if key.is_empty() {
            return Err(Error::GenericError(format!(
                "cannot derive an asset name from {}",
                path.display()
            )));
        }

        let source = path
            .absolutize()
            .fs_context("resolving asset", path)?
            .into_owned();
        assets.insert(key, source);
    }
    Ok(assets)
}
