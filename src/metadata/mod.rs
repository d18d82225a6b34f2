//! Entrypoint resolution from a package directory or a single script.

use crate::packager::error::{Error, ErrorExt, Result};
use path_absolutize::Absolutize;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

/// Version used when the entrypoint is a bare script.
pub const DEFAULT_VERSION: &str = "0.0.0";

/// Package descriptor file name.
pub const PACKAGE_DESCRIPTOR: &str = "package.json";

/// What to package and under which name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entrypoint {
    /// Output name (package name without scope, or script file stem)
    pub name: String,

    /// Application version, exposed to the bundle as `process.env.APP_VERSION`
    pub version: String,

    /// Absolute path of the main module
    pub main: PathBuf,

    /// Package descriptor the entrypoint came from, if any
    pub descriptor: Option<PathBuf>,
}

/// The `package.json` fields the packager reads.
#[derive(Debug, Deserialize)]
struct PackageJson {
    name: Option<String>,
    version: Option<String>,
    main: Option<String>,
    bin: Option<BinField>,
}

/// `bin` is either a single path or a map of command name to path.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BinField {
    Single(String),
    Named(BTreeMap<String, String>),
}

fn malformed(path: &Path, reason: impl Into<String>) -> Error {
    Error::MalformedManifest {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Strips an npm scope: `@acme/tool` becomes `tool`.
fn unscoped(name: &str) -> &str {
    match name.strip_prefix('@').and_then(|rest| rest.split_once('/')) {
        Some((_, bare)) => bare,
        None => name,
    }
}

/// Picks the main module: `bin` wins over `main`.
///
/// With several named binaries the one matching the package name is used,
/// falling back to the first in name order.
fn entry_path<'a>(package: &'a PackageJson, name: &str) -> Option<&'a str> {
    match &package.bin {
        Some(BinField::Single(path)) => Some(path.as_str()),
        Some(BinField::Named(bins)) => bins
            .get(name)
            .or_else(|| bins.values().next())
            .map(String::as_str),
        None => package.main.as_deref(),
    }
}

/// Reads and validates the package descriptor in `dir`.
async fn from_package_dir(dir: &Path) -> Result<Entrypoint> {
    let descriptor = dir.join(PACKAGE_DESCRIPTOR);
    log::info!("Reading {}", descriptor.display());

    let contents = tokio::fs::read(&descriptor)
        .await
        .fs_context("reading package descriptor", &descriptor)?;
    let package: PackageJson =
        serde_json::from_slice(&contents).map_err(|e| malformed(&descriptor, e.to_string()))?;

    let name = package
        .name
        .as_deref()
        .map(unscoped)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| malformed(&descriptor, "missing `name`"))?
        .to_string();
    let version = package
        .version
        .clone()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| malformed(&descriptor, "missing `version`"))?;
    let entry = entry_path(&package, &name)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| malformed(&descriptor, "neither `bin` nor `main` is set"))?;

    let main = dir
        .join(entry)
        .absolutize()
        .fs_context("resolving main module", dir.join(entry))?
        .into_owned();

    Ok(Entrypoint {
        name,
        version,
        main,
        descriptor: Some(descriptor),
    })
}

/// Resolves what to package from `path`.
///
/// A directory is read as a package (`package.json` must carry `name`,
/// `version` and `bin` or `main`). A file is used directly, named after its
/// stem with version [`DEFAULT_VERSION`]. The main module must exist.
pub async fn resolve_entrypoint(path: &Path) -> Result<Entrypoint> {
    let path = path
        .absolutize()
        .fs_context("resolving entrypoint", path)?
        .into_owned();
    let metadata = tokio::fs::metadata(&path)
        .await
        .fs_context("reading entrypoint", &path)?;

    let entrypoint = if metadata.is_dir() {
        from_package_dir(&path).await?
    } else {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                Error::GenericError(format!("cannot derive a name from {}", path.display()))
            })?;
        Entrypoint {
            name,
            version: DEFAULT_VERSION.to_string(),
            main: path.clone(),
            descriptor: None,
        }
    };

    let exists = tokio::fs::try_exists(&entrypoint.main)
        .await
        .fs_context("reading main module", &entrypoint.main)?;
    if !exists {
        return Err(io::Error::from(io::ErrorKind::NotFound))
            .fs_context("reading main module", &entrypoint.main);
    }

    log::debug!(
        "Entrypoint {} v{} -> {}",
        entrypoint.name,
        entrypoint.version,
        entrypoint.main.display()
    );
    Ok(entrypoint)
}
