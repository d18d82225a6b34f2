//! Runtime binary cache.
//!
//! Clean runtime binaries are kept under the cache root, one file per
//! `(version, platform)` pair, named `node-v<version>-<platform>[.exe]`.
//! Every entry has had its code signature stripped before it was published,
//! so anything served from here can be injected into directly.
//!
//! Entries are published by renaming a fully prepared file into place.
//! Concurrent populations of the same entry race benignly: the last rename
//! wins and readers never observe a partial file.

mod extract;
mod source;

pub use source::{ArchiveSource, ArchiveStream};

use crate::packager::binary::strip_file;
use crate::packager::error::{ErrorExt, Result};
use crate::packager::settings::{ArchiveFormat, DEFAULT_DIST_URL, PlatformTarget};
use crate::packager::utils::fs::{copy_file, create_dir_all};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Resolves clean runtime binaries, fetching and caching them on demand.
pub struct BinaryCache<S> {
    source: Arc<S>,
    cache_dir: PathBuf,
    dist_url: String,
    skip_cache: bool,
}

impl<S: ArchiveSource> BinaryCache<S> {
    /// Creates a cache rooted at `cache_dir` that fetches through `source`.
    pub fn new(source: Arc<S>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            cache_dir: cache_dir.into(),
            dist_url: DEFAULT_DIST_URL.to_string(),
            skip_cache: false,
        }
    }

    /// Sets the distribution base URL.
    pub fn with_dist_url(mut self, dist_url: impl Into<String>) -> Self {
        self.dist_url = dist_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Ignores existing entries and always refetches (the entry is still
    /// republished afterwards).
    pub fn with_skip_cache(mut self, skip_cache: bool) -> Self {
        self.skip_cache = skip_cache;
        self
    }

    /// Returns the cache root.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Canonical cache file for `(version, platform)`.
    pub fn cache_path(&self, version: &str, platform: &PlatformTarget) -> PathBuf {
        self.cache_dir.join(format!(
            "node-v{version}-{platform}{}",
            platform.exe_extension()
        ))
    }

    /// Distribution archive URL for `(version, platform)`.
    pub fn archive_url(&self, version: &str, platform: &PlatformTarget) -> String {
        format!(
            "{}/v{version}/node-v{version}-{platform}.{}",
            self.dist_url,
            platform.archive_format().extension()
        )
    }

    /// Path of the runtime binary inside the distribution archive.
    pub fn member_path(version: &str, platform: &PlatformTarget) -> String {
        if platform.is_windows() {
            format!("node-v{version}-{platform}/node.exe")
        } else {
            format!("node-v{version}-{platform}/bin/node")
        }
    }

    /// Places a fresh copy of the clean runtime for `(version, platform)` at
    /// `destination` and returns that path.
    ///
    /// A cache hit never touches the network. Only a missing entry triggers
    /// a fetch; any other filesystem error is returned.
    pub async fn obtain(
        &self,
        version: &str,
        platform: &PlatformTarget,
        destination: &Path,
    ) -> Result<PathBuf> {
        let cached = self.cache_path(version, platform);

        if !self.skip_cache {
            match copy_file(&cached, destination).await {
                Ok(()) => {
                    log::info!("Using cached runtime {}", cached.display());
                    return Ok(destination.to_path_buf());
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    log::debug!("Cache miss for {}", cached.display());
                }
                Err(e) => return Err(e).fs_context("copying cached runtime", &cached),
            }
        }

        self.populate(version, platform).await?;

        copy_file(&cached, destination)
            .await
            .fs_context("copying cached runtime", &cached)?;
        Ok(destination.to_path_buf())
    }

    /// Fetches, extracts and strips the runtime, then publishes it.
    async fn populate(&self, version: &str, platform: &PlatformTarget) -> Result<()> {
        log::info!("Fetching runtime v{} for {}", version, platform);
        create_dir_all(&self.cache_dir, false).await?;

        let url = self.archive_url(version, platform);
        let member = Self::member_path(version, platform);
        let reader = self.source.open(&url).await?;

        let staging = tempfile::Builder::new()
            .prefix(".sea-extract-")
            .tempdir_in(&self.cache_dir)
            .fs_context("creating staging directory", &self.cache_dir)?;
        let extracted = staging
            .path()
            .join(format!("node{}", platform.exe_extension()));

        match platform.archive_format() {
            ArchiveFormat::TarGz => {
                extract::tar_gz_member(reader, &member, &extracted, &url).await?;
            }
            ArchiveFormat::Zip => {
                extract::zip_member(reader, &member, &extracted, staging.path(), &url).await?;
            }
        }

        strip_file(&extracted, platform.family()).await?;

        let cached = self.cache_path(version, platform);
        tokio::fs::rename(&extracted, &cached)
            .await
            .fs_context("publishing cached runtime", &cached)?;
        log::debug!("Cached {}", cached.display());

        if let Err(e) = staging.close() {
            log::warn!("Failed to remove staging directory: {}", e);
        }
        Ok(())
    }
}
