//! Runtime binary extraction from distribution archives.
//!
//! Only the single runtime member is written out; nothing else in the
//! archive touches the disk.

use super::ArchiveStream;
use crate::packager::error::{Error, ErrorExt, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tokio_util::io::SyncIoBridge;
use zip::ZipArchive;
use zip::result::ZipError;

fn archive_error(archive: &str, e: impl std::fmt::Display) -> Error {
    Error::Archive(format!("{archive}: {e}"))
}

fn join_error(e: tokio::task::JoinError) -> Error {
    Error::TaskPanicked(format!("archive extraction: {e}"))
}

/// Extracts `member` from a gzip-compressed tar stream into `dest`.
///
/// Decompression runs on the blocking pool, pulling from the async stream as
/// it goes, so the archive is never buffered whole.
pub async fn tar_gz_member(
    reader: ArchiveStream,
    member: &str,
    dest: &Path,
    archive: &str,
) -> Result<()> {
    let bridge = SyncIoBridge::new(reader);
    let member = member.to_string();
    let dest = dest.to_path_buf();
    let archive = archive.to_string();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let gz = flate2::read::GzDecoder::new(bridge);
        let mut tar = tar::Archive::new(gz);
        let entries = tar.entries().map_err(|e| archive_error(&archive, e))?;

        for entry in entries {
            let mut entry = entry.map_err(|e| archive_error(&archive, e))?;
            let path = entry.path().map_err(|e| archive_error(&archive, e))?;
            if path.as_ref() != Path::new(&member) {
                continue;
            }

            log::debug!("Extracting {} from {}", member, archive);
            let mut out = File::create(&dest).fs_context("creating extracted binary", &dest)?;
            io::copy(&mut entry, &mut out).map_err(|e| archive_error(&archive, e))?;
            return Ok(());
        }

        Err(Error::MemberNotFound { archive, member })
    })
    .await
    .map_err(join_error)?
}

/// Extracts `member` from a zip stream into `dest`.
///
/// Zip needs random access to its central directory, so the stream is first
/// spooled to a file inside `staging`.
pub async fn zip_member(
    mut reader: ArchiveStream,
    member: &str,
    dest: &Path,
    staging: &Path,
    archive: &str,
) -> Result<()> {
    let spooled: PathBuf = staging.join("archive.zip");
    {
        let mut file = tokio::fs::File::create(&spooled)
            .await
            .fs_context("creating archive spool", &spooled)?;
        let bytes = tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(|e| archive_error(archive, e))?;
        log::debug!("Downloaded {} bytes from {}", bytes, archive);
    }

    let member = member.to_string();
    let dest = dest.to_path_buf();
    let archive = archive.to_string();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let file = File::open(&spooled).fs_context("opening archive spool", &spooled)?;
        let mut zip = ZipArchive::new(file)?;
        let mut entry = match zip.by_name(&member) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                return Err(Error::MemberNotFound { archive, member });
            }
            Err(e) => return Err(e.into()),
        };

        log::debug!("Extracting {} from {}", member, archive);
        let mut out = File::create(&dest).fs_context("creating extracted binary", &dest)?;
        io::copy(&mut entry, &mut out).map_err(|e| archive_error(&archive, e))?;
        Ok(())
    })
    .await
    .map_err(join_error)?
}
