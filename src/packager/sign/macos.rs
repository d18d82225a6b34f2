//! macOS signing and notarization through `rcodesign`.
//!
//! `rcodesign` runs on every host, so macOS executables can be signed from
//! Linux CI as well.

use super::SIGNING_TOOL;
use crate::packager::error::{Error, ErrorExt, Result};
use crate::packager::settings::{CertificateSource, SigningCredentials, mask};
use crate::packager::utils::fs::remove_file_best_effort;
use crate::packager::utils::process::{CommandRunner, Invocation, run_checked};
use base64::Engine;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

/// Certificate file for the duration of one signing run.
///
/// A base64 certificate is decoded into a temp file that lives as long as
/// this value.
enum CertificateFile<'a> {
    OnDisk(&'a Path),
    Decoded(NamedTempFile),
}

impl CertificateFile<'_> {
    fn path(&self) -> &Path {
        match self {
            CertificateFile::OnDisk(path) => path,
            CertificateFile::Decoded(file) => file.path(),
        }
    }
}

fn secret_file(prefix: &str, contents: &[u8]) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .tempfile()
        .map_err(|e| Error::GenericError(format!("failed to create temporary file: {e}")))?;
    file.as_file_mut()
        .write_all(contents)
        .fs_context("writing temporary file", file.path())?;
    Ok(file)
}

fn certificate_file(source: &CertificateSource) -> Result<CertificateFile<'_>> {
    match source {
        CertificateSource::Path(path) => Ok(CertificateFile::OnDisk(path)),
        CertificateSource::Base64(encoded) => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|e| {
                    Error::GenericError(format!(
                        "Invalid APPLE_CERTIFICATE (not valid base64): {}",
                        e
                    ))
                })?;
            log::debug!("Decoded {} byte certificate from environment", bytes.len());
            Ok(CertificateFile::Decoded(secret_file(".sea-cert-", &bytes)?))
        }
    }
}

/// Signs `binary` with hardened runtime enabled.
///
/// The password is handed over in a file, never on the command line.
pub async fn sign<R: CommandRunner>(
    runner: &R,
    binary: &Path,
    credentials: &SigningCredentials,
) -> Result<()> {
    let (Some(team), Some(source), Some(password)) = (
        credentials.team(),
        credentials.certificate_source(),
        credentials.password(),
    ) else {
        return Err(Error::GenericError(
            "signing credentials are incomplete".to_string(),
        ));
    };

    log::info!("Signing {} (team {})", binary.display(), mask(team));

    let certificate = certificate_file(source)?;
    let password_file = secret_file(".sea-p12-pass-", password.as_bytes())?;

    let invocation = Invocation::new(SIGNING_TOOL)
        .arg("sign")
        .arg("--team-name")
        .arg(team)
        .arg("--p12-file")
        .arg(certificate.path())
        .arg("--p12-password-file")
        .arg(password_file.path())
        .arg("--code-signature-flags")
        .arg("runtime")
        .arg(binary);
    run_checked(runner, &invocation).await?;

    log::info!("✓ Signed {}", binary.display());
    Ok(())
}

/// Zips `binary` for submission, preserving its executable mode.
///
/// The archive is written next to the binary as `<file name>.zip`.
pub async fn create_notarization_archive(binary: &Path) -> Result<PathBuf> {
    let file_name = binary
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            Error::GenericError(format!("{} has no file name", binary.display()))
        })?;
    let archive = binary.with_file_name(format!("{file_name}.zip"));

    let source = binary.to_path_buf();
    let target = archive.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let out = File::create(&target).fs_context("creating notarization archive", &target)?;
        let mut zip = ZipWriter::new(out);
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o755);
        zip.start_file(file_name, options)?;

        let mut input = File::open(&source).fs_context("opening signed binary", &source)?;
        io::copy(&mut input, &mut zip).fs_context("compressing signed binary", &source)?;
        zip.finish()?;
        Ok(())
    })
    .await
    .map_err(|e| Error::TaskPanicked(format!("notarization archive: {e}")))??;

    Ok(archive)
}

/// Submits `binary` for notarization and blocks until the service is done.
///
/// The temporary archive is removed whether or not submission succeeds.
pub async fn notarize<R: CommandRunner>(runner: &R, binary: &Path, api_key: &Path) -> Result<()> {
    log::info!("Notarizing {} (this can take several minutes)", binary.display());

    let archive = create_notarization_archive(binary).await?;
    let invocation = Invocation::new(SIGNING_TOOL)
        .arg("notary-submit")
        .arg("--api-key-path")
        .arg(api_key)
        .arg("--wait")
        .arg(&archive);
    let result = run_checked(runner, &invocation).await;

    remove_file_best_effort(&archive).await;
    result?;

    log::info!("✓ Notarized {}", binary.display());
    Ok(())
}
