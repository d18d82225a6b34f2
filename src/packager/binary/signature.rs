//! Code signature probing and removal.
//!
//! Runtime binaries ship signed for macOS and Windows. Any mutation would
//! leave a stale signature behind, so the cache only ever stores stripped
//! copies. ELF binaries carry no embedded signature and pass through.

use super::{BinaryFormat, macho, pe};
use crate::packager::error::{Error, ErrorExt, Result};
use crate::packager::settings::PlatformFamily;
use std::path::Path;

/// Whether `bytes` is an image carrying a code signature.
///
/// Images that cannot be parsed report `false`.
pub fn is_signed(bytes: &[u8]) -> bool {
    let probe = match BinaryFormat::detect(bytes) {
        BinaryFormat::MachO => macho::has_signature(bytes),
        BinaryFormat::Pe => pe::has_signature(bytes),
        BinaryFormat::Elf | BinaryFormat::Unknown => Ok(false),
    };
    probe.unwrap_or_else(|reason| {
        log::debug!("Signature probe failed: {}", reason);
        false
    })
}

/// Removes a code signature from `bytes` in place.
///
/// macOS targets must be Mach-O and Windows targets must be PE; anything
/// else for those families is rejected. Returns whether a signature was
/// removed.
pub fn strip_bytes(bytes: &mut Vec<u8>, family: PlatformFamily) -> std::result::Result<bool, String> {
    let format = BinaryFormat::detect(bytes);
    match (family, format) {
        (PlatformFamily::MacOs, BinaryFormat::MachO) => macho::strip_signature(bytes),
        (PlatformFamily::Windows, BinaryFormat::Pe) => pe::strip_signature(bytes),
        (PlatformFamily::MacOs, other) => Err(format!("expected a Mach-O image, found {other}")),
        (PlatformFamily::Windows, other) => Err(format!("expected a PE image, found {other}")),
        (_, BinaryFormat::MachO) => macho::strip_signature(bytes),
        (_, BinaryFormat::Pe) => pe::strip_signature(bytes),
        (_, BinaryFormat::Elf | BinaryFormat::Unknown) => Ok(false),
    }
}

/// Removes a code signature from the file at `path`, rewriting it only when
/// something was removed.
pub async fn strip_file(path: &Path, family: PlatformFamily) -> Result<bool> {
    log::info!("Stripping code signature from {}", path.display());

    let mut bytes = tokio::fs::read(path)
        .await
        .fs_context("reading runtime binary", path)?;

    let stripped = strip_bytes(&mut bytes, family).map_err(|reason| Error::Strip {
        path: path.to_path_buf(),
        reason,
    })?;

    if stripped {
        tokio::fs::write(path, &bytes)
            .await
            .fs_context("writing stripped binary", path)?;
        log::debug!("Removed signature, {} bytes remain", bytes.len());
    } else {
        log::debug!("{} carries no signature", path.display());
    }

    Ok(stripped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elf_passes_through_untouched() {
        let mut bytes = b"\x7fELF\x02\x01\x01 plain runtime".to_vec();
        let original = bytes.clone();
        assert_eq!(strip_bytes(&mut bytes, PlatformFamily::Linux), Ok(false));
        assert_eq!(bytes, original);
        assert!(!is_signed(&bytes));
    }

    #[test]
    fn macos_target_requires_macho() {
        let mut bytes = b"\x7fELF\x02\x01\x01".to_vec();
        let err = strip_bytes(&mut bytes, PlatformFamily::MacOs).unwrap_err();
        assert!(err.contains("Mach-O"));
    }

    #[test]
    fn windows_target_requires_pe() {
        let mut bytes = b"\x7fELF\x02\x01\x01".to_vec();
        assert!(strip_bytes(&mut bytes, PlatformFamily::Windows).is_err());
    }

    #[test]
    fn unparsable_image_probes_unsigned() {
        assert!(!is_signed(b"MZ"));
    }

    #[tokio::test]
    async fn strip_file_reports_path_on_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("node");
        tokio::fs::write(&path, b"not a binary").await.unwrap();

        let err = strip_file(&path, PlatformFamily::MacOs).await.unwrap_err();
        match err {
            Error::Strip { path: p, .. } => assert_eq!(p, path),
            other => panic!("unexpected error: {other}"),
        }
    }
}
