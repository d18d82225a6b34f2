//! Payload injection.
//!
//! A runtime binary built for single-executable use contains one fuse string,
//! `<sentinel>:0`. Injection attaches the payload where the runtime looks it
//! up at startup (an ELF note, a PE `RCDATA` resource or a section in the
//! `NODE_SEA` Mach-O segment) and flips the fuse to `:1`.
//!
//! Writing those structures is delegated to `postject`. The fuse is checked
//! before the tool runs, since it silently picks the first match, and again
//! afterwards so a binary that claims a payload it does not carry is never
//! shipped.

use crate::packager::error::{Error, ErrorExt, Result};
use crate::packager::settings::{PlatformFamily, PlatformTarget};
use crate::packager::utils::process::{CommandRunner, Invocation, run_checked};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// The fuse is stored in two halves so that scanning this program's own
// executable never finds a complete sentinel.
const FUSE_PREFIX: &str = "NODE_SEA_FUSE_";
const FUSE_SUFFIX: &str = "fce680ab2cc467b6e072b8b5df1996b2";

/// Resource name the runtime looks the payload up by.
pub const RESOURCE_NAME: &str = "NODE_SEA_BLOB";

/// Mach-O segment that holds the payload section.
pub const MACHO_SEGMENT_NAME: &str = "NODE_SEA";

/// Returns the full sentinel fuse.
pub fn sentinel_fuse() -> String {
    [FUSE_PREFIX, FUSE_SUFFIX].concat()
}

/// Where the payload goes in a given platform's binary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InjectionTarget {
    /// Resource name
    pub resource: &'static str,
    /// Mach-O segment name; None for formats without segments
    pub segment: Option<&'static str>,
}

impl InjectionTarget {
    /// Target for `platform`: macOS binaries address the payload through a
    /// named segment, everything else by resource name alone.
    pub fn for_platform(platform: &PlatformTarget) -> Self {
        let segment = match platform.family() {
            PlatformFamily::MacOs => Some(MACHO_SEGMENT_NAME),
            _ => None,
        };
        Self {
            resource: RESOURCE_NAME,
            segment,
        }
    }
}

fn find_all(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return Vec::new();
    }
    haystack
        .windows(needle.len())
        .enumerate()
        .filter(|(_, window)| *window == needle)
        .map(|(offset, _)| offset)
        .collect()
}

/// State byte following each occurrence of the fuse.
fn fuse_states(bytes: &[u8]) -> Vec<Option<u8>> {
    let marker = format!("{}:", sentinel_fuse());
    find_all(bytes, marker.as_bytes())
        .into_iter()
        .map(|offset| bytes.get(offset + marker.len()).copied())
        .collect()
}

/// Checks that `bytes` holds exactly one fuse and that it is unused.
///
/// Zero or several fuses fail with [`Error::Sentinel`], a single consumed
/// one with [`Error::AlreadyInjected`].
pub fn check_fuse(bytes: &[u8]) -> Result<()> {
    match fuse_states(bytes).as_slice() {
        [Some(b'0')] => Ok(()),
        [Some(b'1')] => Err(Error::AlreadyInjected),
        found => Err(Error::Sentinel { found: found.len() }),
    }
}

/// Whether the fuse in `bytes` has been flipped and no unused copy remains.
pub fn fuse_consumed(bytes: &[u8]) -> bool {
    let states = fuse_states(bytes);
    states.contains(&Some(b'1')) && !states.contains(&Some(b'0'))
}

/// Injects one payload blob into any number of runtime binaries.
///
/// The blob stays on disk; each platform task hands its path to the
/// injector tool.
pub struct BlobInjector<R> {
    runner: Arc<R>,
    program: String,
    blob_path: PathBuf,
}

impl<R: CommandRunner> BlobInjector<R> {
    /// Creates an injector that runs `program` (a `postject` executable)
    /// for the blob stored at `blob_path`.
    pub fn new(runner: Arc<R>, program: impl Into<String>, blob_path: PathBuf) -> Self {
        Self {
            runner,
            program: program.into(),
            blob_path,
        }
    }

    /// Injects the blob into the binary at `binary`, in place.
    pub async fn inject(&self, binary: &Path, platform: &PlatformTarget) -> Result<()> {
        log::info!("Injecting payload into {} ({})", binary.display(), platform);
        let target = InjectionTarget::for_platform(platform);

        let bytes = tokio::fs::read(binary)
            .await
            .fs_context("reading runtime binary", binary)?;
        check_fuse(&bytes)?;
        let original_len = bytes.len();
        drop(bytes);

        let mut invocation = Invocation::new(&self.program)
            .arg(binary)
            .arg(target.resource)
            .arg(&self.blob_path)
            .arg("--sentinel-fuse")
            .arg(sentinel_fuse());
        if let Some(segment) = target.segment {
            invocation = invocation.arg("--macho-segment-name").arg(segment);
        }
        run_checked(self.runner.as_ref(), &invocation).await?;

        let injected = tokio::fs::read(binary)
            .await
            .fs_context("reading injected binary", binary)?;
        if !fuse_consumed(&injected) {
            return Err(Error::GenericError(format!(
                "`{}` exited successfully but left the fuse in {} unset",
                self.program,
                binary.display()
            )));
        }

        log::debug!(
            "Injected payload into {} ({} -> {} bytes)",
            binary.display(),
            original_len,
            injected.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packager::utils::process::CommandOutput;
    use std::sync::Mutex;

    fn runtime_with_fuses(count: usize) -> Vec<u8> {
        let mut bytes = b"\x7fELF\x02\x01\x01\0runtime-code".to_vec();
        for _ in 0..count {
            bytes.extend_from_slice(format!("..{}:0..", sentinel_fuse()).as_bytes());
        }
        bytes.extend_from_slice(b"more-code");
        bytes
    }

    fn linux() -> PlatformTarget {
        PlatformTarget::parse("linux-x64")
    }

    /// Records every invocation. When `flip` is set it behaves like a
    /// successful injection and consumes the fuse of the named binary.
    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<Invocation>>,
        flip: bool,
    }

    impl CommandRunner for Recording {
        async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
            self.calls.lock().unwrap().push(invocation.clone());
            if self.flip {
                let path = PathBuf::from(&invocation.args()[0]);
                let bytes = std::fs::read(&path).unwrap();
                let fuse = format!("{}:0", sentinel_fuse());
                let at = find_all(&bytes, fuse.as_bytes())[0] + fuse.len() - 1;
                let mut bytes = bytes;
                bytes[at] = b'1';
                bytes.extend_from_slice(b"NODE_SEA_BLOB note");
                std::fs::write(&path, bytes).unwrap();
            }
            Ok(CommandOutput {
                code: Some(0),
                ..Default::default()
            })
        }
    }

    fn flipping() -> Arc<Recording> {
        Arc::new(Recording {
            flip: true,
            ..Default::default()
        })
    }

    #[test]
    fn sentinel_is_split_at_rest() {
        assert!(!FUSE_PREFIX.contains(FUSE_SUFFIX));
        assert_eq!(
            sentinel_fuse(),
            "NODE_SEA_FUSE_fce680ab2cc467b6e072b8b5df1996b2"
        );
    }

    #[test]
    fn fuse_count_is_checked() {
        assert!(check_fuse(&runtime_with_fuses(1)).is_ok());
        assert!(matches!(
            check_fuse(&runtime_with_fuses(0)),
            Err(Error::Sentinel { found: 0 })
        ));
        assert!(matches!(
            check_fuse(&runtime_with_fuses(2)),
            Err(Error::Sentinel { found: 2 })
        ));
    }

    #[test]
    fn consumed_fuse_is_reported_as_already_injected() {
        let consumed = format!("code {}:1 code", sentinel_fuse()).into_bytes();
        assert!(matches!(check_fuse(&consumed), Err(Error::AlreadyInjected)));
        assert!(fuse_consumed(&consumed));
        assert!(!fuse_consumed(&runtime_with_fuses(1)));
    }

    #[test]
    fn macos_targets_carry_segment_name() {
        let target = InjectionTarget::for_platform(&PlatformTarget::parse("darwin-arm64"));
        assert_eq!(target.segment, Some(MACHO_SEGMENT_NAME));
        assert_eq!(InjectionTarget::for_platform(&linux()).segment, None);
    }

    #[tokio::test]
    async fn invocation_passes_resource_fuse_and_segment() {
        let tmp = tempfile::tempdir().unwrap();
        let binary = tmp.path().join("node");
        tokio::fs::write(&binary, runtime_with_fuses(1)).await.unwrap();
        let runner = flipping();

        let injector = BlobInjector::new(runner.clone(), "postject", tmp.path().join("app.blob"));
        injector
            .inject(&binary, &PlatformTarget::parse("darwin-x64"))
            .await
            .unwrap();

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let line = calls[0].display();
        assert!(line.starts_with(&format!("postject {} NODE_SEA_BLOB ", binary.display())));
        assert!(line.contains(&format!("--sentinel-fuse {}", sentinel_fuse())));
        assert!(line.ends_with("--macho-segment-name NODE_SEA"));
    }

    #[tokio::test]
    async fn linux_invocation_has_no_segment() {
        let tmp = tempfile::tempdir().unwrap();
        let binary = tmp.path().join("node");
        tokio::fs::write(&binary, runtime_with_fuses(1)).await.unwrap();
        let runner = flipping();

        BlobInjector::new(runner.clone(), "/opt/tools/postject", tmp.path().join("app.blob"))
            .inject(&binary, &linux())
            .await
            .unwrap();

        let line = runner.calls.lock().unwrap()[0].display();
        assert!(line.starts_with("/opt/tools/postject "));
        assert!(!line.contains("--macho-segment-name"));
    }

    #[tokio::test]
    async fn sentinel_is_validated_before_running_the_tool() {
        let tmp = tempfile::tempdir().unwrap();
        let binary = tmp.path().join("node");
        tokio::fs::write(&binary, runtime_with_fuses(2)).await.unwrap();
        let runner = flipping();

        let injector = BlobInjector::new(runner.clone(), "postject", tmp.path().join("app.blob"));
        let err = injector.inject(&binary, &linux()).await.unwrap_err();
        assert!(matches!(err, Error::Sentinel { found: 2 }));
        assert!(runner.calls.lock().unwrap().is_empty());
        assert_eq!(tokio::fs::read(&binary).await.unwrap(), runtime_with_fuses(2));
    }

    #[tokio::test]
    async fn binary_left_untouched_by_the_tool_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let binary = tmp.path().join("node");
        tokio::fs::write(&binary, runtime_with_fuses(1)).await.unwrap();
        let runner = Arc::new(Recording::default());

        let injector = BlobInjector::new(runner.clone(), "postject", tmp.path().join("app.blob"));
        let err = injector.inject(&binary, &linux()).await.unwrap_err();
        assert!(matches!(err, Error::GenericError(ref msg) if msg.contains("fuse")));
        assert_eq!(runner.calls.lock().unwrap().len(), 1);
    }
}
