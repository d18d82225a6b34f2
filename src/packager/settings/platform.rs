//! Target platform keys.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Operating-system family of a target platform.
///
/// Decides archive format, binary extension, signature format and whether a
/// signing path exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlatformFamily {
    /// `darwin-*` targets (Mach-O)
    MacOs,
    /// `win-*` targets (PE)
    Windows,
    /// `linux-*` targets (ELF)
    Linux,
    /// Anything the distribution server knows about that we don't
    Other,
}

/// Archive container the runtime is distributed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// `.zip`, Windows targets
    Zip,
    /// `.tar.gz`, everything else
    TarGz,
}

impl ArchiveFormat {
    /// File extension used in the archive name.
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::TarGz => "tar.gz",
        }
    }
}

/// A target platform in runtime distribution notation, e.g. `linux-x64`.
///
/// Unknown values are kept as opaque strings; the distribution server is the
/// authority on which platforms exist.
///
/// # Examples
///
/// ```
/// use kodegen_bundler_sea::packager::{PlatformFamily, PlatformTarget};
///
/// let target = PlatformTarget::parse("win-x64");
/// assert_eq!(target.family(), PlatformFamily::Windows);
/// assert_eq!(target.exe_extension(), ".exe");
/// assert_eq!(target.to_string(), "win-x64");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PlatformTarget {
    os: String,
    arch: String,
}

impl PlatformTarget {
    /// Creates a platform from its parts.
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Parses an `os-arch` key. Never fails; a key without `-` becomes an
    /// os with an empty arch.
    pub fn parse(key: &str) -> Self {
        let key = key.trim();
        match key.split_once('-') {
            Some((os, arch)) => Self::new(os, arch),
            None => Self::new(key, ""),
        }
    }

    /// The platform this process is running on.
    pub fn host() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            "windows" => "win",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "x64",
            "aarch64" => "arm64",
            "x86" => "x86",
            "arm" => "armv7l",
            "powerpc64" => "ppc64le",
            other => other,
        };
        Self::new(os, arch)
    }

    /// Operating-system part of the key.
    pub fn os(&self) -> &str {
        &self.os
    }

    /// Architecture part of the key.
    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// Operating-system family.
    pub fn family(&self) -> PlatformFamily {
        match self.os.as_str() {
            "darwin" | "macos" => PlatformFamily::MacOs,
            "win" | "windows" => PlatformFamily::Windows,
            "linux" => PlatformFamily::Linux,
            _ => PlatformFamily::Other,
        }
    }

    /// Whether this is a Windows target.
    pub fn is_windows(&self) -> bool {
        self.family() == PlatformFamily::Windows
    }

    /// Executable file extension, including the dot (empty off Windows).
    pub fn exe_extension(&self) -> &'static str {
        if self.is_windows() { ".exe" } else { "" }
    }

    /// Archive format the runtime for this platform ships in.
    pub fn archive_format(&self) -> ArchiveFormat {
        if self.is_windows() {
            ArchiveFormat::Zip
        } else {
            ArchiveFormat::TarGz
        }
    }
}

impl fmt::Display for PlatformTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.arch.is_empty() {
            write!(f, "{}", self.os)
        } else {
            write!(f, "{}-{}", self.os, self.arch)
        }
    }
}

impl FromStr for PlatformTarget {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}
