//! Runtime binary manipulation.
//!
//! - [`signature`]: probe for and remove existing code signatures
//! - [`inject`]: attach a payload blob to a runtime binary and flip its fuse

pub mod inject;
mod macho;
mod pe;
pub mod signature;

pub use inject::{
    BlobInjector, InjectionTarget, MACHO_SEGMENT_NAME, RESOURCE_NAME, check_fuse, fuse_consumed,
    sentinel_fuse,
};
pub use signature::{is_signed, strip_bytes, strip_file};

use std::fmt;

/// Executable container format, detected from magic bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryFormat {
    /// Mach-O, thin or universal
    MachO,
    /// Portable Executable (MZ stub + PE header)
    Pe,
    /// ELF
    Elf,
    /// Anything else
    Unknown,
}

impl BinaryFormat {
    /// Identifies the container format of `bytes`.
    pub fn detect(bytes: &[u8]) -> Self {
        match bytes {
            [0xcf, 0xfa, 0xed, 0xfe, ..]
            | [0xce, 0xfa, 0xed, 0xfe, ..]
            | [0xfe, 0xed, 0xfa, 0xcf, ..]
            | [0xfe, 0xed, 0xfa, 0xce, ..]
            | [0xca, 0xfe, 0xba, 0xbe, ..] => BinaryFormat::MachO,
            [b'M', b'Z', ..] => BinaryFormat::Pe,
            [0x7f, b'E', b'L', b'F', ..] => BinaryFormat::Elf,
            _ => BinaryFormat::Unknown,
        }
    }
}

impl fmt::Display for BinaryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BinaryFormat::MachO => "Mach-O",
            BinaryFormat::Pe => "PE",
            BinaryFormat::Elf => "ELF",
            BinaryFormat::Unknown => "unknown",
        };
        f.write_str(name)
    }
}
