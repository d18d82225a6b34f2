//! Mach-O code signature removal.
//!
//! Removing a signature means:
//! 1. Dropping the `LC_CODE_SIGNATURE` load command (shifting later commands up)
//! 2. Decrementing `ncmds` / `sizeofcmds` in the header
//! 3. Shrinking `__LINKEDIT` so it ends where the signature began
//! 4. Truncating the signature blob from the end of the file
//!
//! Only thin, little-endian, 64-bit images are handled; that is every
//! runtime build distributed for macOS today.

use goblin::mach::Mach;
use goblin::mach::load_command::CommandVariant;

/// Size of `mach_header_64`.
const MACH_HEADER_64_SIZE: usize = 32;

/// Offset of `ncmds` in `mach_header_64`.
const NCMDS_OFFSET: usize = 16;

/// Offset of `sizeofcmds` in `mach_header_64`.
const SIZEOFCMDS_OFFSET: usize = 20;

/// Offset of `filesize` within `segment_command_64`.
const SEGMENT_FILESIZE_OFFSET: usize = 48;

/// Signature-relevant layout extracted from a parsed image.
struct Layout {
    ncmds: u32,
    sizeofcmds: usize,
    code_signature: Option<CodeSignature>,
    linkedit: Option<Linkedit>,
}

struct CodeSignature {
    cmd_offset: usize,
    cmdsize: usize,
    dataoff: usize,
    datasize: usize,
}

struct Linkedit {
    cmd_offset: usize,
    fileoff: u64,
}

fn locate(data: &[u8]) -> Result<Layout, String> {
    let macho = match Mach::parse(data).map_err(|e| format!("not a Mach-O image: {e}"))? {
        Mach::Binary(macho) => macho,
        Mach::Fat(_) => return Err("universal (fat) Mach-O binaries are not supported".into()),
    };

    if !macho.is_64 {
        return Err("32-bit Mach-O binaries are not supported".into());
    }
    if !macho.little_endian {
        return Err("big-endian Mach-O binaries are not supported".into());
    }

    let mut code_signature = None;
    let mut linkedit = None;
    for lc in &macho.load_commands {
        match &lc.command {
            CommandVariant::CodeSignature(cs) => {
                code_signature = Some(CodeSignature {
                    cmd_offset: lc.offset,
                    cmdsize: cs.cmdsize as usize,
                    dataoff: cs.dataoff as usize,
                    datasize: cs.datasize as usize,
                });
            }
            CommandVariant::Segment64(seg) if seg.segname.starts_with(b"__LINKEDIT") => {
                linkedit = Some(Linkedit {
                    cmd_offset: lc.offset,
                    fileoff: seg.fileoff,
                });
            }
            _ => {}
        }
    }

    Ok(Layout {
        ncmds: macho.header.ncmds as u32,
        sizeofcmds: macho.header.sizeofcmds as usize,
        code_signature,
        linkedit,
    })
}

/// Whether the image carries an `LC_CODE_SIGNATURE` load command.
pub fn has_signature(data: &[u8]) -> Result<bool, String> {
    Ok(locate(data)?.code_signature.is_some())
}

/// Removes the code signature in place. Returns whether one was present.
pub fn strip_signature(data: &mut Vec<u8>) -> Result<bool, String> {
    let layout = locate(data)?;
    let Some(sig) = layout.code_signature else {
        return Ok(false);
    };

    let cmds_end = MACH_HEADER_64_SIZE + layout.sizeofcmds;
    let sig_end = sig.dataoff + sig.datasize;
    if cmds_end > data.len() || sig.cmd_offset + sig.cmdsize > cmds_end {
        return Err("load commands extend past end of file".into());
    }
    if sig_end > data.len() {
        return Err("code signature extends past end of file".into());
    }

    // Later load commands slide up over the removed one; the vacated tail is zeroed.
    data.copy_within(sig.cmd_offset + sig.cmdsize..cmds_end, sig.cmd_offset);
    data[cmds_end - sig.cmdsize..cmds_end].fill(0);
    write_u32_le(data, NCMDS_OFFSET, layout.ncmds - 1);
    write_u32_le(data, SIZEOFCMDS_OFFSET, (layout.sizeofcmds - sig.cmdsize) as u32);

    if let Some(linkedit) = layout.linkedit {
        let cmd_offset = if linkedit.cmd_offset > sig.cmd_offset {
            linkedit.cmd_offset - sig.cmdsize
        } else {
            linkedit.cmd_offset
        };
        let filesize = (sig.dataoff as u64).saturating_sub(linkedit.fileoff);
        write_u64_le(data, cmd_offset + SEGMENT_FILESIZE_OFFSET, filesize);
    }

    if sig_end == data.len() {
        data.truncate(sig.dataoff);
    } else {
        data[sig.dataoff..sig_end].fill(0);
    }

    Ok(true)
}

fn write_u32_le(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn write_u64_le(data: &mut [u8], offset: usize, value: u64) {
    data[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}
