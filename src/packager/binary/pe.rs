//! PE (Authenticode) signature removal.
//!
//! The certificate table is addressed by the security data directory, which
//! holds a file offset rather than an RVA. Stripping clears that directory,
//! zeroes the optional-header checksum and drops the table when it is the
//! file's tail (where signing tools always put it).

use goblin::pe::PE;
use goblin::pe::header::{SIZEOF_COFF_HEADER, SIZEOF_PE_MAGIC};
use goblin::pe::optional_header::{MAGIC_32, MAGIC_64};

/// Index of `IMAGE_DIRECTORY_ENTRY_SECURITY`.
const SECURITY_DIRECTORY_INDEX: usize = 4;

/// Offset of `CheckSum` in either optional header flavour.
const CHECKSUM_OFFSET: usize = 64;

/// Where the fields touched by stripping live, plus the table they describe.
struct Layout {
    checksum_offset: usize,
    security_dir_offset: usize,
    table: Option<(usize, usize)>,
}

fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Parses the headers; None if the image has no optional header.
fn locate(data: &[u8]) -> Result<Option<Layout>, String> {
    let pe = PE::parse(data).map_err(|e| format!("not a PE image: {e}"))?;
    let Some(optional) = pe.header.optional_header else {
        return Ok(None);
    };

    let optional_offset =
        pe.header.dos_header.pe_pointer as usize + SIZEOF_PE_MAGIC + SIZEOF_COFF_HEADER;
    let directories_offset = match optional.standard_fields.magic {
        MAGIC_32 => optional_offset + 96,
        MAGIC_64 => optional_offset + 112,
        other => return Err(format!("unknown optional header magic {other:#x}")),
    };

    let table = optional
        .data_directories
        .get_certificate_table()
        .map(|dir| (dir.virtual_address as usize, dir.size as usize))
        .filter(|(_, size)| *size != 0);

    Ok(Some(Layout {
        checksum_offset: optional_offset + CHECKSUM_OFFSET,
        security_dir_offset: directories_offset + SECURITY_DIRECTORY_INDEX * 8,
        table,
    }))
}

/// Whether the image carries a certificate table.
pub fn has_signature(data: &[u8]) -> Result<bool, String> {
    Ok(locate(data)?.is_some_and(|layout| layout.table.is_some()))
}

/// Removes the certificate table in place. Returns whether one was present.
pub fn strip_signature(data: &mut Vec<u8>) -> Result<bool, String> {
    let Some(Layout {
        checksum_offset,
        security_dir_offset,
        table: Some((table_offset, table_size)),
    }) = locate(data)?
    else {
        return Ok(false);
    };

    let table_end = table_offset + table_size;
    if table_end > data.len() {
        return Err("certificate table extends past end of file".into());
    }

    write_u32(data, security_dir_offset, 0);
    write_u32(data, security_dir_offset + 4, 0);
    write_u32(data, checksum_offset, 0);

    if table_end == data.len() {
        data.truncate(table_offset);
    } else {
        data[table_offset..table_end].fill(0);
    }

    Ok(true)
}
