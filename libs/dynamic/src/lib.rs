// This file is part of the extern-traces agent.
//
// Licensed under the GNU General Public License, version 3 or later.
// See the LICENSE file distributed with this crate for details.

//! Walks a `PT_DYNAMIC` tag/value table and the `PT_SCE_DYNLIBDATA` segment
//! it references by offset, producing the module table, library table,
//! symbol table, and both RELA tables the rest of the agent needs.

pub mod symbol_name;
pub mod tags;

use byteorder::{ByteOrder, LE};
use log::warn;
use symbol_name::SymbolName;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("PT_DYNAMIC table is not a multiple of 16 bytes")]
    MisalignedDynamicTable,
    #[error("{what} offset {offset} out of range (dynlib data segment is {len} bytes)")]
    OutOfRange {
        what: &'static str,
        offset: u64,
        len: usize,
    },
    #[error("string table entry at offset {0} is not nul-terminated")]
    UnterminatedString(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub id: u16,
    pub name: String,
    pub major: u8,
    pub minor: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
    pub id: u16,
    pub name: String,
    pub version: u16,
}

/// A decoded `DT_SCE_IMPORT_MODULE`/`DT_SCE_IMPORT_LIB` value, before its
/// `name_off` has been resolved against the string table.
struct RawModule {
    id: u16,
    name_off: u32,
    major: u8,
    minor: u8,
}

struct RawLibrary {
    id: u16,
    name_off: u32,
    version: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaEntry {
    pub offset: u64,
    pub sym_index: u32,
    pub reloc_type: u32,
    pub addend: i64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DynamicInfo {
    pub modules: Vec<Module>,
    pub libraries: Vec<Library>,
    /// Symbol table, indexed by symtab index.
    pub symbols: Vec<SymbolName>,
    /// The table referenced by `DT_SCE_RELA`/`DT_SCE_RELASZ`.
    pub rela: Vec<RelaEntry>,
    /// The table referenced by `DT_SCE_JMPREL`/`DT_SCE_PLTRELSZ`.
    pub jmprel: Vec<RelaEntry>,
}

#[derive(Default)]
struct RawTags {
    strtab_off: Option<u64>,
    strsz: Option<u64>,
    symtab_off: Option<u64>,
    symtabsz: Option<u64>,
    syment: Option<u64>,
    rela_off: Option<u64>,
    relasz: Option<u64>,
    relaent: Option<u64>,
    jmprel_off: Option<u64>,
    pltrelsz: Option<u64>,
}

/// Walks `dynamic_bytes` (the raw `PT_DYNAMIC` segment) and resolves every
/// offset-bearing tag against `dynlib_data` (the raw `PT_SCE_DYNLIBDATA`
/// segment).
pub fn parse(dynamic_bytes: &[u8], dynlib_data: &[u8]) -> Result<DynamicInfo, ParseError> {
    if dynamic_bytes.len() % 16 != 0 {
        return Err(ParseError::MisalignedDynamicTable);
    }

    let mut raw = RawTags::default();
    let mut raw_modules = Vec::new();
    let mut raw_libraries = Vec::new();

    for chunk in dynamic_bytes.chunks_exact(16) {
        let tag = LE::read_u64(&chunk[0..8]);
        let value = LE::read_u64(&chunk[8..16]);
        if tag == tags::DT_NULL {
            break;
        }
        match tag {
            tags::DT_SCE_STRTAB => raw.strtab_off = Some(value),
            tags::DT_SCE_STRSZ => raw.strsz = Some(value),
            tags::DT_SCE_SYMTAB => raw.symtab_off = Some(value),
            tags::DT_SCE_SYMTABSZ => raw.symtabsz = Some(value),
            tags::DT_SCE_SYMENT => raw.syment = Some(value),
            tags::DT_SCE_RELA => raw.rela_off = Some(value),
            tags::DT_SCE_RELASZ => raw.relasz = Some(value),
            tags::DT_SCE_RELAENT => raw.relaent = Some(value),
            tags::DT_SCE_JMPREL => raw.jmprel_off = Some(value),
            tags::DT_SCE_PLTRELSZ => raw.pltrelsz = Some(value),
            tags::DT_SCE_IMPORT_MODULE => {
                raw_modules.push(decode_module_value(value));
            }
            tags::DT_SCE_IMPORT_LIB => {
                raw_libraries.push(decode_library_value(value));
            }
            _ => {}
        }
    }

    let strtab_off = raw.strtab_off.unwrap_or(0);

    let mut modules = Vec::with_capacity(raw_modules.len());
    for m in &raw_modules {
        modules.push(Module {
            id: m.id,
            name: read_c_string(dynlib_data, strtab_off + m.name_off as u64)?,
            major: m.major,
            minor: m.minor,
        });
    }
    let mut libraries = Vec::with_capacity(raw_libraries.len());
    for l in &raw_libraries {
        libraries.push(Library {
            id: l.id,
            name: read_c_string(dynlib_data, strtab_off + l.name_off as u64)?,
            version: l.version,
        });
    }

    let symbols = parse_symtab(dynlib_data, strtab_off, &raw)?;
    let rela = parse_rela_table(dynlib_data, raw.rela_off, raw.relasz, raw.relaent)?;
    let jmprel = parse_rela_table(dynlib_data, raw.jmprel_off, raw.pltrelsz, raw.relaent)?;

    Ok(DynamicInfo {
        modules,
        libraries,
        symbols,
        rela,
        jmprel,
    })
}

fn decode_module_value(value: u64) -> RawModule {
    RawModule {
        name_off: (value & 0xFFFF_FFFF) as u32,
        major: ((value >> 32) & 0xFF) as u8,
        minor: ((value >> 40) & 0xFF) as u8,
        id: ((value >> 48) & 0xFFFF) as u16,
    }
}

fn decode_library_value(value: u64) -> RawLibrary {
    RawLibrary {
        name_off: (value & 0xFFFF_FFFF) as u32,
        version: ((value >> 32) & 0xFFFF) as u16,
        id: ((value >> 48) & 0xFFFF) as u16,
    }
}

fn read_c_string(data: &[u8], offset: u64) -> Result<String, ParseError> {
    let start = offset as usize;
    if start > data.len() {
        return Err(ParseError::OutOfRange {
            what: "string table",
            offset,
            len: data.len(),
        });
    }
    let end = data[start..]
        .iter()
        .position(|&b| b == 0)
        .ok_or(ParseError::UnterminatedString(offset))?;
    Ok(String::from_utf8_lossy(&data[start..start + end]).into_owned())
}

fn parse_symtab(
    dynlib_data: &[u8],
    strtab_off: u64,
    raw: &RawTags,
) -> Result<Vec<SymbolName>, ParseError> {
    let (Some(symtab_off), Some(symtabsz)) = (raw.symtab_off, raw.symtabsz) else {
        return Ok(Vec::new());
    };
    let syment = raw.syment.unwrap_or(tags::NATIVE_SYM_ENTRY_SIZE);
    if syment != tags::NATIVE_SYM_ENTRY_SIZE {
        warn!(
            "SCE_SYMENT {} does not match native symbol entry size {}; skipping symbol table",
            syment,
            tags::NATIVE_SYM_ENTRY_SIZE
        );
        return Ok(Vec::new());
    }

    let count = (symtabsz / syment) as usize;
    let mut symbols = Vec::with_capacity(count);
    for i in 0..count {
        let entry_off = (symtab_off + i as u64 * syment) as usize;
        let entry = slice_at(dynlib_data, entry_off, syment as usize, "symbol table entry")?;
        let name_off = LE::read_u32(&entry[0..4]) as u64;
        let name = read_c_string(dynlib_data, strtab_off + name_off)?;
        symbols.push(symbol_name::parse(&name));
    }
    Ok(symbols)
}

fn parse_rela_table(
    dynlib_data: &[u8],
    table_off: Option<u64>,
    table_size: Option<u64>,
    entry_size: Option<u64>,
) -> Result<Vec<RelaEntry>, ParseError> {
    let (Some(table_off), Some(table_size)) = (table_off, table_size) else {
        return Ok(Vec::new());
    };
    let entry_size = entry_size.unwrap_or(tags::NATIVE_RELA_ENTRY_SIZE);
    if entry_size != tags::NATIVE_RELA_ENTRY_SIZE {
        warn!(
            "SCE_RELAENT {} does not match native RELA entry size {}; skipping table",
            entry_size,
            tags::NATIVE_RELA_ENTRY_SIZE
        );
        return Ok(Vec::new());
    }

    let count = (table_size / entry_size) as usize;
    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let entry_off = (table_off + i as u64 * entry_size) as usize;
        let entry = slice_at(dynlib_data, entry_off, entry_size as usize, "RELA entry")?;
        let offset = LE::read_u64(&entry[0..8]);
        let info = LE::read_u64(&entry[8..16]);
        let addend = LE::read_i64(&entry[16..24]);
        entries.push(RelaEntry {
            offset,
            sym_index: (info >> 32) as u32,
            reloc_type: (info & 0xFFFF_FFFF) as u32,
            addend,
        });
    }
    Ok(entries)
}

fn slice_at<'a>(
    data: &'a [u8],
    offset: usize,
    len: usize,
    what: &'static str,
) -> Result<&'a [u8], ParseError> {
    data.get(offset..offset + len).ok_or(ParseError::OutOfRange {
        what,
        offset: offset as u64,
        len: data.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_tag(buf: &mut Vec<u8>, tag: u64, value: u64) {
        buf.extend_from_slice(&tag.to_le_bytes());
        buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Builds a minimal dynlib-data segment with one string, one symbol,
    /// and one JUMP_SLOT-shaped RELA entry, plus the PT_DYNAMIC bytes that
    /// reference it.
    fn build_fixture() -> (Vec<u8>, Vec<u8>) {
        let mut dynlib = Vec::new();

        // strtab at offset 0: "\0aaaaaaaaaaa#A#A\0"
        let strtab_off = 0u64;
        dynlib.push(0u8);
        let name_off = dynlib.len() as u32;
        dynlib.extend_from_slice(b"aaaaaaaaaaa#A#A\0");

        // symtab: one Elf64_Sym-shaped entry at offset 32, 8-aligned
        while dynlib.len() % 8 != 0 {
            dynlib.push(0);
        }
        let symtab_off = dynlib.len() as u64;
        dynlib.extend_from_slice(&name_off.to_le_bytes()); // st_name
        dynlib.push(0); // st_info
        dynlib.push(0); // st_other
        dynlib.extend_from_slice(&0u16.to_le_bytes()); // st_shndx
        dynlib.extend_from_slice(&0u64.to_le_bytes()); // st_value
        dynlib.extend_from_slice(&0u64.to_le_bytes()); // st_size

        // jmprel: one RELA entry, JUMP_SLOT type = 7, sym index 0
        let jmprel_off = dynlib.len() as u64;
        dynlib.extend_from_slice(&0x1000u64.to_le_bytes()); // r_offset
        let info = (0u64 << 32) | 7u64; // sym_index=0, type=7 (R_X86_64_JUMP_SLOT)
        dynlib.extend_from_slice(&info.to_le_bytes());
        dynlib.extend_from_slice(&0i64.to_le_bytes()); // addend

        let mut pt_dynamic = Vec::new();
        push_tag(&mut pt_dynamic, tags::DT_SCE_STRTAB, strtab_off);
        push_tag(&mut pt_dynamic, tags::DT_SCE_STRSZ, dynlib.len() as u64);
        push_tag(&mut pt_dynamic, tags::DT_SCE_SYMTAB, symtab_off);
        push_tag(&mut pt_dynamic, tags::DT_SCE_SYMENT, tags::NATIVE_SYM_ENTRY_SIZE);
        push_tag(&mut pt_dynamic, tags::DT_SCE_SYMTABSZ, tags::NATIVE_SYM_ENTRY_SIZE);
        push_tag(&mut pt_dynamic, tags::DT_SCE_JMPREL, jmprel_off);
        push_tag(&mut pt_dynamic, tags::DT_SCE_PLTRELSZ, tags::NATIVE_RELA_ENTRY_SIZE);
        push_tag(&mut pt_dynamic, tags::DT_SCE_RELAENT, tags::NATIVE_RELA_ENTRY_SIZE);
        push_tag(&mut pt_dynamic, tags::DT_NULL, 0);

        (pt_dynamic, dynlib)
    }

    #[test]
    fn parses_symbols_and_jmprel() {
        let (pt_dynamic, dynlib) = build_fixture();
        let info = parse(&pt_dynamic, &dynlib).unwrap();

        assert_eq!(info.symbols.len(), 1);
        assert_eq!(
            info.symbols[0],
            SymbolName::Parsed {
                hash: *b"aaaaaaaaaaa",
                library_id: 0,
                module_id: 0,
            }
        );

        assert_eq!(info.jmprel.len(), 1);
        assert_eq!(info.jmprel[0].offset, 0x1000);
        assert_eq!(info.jmprel[0].sym_index, 0);
        assert_eq!(info.jmprel[0].reloc_type, 7);
        assert!(info.rela.is_empty());
    }

    #[test]
    fn rejects_misaligned_dynamic_table() {
        let buf = vec![0u8; 15];
        assert!(matches!(
            parse(&buf, &[]),
            Err(ParseError::MisalignedDynamicTable)
        ));
    }

    #[test]
    fn mismatched_syment_skips_symtab_instead_of_erroring() {
        let (mut pt_dynamic, dynlib) = build_fixture();
        // Overwrite SYMENT's value in-place: it's the 4th tag pushed (index 3).
        let syment_value_off = 16 * 3 + 8;
        pt_dynamic[syment_value_off..syment_value_off + 8].copy_from_slice(&999u64.to_le_bytes());
        let info = parse(&pt_dynamic, &dynlib).unwrap();
        assert!(info.symbols.is_empty());
    }

    #[test]
    fn stops_at_dt_null() {
        let mut pt_dynamic = Vec::new();
        push_tag(&mut pt_dynamic, tags::DT_NULL, 0);
        push_tag(&mut pt_dynamic, tags::DT_SCE_STRTAB, 0xDEAD);
        let info = parse(&pt_dynamic, &[]).unwrap();
        assert!(info.modules.is_empty());
        assert!(info.symbols.is_empty());
    }
}
