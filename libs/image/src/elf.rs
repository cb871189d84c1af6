// This file is part of the extern-traces agent.
//
// Licensed under the GNU General Public License, version 3 or later.
// See the LICENSE file distributed with this crate for details.

//! Minimal ELF64 header and program header definitions, SysV gABI layout
//! plus the platform-specific `PT_SCE_DYNLIBDATA` segment type.

use byteorder::{ByteOrder, LE};

pub const EI_NIDENT: usize = 16;

/// Standard segment types we care about.
pub const PT_DYNAMIC: u32 = 2;
/// Platform extension: backs the strtab/symtab/rela tables referenced from
/// `PT_DYNAMIC` by file offset.
pub const PT_SCE_DYNLIBDATA: u32 = 0x6100_0000;

pub const ELF64_EHDR_SIZE: usize = 64;
pub const ELF64_PHDR_SIZE: usize = 56;

/// `Elf64_Ehdr`, read field-by-field rather than overlaid, since `e_ident`
/// is a byte array and `packed_struct!` only generates scalar accessors.
#[derive(Debug, Clone, Copy)]
pub struct Elf64Ehdr {
    pub e_ident: [u8; EI_NIDENT],
    pub e_type: u16,
    pub e_machine: u16,
    pub e_version: u32,
    pub e_entry: u64,
    pub e_phoff: u64,
    pub e_shoff: u64,
    pub e_flags: u32,
    pub e_ehsize: u16,
    pub e_phentsize: u16,
    pub e_phnum: u16,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

impl Elf64Ehdr {
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < ELF64_EHDR_SIZE {
            return None;
        }
        let mut e_ident = [0u8; EI_NIDENT];
        e_ident.copy_from_slice(&buf[0..EI_NIDENT]);
        Some(Self {
            e_ident,
            e_type: LE::read_u16(&buf[16..]),
            e_machine: LE::read_u16(&buf[18..]),
            e_version: LE::read_u32(&buf[20..]),
            e_entry: LE::read_u64(&buf[24..]),
            e_phoff: LE::read_u64(&buf[32..]),
            e_shoff: LE::read_u64(&buf[40..]),
            e_flags: LE::read_u32(&buf[48..]),
            e_ehsize: LE::read_u16(&buf[52..]),
            e_phentsize: LE::read_u16(&buf[54..]),
            e_phnum: LE::read_u16(&buf[56..]),
            e_shentsize: LE::read_u16(&buf[58..]),
            e_shnum: LE::read_u16(&buf[60..]),
            e_shstrndx: LE::read_u16(&buf[62..]),
        })
    }
}

/// `Elf64_Phdr`.
#[derive(Debug, Clone, Copy)]
pub struct Elf64Phdr {
    pub p_type: u32,
    pub p_flags: u32,
    pub p_offset: u64,
    pub p_vaddr: u64,
    pub p_paddr: u64,
    pub p_filesz: u64,
    pub p_memsz: u64,
    pub p_align: u64,
}

impl Elf64Phdr {
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < ELF64_PHDR_SIZE {
            return None;
        }
        Some(Self {
            p_type: LE::read_u32(&buf[0..]),
            p_flags: LE::read_u32(&buf[4..]),
            p_offset: LE::read_u64(&buf[8..]),
            p_vaddr: LE::read_u64(&buf[16..]),
            p_paddr: LE::read_u64(&buf[24..]),
            p_filesz: LE::read_u64(&buf[32..]),
            p_memsz: LE::read_u64(&buf[40..]),
            p_align: LE::read_u64(&buf[48..]),
        })
    }
}
