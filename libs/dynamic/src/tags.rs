// This file is part of the extern-traces agent.
//
// Licensed under the GNU General Public License, version 3 or later.
// See the LICENSE file distributed with this crate for details.

//! Platform `DT_SCE_*` dynamic tag values. The standard `DT_NULL` terminator
//! is the only non-platform tag this parser needs to recognize by name.

pub const DT_NULL: u64 = 0;

pub const DT_SCE_RELA: u64 = 0x6100002F;
pub const DT_SCE_RELASZ: u64 = 0x61000031;
pub const DT_SCE_RELAENT: u64 = 0x61000033;
pub const DT_SCE_JMPREL: u64 = 0x61000029;
pub const DT_SCE_PLTREL: u64 = 0x6100002B;
pub const DT_SCE_PLTRELSZ: u64 = 0x6100002D;
pub const DT_SCE_STRTAB: u64 = 0x61000035;
pub const DT_SCE_STRSZ: u64 = 0x61000037;
pub const DT_SCE_SYMTAB: u64 = 0x61000039;
pub const DT_SCE_SYMTABSZ: u64 = 0x6100003F;
pub const DT_SCE_SYMENT: u64 = 0x6100003B;
pub const DT_SCE_IMPORT_LIB: u64 = 0x61000015;
pub const DT_SCE_IMPORT_MODULE: u64 = 0x6100000F;

/// Native sizes the platform's `SCE_RELAENT`/`SCE_SYMENT` tags must match.
pub const NATIVE_RELA_ENTRY_SIZE: u64 = 24;
pub const NATIVE_SYM_ENTRY_SIZE: u64 = 24;
