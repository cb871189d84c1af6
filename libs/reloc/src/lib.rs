// This file is part of the extern-traces agent.
//
// Licensed under the GNU General Public License, version 3 or later.
// See the LICENSE file distributed with this crate for details.

//! Filters the `PT_SCE_DYNLIBDATA` RELA tables down to `JUMP_SLOT`
//! relocations the agent can safely hook, and assigns each survivor a dense
//! `label_id`.
//!
//! Grounded on original_source's `elf.c` (`find_jump_slot_relocations`,
//! which skips `libc`-origin symbols and non-JUMP_SLOT/non-zero-addend
//! entries) and `tracing.c`'s `SpecificSymbolsTable`, realized here as
//! [`WellKnownSymbols`].

use dynamic::symbol_name::SymbolName;
use dynamic::{DynamicInfo, Library, Module, RelaEntry};
use log::{debug, warn};

/// `R_X86_64_JUMP_SLOT`.
pub const R_X86_64_JUMP_SLOT: u32 = 7;

/// One accepted JUMP_SLOT relocation, given a dense `label_id` in insertion
/// order.
#[derive(Debug, Clone)]
pub struct Label {
    pub label_id: u32,
    pub target_image_offset: u64,
    pub sym_index: u32,
    pub hash: [u8; 11],
    pub library_id: u64,
    pub module_id: u64,
}

/// The dense label space built from one image's relocation tables.
#[derive(Debug, Default)]
pub struct RelocationIndex {
    pub labels: Vec<Label>,
}

impl RelocationIndex {
    /// Builds the label space from both of `info`'s RELA tables (`rela` and
    /// `jmprel`), resolving each JUMP_SLOT's symbol against `info.symbols`
    /// and `info.libraries` to drop libc-origin entries.
    pub fn build(info: &DynamicInfo) -> Self {
        let mut labels = Vec::new();
        for table in [&info.rela, &info.jmprel] {
            collect_jump_slots(table, info, &mut labels);
        }
        debug!("accepted {} JUMP_SLOT relocations into the label space", labels.len());
        Self { labels }
    }
}

fn collect_jump_slots(table: &[RelaEntry], info: &DynamicInfo, labels: &mut Vec<Label>) {
    for entry in table {
        if entry.reloc_type != R_X86_64_JUMP_SLOT {
            continue;
        }
        if entry.addend != 0 {
            warn!(
                "JUMP_SLOT at offset {:#x} has non-zero addend {}; skipping",
                entry.offset, entry.addend
            );
            continue;
        }
        let Some(symbol) = info.symbols.get(entry.sym_index as usize) else {
            warn!(
                "JUMP_SLOT at offset {:#x} references out-of-range symbol index {}",
                entry.offset, entry.sym_index
            );
            continue;
        };
        let SymbolName::Parsed {
            hash,
            library_id,
            module_id,
        } = symbol
        else {
            continue;
        };
        if resolved_library_is_libc(info, *library_id) {
            continue;
        }
        labels.push(Label {
            label_id: labels.len() as u32,
            target_image_offset: entry.offset,
            sym_index: entry.sym_index,
            hash: *hash,
            library_id: *library_id,
            module_id: *module_id,
        });
    }
}

fn resolved_library_is_libc(info: &DynamicInfo, library_id: u64) -> bool {
    info.libraries
        .iter()
        .any(|l| l.id as u64 == library_id && l.name.contains("libc"))
}

/// Looks up a module/library by the id packed into a parsed symbol name.
pub fn find_module(info: &DynamicInfo, module_id: u64) -> Option<&Module> {
    info.modules.iter().find(|m| m.id as u64 == module_id)
}

pub fn find_library(info: &DynamicInfo, library_id: u64) -> Option<&Library> {
    info.libraries.iter().find(|l| l.id as u64 == library_id)
}

/// The handful of symbols TraceEmitter special-cases for argument capture,
/// indexed by 11-byte hash. Absent entries report `-1` per spec.md §4.3.
#[derive(Debug, Clone, Copy, Default)]
pub struct WellKnownSymbols {
    pub gnm_submit_and_flip_for_workload: i64,
    pub gnm_submit_and_flip: i64,
    pub gnm_submit: i64,
    pub sysmodule_load_module: i64,
    pub ajm_batch_job_run_buffer_ra: i64,
    pub ajm_batch_job_control_buffer_ra: i64,
    pub http_send_request: i64,
}

/// 11-byte hashes of the well-known symbols, taken from
/// original_source's `fill_specific_symbols_table`.
const HASH_GNM_SUBMIT_AND_FLIP_FOR_WORKLOAD: &[u8; 11] = b"Ga6r7H6Y0RI";
const HASH_GNM_SUBMIT_AND_FLIP: &[u8; 11] = b"xbxNatawohc";
const HASH_GNM_SUBMIT: &[u8; 11] = b"zwY0YV91TTI";
const HASH_SYSMODULE_LOAD_MODULE: &[u8; 11] = b"g8cM39EUZ6o";
const HASH_AJM_BATCH_JOB_RUN_BUFFER_RA: &[u8; 11] = b"ElslOCpOIns";
const HASH_AJM_BATCH_JOB_CONTROL_BUFFER_RA: &[u8; 11] = b"dmDybN--Fn8";
const HASH_HTTP_SEND_REQUEST: &[u8; 11] = b"1e2BNwI-XzE";

impl WellKnownSymbols {
    /// Scans `index` once, resolving each tracked hash to a `label_id`, or
    /// `-1` if the image never imports that symbol.
    pub fn build(index: &RelocationIndex) -> Self {
        let lookup = |want: &[u8; 11]| -> i64 {
            index
                .labels
                .iter()
                .find(|l| &l.hash == want)
                .map(|l| l.label_id as i64)
                .unwrap_or(-1)
        };
        Self {
            gnm_submit_and_flip_for_workload: lookup(HASH_GNM_SUBMIT_AND_FLIP_FOR_WORKLOAD),
            gnm_submit_and_flip: lookup(HASH_GNM_SUBMIT_AND_FLIP),
            gnm_submit: lookup(HASH_GNM_SUBMIT),
            sysmodule_load_module: lookup(HASH_SYSMODULE_LOAD_MODULE),
            ajm_batch_job_run_buffer_ra: lookup(HASH_AJM_BATCH_JOB_RUN_BUFFER_RA),
            ajm_batch_job_control_buffer_ra: lookup(HASH_AJM_BATCH_JOB_CONTROL_BUFFER_RA),
            http_send_request: lookup(HASH_HTTP_SEND_REQUEST),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynamic::RelaEntry;

    fn sym(hash: &[u8; 11], library_id: u64, module_id: u64) -> SymbolName {
        SymbolName::Parsed {
            hash: *hash,
            library_id,
            module_id,
        }
    }

    fn info_with(symbols: Vec<SymbolName>, libraries: Vec<Library>, jmprel: Vec<RelaEntry>) -> DynamicInfo {
        DynamicInfo {
            modules: Vec::new(),
            libraries,
            symbols,
            rela: Vec::new(),
            jmprel,
        }
    }

    #[test]
    fn skips_libc_and_raw_and_nonzero_addend() {
        let info = info_with(
            vec![
                sym(b"aaaaaaaaaaa", 0, 0),
                SymbolName::Raw("raw".into()),
                sym(b"bbbbbbbbbbb", 1, 0),
            ],
            vec![Library {
                id: 0,
                name: "libc.sprx".into(),
                version: 1,
            }],
            vec![
                RelaEntry { offset: 0x10, sym_index: 0, reloc_type: R_X86_64_JUMP_SLOT, addend: 0 },
                RelaEntry { offset: 0x18, sym_index: 1, reloc_type: R_X86_64_JUMP_SLOT, addend: 0 },
                RelaEntry { offset: 0x20, sym_index: 2, reloc_type: R_X86_64_JUMP_SLOT, addend: 5 },
                RelaEntry { offset: 0x28, sym_index: 99, reloc_type: R_X86_64_JUMP_SLOT, addend: 0 },
            ],
        );
        let index = RelocationIndex::build(&info);
        assert!(index.labels.is_empty());
    }

    #[test]
    fn dense_label_ids_in_insertion_order() {
        let info = info_with(
            vec![sym(b"aaaaaaaaaaa", 1, 0), sym(b"bbbbbbbbbbb", 1, 0)],
            vec![Library { id: 1, name: "libSceFoo.sprx".into(), version: 1 }],
            vec![
                RelaEntry { offset: 0x10, sym_index: 0, reloc_type: R_X86_64_JUMP_SLOT, addend: 0 },
                RelaEntry { offset: 0x18, sym_index: 1, reloc_type: R_X86_64_JUMP_SLOT, addend: 0 },
            ],
        );
        let index = RelocationIndex::build(&info);
        assert_eq!(index.labels.len(), 2);
        assert_eq!(index.labels[0].label_id, 0);
        assert_eq!(index.labels[1].label_id, 1);
    }

    #[test]
    fn well_known_symbols_default_to_negative_one() {
        let index = RelocationIndex::default();
        let table = WellKnownSymbols::build(&index);
        assert_eq!(table.gnm_submit, -1);
        assert_eq!(table.sysmodule_load_module, -1);
        assert_eq!(table.http_send_request, -1);
    }
}
