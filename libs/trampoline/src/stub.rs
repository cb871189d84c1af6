// This file is part of the extern-traces agent.
//
// Licensed under the GNU General Public License, version 3 or later.
// See the LICENSE file distributed with this crate for details.

//! The per-symbol stub: publishes a label id and the original target into
//! TLS, then jumps into the shared hook body.
//!
//! Grounded on original_source's `hook.c` `register_hooks`'s
//! `template_code` byte array, with the label and original-target slots'
//! TLS displacements generalized from the fixed `-32`/`-24` immediates to
//! [`tls::TlsLayout::off_label`]/`off_orig`.

use crate::codegen::{self, Reg};
use tls::TlsLayout;

/// Byte length of an emitted stub: `12 + 7 + 9 + 6 + 8 + 8`, matching
/// the original template's instruction-by-instruction sizes exactly.
pub const STUB_LEN: usize = 50;

pub(crate) const ORIG_TARGET_OFFSET: usize = 34;
const HOOK_BODY_OFFSET: usize = 42;

/// Builds one 50-byte stub. `orig_target` is the address the stub restores
/// into `OFF_ORIG` and ultimately chains to via the hook body; `hook_body`
/// is the address of the shared hook-body blob this stub jumps to.
pub fn build(label_id: u32, layout: TlsLayout, orig_target: u64, hook_body: u64) -> [u8; STUB_LEN] {
    let mut code = Vec::with_capacity(STUB_LEN);

    // mov dword ptr fs:[off_label], label_id
    code.extend(codegen::mov_fs_disp32_imm32(layout.off_label, label_id));
    debug_assert_eq!(code.len(), 12);

    // mov r11, qword ptr [rip+0xF]  -- reads the orig_target slot below
    code.extend(codegen::mov_reg_rip_disp32(Reg::R11, 0x0F));
    debug_assert_eq!(code.len(), 19);

    // mov qword ptr fs:[off_orig], r11
    code.extend(codegen::mov_fs_disp32_r64(layout.off_orig, Reg::R11));
    debug_assert_eq!(code.len(), 28);

    // jmp qword ptr [rip+0x8]  -- reads the hook_body slot below
    code.extend(codegen::jmp_rip_disp32(0x08));
    debug_assert_eq!(code.len(), ORIG_TARGET_OFFSET);

    code.extend_from_slice(&orig_target.to_le_bytes());
    debug_assert_eq!(code.len(), HOOK_BODY_OFFSET);

    code.extend_from_slice(&hook_body.to_le_bytes());
    debug_assert_eq!(code.len(), STUB_LEN);

    let mut out = [0u8; STUB_LEN];
    out.copy_from_slice(&code);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_store_and_data_slots_land_where_the_jumps_expect() {
        let layout = TlsLayout::new(0x1000);
        let code = build(7, layout, 0xdead_beef, 0xcafe_babe);
        assert_eq!(
            u64::from_le_bytes(code[ORIG_TARGET_OFFSET..ORIG_TARGET_OFFSET + 8].try_into().unwrap()),
            0xdead_beef
        );
        assert_eq!(
            u64::from_le_bytes(code[HOOK_BODY_OFFSET..HOOK_BODY_OFFSET + 8].try_into().unwrap()),
            0xcafe_babe
        );
        assert_eq!(u32::from_le_bytes(code[8..12].try_into().unwrap()), 7);
    }
}
