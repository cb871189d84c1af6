// This file is part of the extern-traces agent.
//
// Licensed under the GNU General Public License, version 3 or later.
// See the LICENSE file distributed with this crate for details.

//! The single shared hook body every installed stub jumps into: saves the
//! caller's argument registers, calls `emit_span_start`, chains to the
//! original function, then calls `emit_span_end` before returning with the
//! original return value intact.
//!
//! Grounded on original_source's `hook.c` `hook()` naked-function asm,
//! generalized per spec.md §4.5: the old body called parameterless
//! `start_logger`/`end_logger` wrappers that read everything back out of
//! TLS themselves; this one passes the label, `PerThreadState` pointer, and
//! a pointer to the saved argument registers directly, matching
//! [`trace::capture::Args`]'s field order so the call site never has to
//! reparse the stack.

use crate::codegen::{self, Reg};
use tls::TlsLayout;

const ARGS_AREA_SIZE: u32 = 0x88;

/// Builds the hook body blob for one `TlsLayout`. The two call targets are
/// baked in directly (`mov r11, imm64; call r11`) rather than left as
/// relocatable displacements, since the blob's own load address is already
/// known by the time this runs.
pub fn build(layout: TlsLayout, emit_span_start: u64, emit_span_end: u64) -> Vec<u8> {
    let mut code = Vec::new();

    // Save the six integer argument registers in reverse order, so the
    // resulting stack block reads rdi,rsi,rdx,rcx,r8,r9 from low to high
    // address -- the same field order as `trace::capture::Args`.
    for reg in [Reg::R9, Reg::R8, Reg::Rcx, Reg::Rdx, Reg::Rsi, Reg::Rdi] {
        code.extend(codegen::push(reg));
    }

    // Stash the eight XMM argument registers into the red zone below the
    // current (pre-`sub`) stack pointer.
    for (i, xmm) in (0u8..8).enumerate() {
        let disp = -(0x10 * (i as i32 + 1)) as i8;
        code.extend(codegen::movdqu_store_xmm(xmm, disp));
    }
    code.extend(codegen::sub_rsp_imm32(ARGS_AREA_SIZE));

    // rdx <- &Args (the six pushed GPRs, at rsp+0x88 now that rsp moved).
    code.extend(codegen::lea_reg_rsp_disp32(Reg::Rdx, ARGS_AREA_SIZE as i32));
    // edi <- label (32-bit load zero-extends into rdi).
    code.extend(codegen::mov_r32_fs_disp32(Reg::Rdi, layout.off_label));
    // rsi <- PerThreadState pointer.
    code.extend(codegen::mov_r64_fs_disp32(Reg::Rsi, layout.off_state));
    code.extend(codegen::mov_r64_imm64(Reg::R11, emit_span_start));
    code.extend(codegen::call_reg(Reg::R11));

    code.extend(codegen::add_rsp_imm32(ARGS_AREA_SIZE));
    for (i, xmm) in (0u8..8).enumerate() {
        let disp = -(0x10 * (i as i32 + 1)) as i8;
        code.extend(codegen::movdqu_load_xmm(xmm, disp));
    }
    for reg in [Reg::Rdi, Reg::Rsi, Reg::Rdx, Reg::Rcx, Reg::R8, Reg::R9] {
        code.extend(codegen::pop(reg));
    }

    // The caller's return address is still on the stack here (it was
    // pushed by the `call` that reached the JUMP_SLOT target, before any
    // of the above pushes); stash it in TLS so the argument-register
    // restore above couldn't have clobbered it.
    code.extend(codegen::pop(Reg::R10));
    code.extend(codegen::mov_fs_disp32_r64(layout.off_ret, Reg::R10));

    code.extend(codegen::mov_r64_fs_disp32(Reg::Rax, layout.off_orig));
    code.extend(codegen::call_reg(Reg::Rax));

    code.extend(codegen::mov_r64_fs_disp32(Reg::R10, layout.off_ret));
    code.extend(codegen::push(Reg::R10));
    code.extend(codegen::push(Reg::Rax));

    code.extend(codegen::mov_r64_fs_disp32(Reg::Rdi, layout.off_state));
    code.extend(codegen::mov_reg_reg(Reg::Rsi, Reg::Rax));
    code.extend(codegen::mov_r64_imm64(Reg::R11, emit_span_end));
    code.extend(codegen::call_reg(Reg::R11));

    code.extend(codegen::pop(Reg::Rax));
    code.extend(codegen::ret());

    code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ends_with_a_single_ret_and_is_nonempty() {
        let layout = TlsLayout::new(0x2000);
        let code = build(layout, 0x1111, 0x2222);
        assert!(!code.is_empty());
        assert_eq!(*code.last().unwrap(), 0xC3);
    }

    #[test]
    fn embeds_both_call_targets_as_absolute_immediates() {
        let layout = TlsLayout::new(0);
        let code = build(layout, 0xAAAA_BBBB_CCCC_DDDD, 0x1111_2222_3333_4444);
        let has = |target: u64| {
            code.windows(8)
                .any(|w| w == target.to_le_bytes())
        };
        assert!(has(0xAAAA_BBBB_CCCC_DDDD));
        assert!(has(0x1111_2222_3333_4444));
    }
}
