// This file is part of the extern-traces agent.
//
// Licensed under the GNU General Public License, version 3 or later.
// See the LICENSE file distributed with this crate for details.

//! Minimal x86-64 byte-level assembler, covering only the handful of
//! instruction forms the hook body and per-symbol stubs need: GPR push/pop,
//! `%fs`-relative loads and stores, `movdqu` to/from a small stack scratch
//! area, immediate-load-then-call, and `rsp` arithmetic.
//!
//! Grounded on original_source's `hook.c` (`hook()`'s hand-written asm
//! prologue/epilogue and `register_hooks`'s `template_code` byte array),
//! generalized from fixed `%fs:-8/-16/-24/-32` immediates to the
//! host-computed [`tls::TlsLayout`] offsets.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Reg {
    Rax = 0,
    Rcx = 1,
    Rdx = 2,
    Rbx = 3,
    Rsp = 4,
    Rbp = 5,
    Rsi = 6,
    Rdi = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
}

impl Reg {
    fn low3(self) -> u8 {
        (self as u8) & 0x7
    }

    fn is_extended(self) -> bool {
        (self as u8) >= 8
    }
}

/// `push r64`.
pub fn push(reg: Reg) -> Vec<u8> {
    let mut out = Vec::with_capacity(2);
    if reg.is_extended() {
        out.push(0x41);
    }
    out.push(0x50 + reg.low3());
    out
}

/// `pop r64`.
pub fn pop(reg: Reg) -> Vec<u8> {
    let mut out = Vec::with_capacity(2);
    if reg.is_extended() {
        out.push(0x41);
    }
    out.push(0x58 + reg.low3());
    out
}

/// `mov r64, r64`.
pub fn mov_reg_reg(dst: Reg, src: Reg) -> Vec<u8> {
    let rex = 0x48 | ((src.is_extended() as u8) << 2) | (dst.is_extended() as u8);
    let modrm = 0xC0 | (src.low3() << 3) | dst.low3();
    vec![rex, 0x89, modrm]
}

/// `movabs r64, imm64`.
pub fn mov_r64_imm64(reg: Reg, imm: u64) -> Vec<u8> {
    let rex = 0x48 | (reg.is_extended() as u8);
    let mut out = vec![rex, 0xB8 + reg.low3()];
    out.extend_from_slice(&imm.to_le_bytes());
    out
}

/// `call r64` (`FF /2`).
pub fn call_reg(reg: Reg) -> Vec<u8> {
    let mut out = Vec::with_capacity(3);
    if reg.is_extended() {
        out.push(0x41);
    }
    out.push(0xFF);
    out.push(0xD0 | reg.low3());
    out
}

/// `mov r64, qword ptr fs:[disp32]`.
pub fn mov_r64_fs_disp32(dst: Reg, disp: i32) -> Vec<u8> {
    let rex = 0x48 | ((dst.is_extended() as u8) << 2);
    let modrm = 0x04 | (dst.low3() << 3);
    let mut out = vec![0x64, rex, 0x8B, modrm, 0x25];
    out.extend_from_slice(&disp.to_le_bytes());
    out
}

/// `mov dword ptr fs:[disp32], <reg's low 32 bits>`, zero-extending into
/// the full register on a later load — used only for reading `OFF_LABEL`
/// back into a 32-bit destination.
pub fn mov_r32_fs_disp32(dst: Reg, disp: i32) -> Vec<u8> {
    let modrm = 0x04 | (dst.low3() << 3);
    let mut out = vec![0x64, 0x8B, modrm, 0x25];
    out.extend_from_slice(&disp.to_le_bytes());
    out
}

/// `mov qword ptr fs:[disp32], r64`.
pub fn mov_fs_disp32_r64(disp: i32, src: Reg) -> Vec<u8> {
    let rex = 0x48 | ((src.is_extended() as u8) << 2);
    let modrm = 0x04 | (src.low3() << 3);
    let mut out = vec![0x64, rex, 0x89, modrm, 0x25];
    out.extend_from_slice(&disp.to_le_bytes());
    out
}

/// `mov dword ptr fs:[disp32], imm32` — matches original_source's
/// per-symbol stub label-store instruction exactly.
pub fn mov_fs_disp32_imm32(disp: i32, imm: u32) -> Vec<u8> {
    let mut out = vec![0x64, 0xC7, 0x04, 0x25];
    out.extend_from_slice(&disp.to_le_bytes());
    out.extend_from_slice(&imm.to_le_bytes());
    out
}

/// `movdqu [rsp+disp8], xmmN` — `disp` must fit in `i8`.
pub fn movdqu_store_xmm(xmm: u8, disp: i8) -> Vec<u8> {
    debug_assert!(xmm < 8);
    let mut out = vec![0xF3, 0x0F, 0x7F];
    out.push(0x44 | (xmm << 3));
    out.push(0x24);
    out.push(disp as u8);
    out
}

/// `movdqu xmmN, [rsp+disp8]`.
pub fn movdqu_load_xmm(xmm: u8, disp: i8) -> Vec<u8> {
    debug_assert!(xmm < 8);
    let mut out = vec![0xF3, 0x0F, 0x6F];
    out.push(0x44 | (xmm << 3));
    out.push(0x24);
    out.push(disp as u8);
    out
}

/// `sub rsp, imm32`.
pub fn sub_rsp_imm32(imm: u32) -> Vec<u8> {
    let mut out = vec![0x48, 0x81, 0xEC];
    out.extend_from_slice(&imm.to_le_bytes());
    out
}

/// `add rsp, imm32`.
pub fn add_rsp_imm32(imm: u32) -> Vec<u8> {
    let mut out = vec![0x48, 0x81, 0xC4];
    out.extend_from_slice(&imm.to_le_bytes());
    out
}

/// `lea r64, [rsp+disp32]`.
pub fn lea_reg_rsp_disp32(dst: Reg, disp: i32) -> Vec<u8> {
    let rex = 0x48 | ((dst.is_extended() as u8) << 2);
    let modrm = 0x84 | (dst.low3() << 3);
    let mut out = vec![rex, 0x8D, modrm, 0x24];
    out.extend_from_slice(&disp.to_le_bytes());
    out
}

/// `ret`.
pub fn ret() -> Vec<u8> {
    vec![0xC3]
}

/// `mov r64, qword ptr [rip+disp32]` — `disp32` is relative to the address
/// of the byte immediately following this instruction.
pub fn mov_reg_rip_disp32(dst: Reg, disp: i32) -> Vec<u8> {
    let rex = 0x48 | ((dst.is_extended() as u8) << 2);
    let modrm = (dst.low3() << 3) | 0x05;
    let mut out = vec![rex, 0x8B, modrm];
    out.extend_from_slice(&disp.to_le_bytes());
    out
}

/// `jmp qword ptr [rip+disp32]` — same `disp32` convention as
/// [`mov_reg_rip_disp32`].
pub fn jmp_rip_disp32(disp: i32) -> Vec<u8> {
    let mut out = vec![0xFF, 0x25];
    out.extend_from_slice(&disp.to_le_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_low_and_extended_registers_differ_by_rex_prefix() {
        assert_eq!(push(Reg::Rdi), vec![0x57]);
        assert_eq!(push(Reg::R9), vec![0x41, 0x51]);
    }

    #[test]
    fn fs_store_imm32_matches_original_template_bytes() {
        let bytes = mov_fs_disp32_imm32(-32, 0);
        assert_eq!(bytes, vec![0x64, 0xC7, 0x04, 0x25, 0xE0, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0]);
    }

    #[test]
    fn call_reg_sets_rex_b_for_extended_registers() {
        assert_eq!(call_reg(Reg::R11), vec![0x41, 0xFF, 0xD3]);
        assert_eq!(call_reg(Reg::Rax), vec![0xFF, 0xD0]);
    }
}
