// This file is part of the extern-traces agent.
//
// Licensed under the GNU General Public License, version 3 or later.
// See the LICENSE file distributed with this crate for details.

//! Computes the four negative thread-pointer offsets the hook body and the
//! per-symbol stubs read and write, and (on x86-64) exposes raw accessors to
//! them for tests and the simulator app.
//!
//! Grounded on original_source's `thread_local_storage.c` (`fs:-8` read/write
//! via inline asm) and `hook.c`'s `build_hook_fn` patch table, which derives
//! two of the four offsets from the host-supplied `static_tls_base`.

/// The four thread-pointer-relative offsets the hook assembly reads and
/// writes. All are negative: they live below the thread pointer, the
/// convention used by the platform's `fs`-relative TLS model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlsLayout {
    /// Current label id, written by the per-symbol stub before the jump
    /// into the hook body. Fixed: lives in the agent's own reserved slot
    /// above the target's static TLS region.
    pub off_label: i32,
    /// The resolved original-function pointer, written by the per-symbol
    /// stub. Placed just past the target's static TLS so it cannot alias
    /// anything the target itself allocated there.
    pub off_orig: i32,
    /// Scratch slot for the return address, used only within the hook
    /// body's own call frame. Fixed, like `off_label`.
    pub off_ret: i32,
    /// Pointer to the calling thread's `PerThreadState`. Placed just past
    /// the target's static TLS, alongside `off_orig`.
    pub off_state: i32,
}

impl TlsLayout {
    pub const OFF_LABEL: i32 = -32;
    pub const OFF_RET: i32 = -16;

    /// `static_tls_base` is the size, in bytes, of the target image's own
    /// static TLS block; `off_state`/`off_orig` are placed immediately past
    /// it so the agent never aliases the target's own thread-local words.
    pub fn new(static_tls_base: u16) -> Self {
        let base = static_tls_base as i32;
        Self {
            off_label: Self::OFF_LABEL,
            off_orig: -base - 24,
            off_ret: Self::OFF_RET,
            off_state: -base - 8,
        }
    }
}

#[cfg(target_arch = "x86_64")]
pub mod raw {
    //! Direct `%fs`-relative reads and writes, for tests and the simulator
    //! app that want to poke the same words the generated machine code
    //! touches. Never used by the hot path itself, which only ever runs as
    //! emitted machine code.

    use core::arch::asm;

    /// # Safety
    /// `offset` must name a thread-pointer-relative word this thread owns
    /// and that is at least pointer-sized and pointer-aligned.
    pub unsafe fn read_u64(offset: i32) -> u64 {
        let value: u64;
        asm!(
            "mov {0}, fs:[{1}]",
            out(reg) value,
            in(reg) offset as i64,
            options(nostack, readonly),
        );
        value
    }

    /// # Safety
    /// Same requirements as [`read_u64`].
    pub unsafe fn write_u64(offset: i32, value: u64) {
        asm!(
            "mov fs:[{0}], {1}",
            in(reg) offset as i64,
            in(reg) value,
            options(nostack),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_offsets_never_move() {
        let layout = TlsLayout::new(0x1000);
        assert_eq!(layout.off_label, -32);
        assert_eq!(layout.off_ret, -16);
    }

    #[test]
    fn state_and_orig_shift_by_static_tls_base() {
        let layout = TlsLayout::new(0x2000);
        assert_eq!(layout.off_state, -0x2000 - 8);
        assert_eq!(layout.off_orig, -0x2000 - 24);
    }

    #[test]
    fn zero_base_degenerates_to_fixed_offsets_plus_constant() {
        let layout = TlsLayout::new(0);
        assert_eq!(layout.off_state, -8);
        assert_eq!(layout.off_orig, -24);
    }
}
