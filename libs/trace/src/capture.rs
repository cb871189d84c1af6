// This file is part of the extern-traces agent.
//
// Licensed under the GNU General Public License, version 3 or later.
// See the LICENSE file distributed with this crate for details.

//! Reads a GPU submit call's buffer arrays directly out of the argument
//! registers the hook body saved, for the tag-3 `SpanStartExtra` payload.
//!
//! Grounded on spec.md §4.8's payload order and the PS4 GNM submit ABI
//! (`count`, draw-buffer address/size arrays, compute-buffer address/size
//! arrays) that `sceGnmSubmitCommandBuffers` and its variants share, and on
//! original_source's `tracing.c` `emit_span_start`, which resolves these
//! arrays starting at the submit call's second argument (`args[1..5]`),
//! leaving the first argument (`rdi`) unused by the payload.

/// A snapshot of the six integer argument registers, in SysV calling
/// convention order, as the hook body lays them out on the stack: the
/// pointer handed to `emit_span_start` addresses `rdi` directly.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Args {
    pub rdi: u64,
    pub rsi: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub r8: u64,
    pub r9: u64,
}

/// # Safety
/// `args` must be a live GPU submit call's register snapshot: `rsi` a
/// buffer count, `rdx`/`r8` arrays of that many GPU buffer addresses, and
/// `rcx`/`r9` arrays of that many `u32` byte sizes, all readable for at
/// least `count` elements. `rdi` is the submit call's first argument and
/// is not part of this payload.
pub unsafe fn capture_submit_payload(args: &Args) -> Vec<u8> {
    let count = args.rsi as u32 as usize;
    let draw_addrs = args.rdx as *const u64;
    let draw_sizes = args.rcx as *const u32;
    let compute_addrs = args.r8 as *const u64;
    let compute_sizes = args.r9 as *const u32;

    let mut draw_size_words = Vec::with_capacity(count);
    let mut compute_size_words = Vec::with_capacity(count);
    for i in 0..count {
        draw_size_words.push(*draw_sizes.add(i));
        compute_size_words.push(*compute_sizes.add(i));
    }

    let mut payload = Vec::new();
    payload.extend_from_slice(&(count as u32).to_le_bytes());
    for &sz in &draw_size_words {
        payload.extend_from_slice(&sz.to_le_bytes());
    }
    for &sz in &compute_size_words {
        payload.extend_from_slice(&sz.to_le_bytes());
    }
    for i in 0..count {
        let ptr = *draw_addrs.add(i) as *const u8;
        let len = draw_size_words[i] as usize;
        payload.extend_from_slice(std::slice::from_raw_parts(ptr, len));
    }
    for i in 0..count {
        let ptr = *compute_addrs.add(i) as *const u8;
        let len = compute_size_words[i] as usize;
        payload.extend_from_slice(std::slice::from_raw_parts(ptr, len));
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_counts_sizes_and_buffer_bytes_in_order() {
        let draw_buf: [u8; 4] = [0xAA, 0xBB, 0xCC, 0xDD];
        let compute_buf: [u8; 2] = [0x11, 0x22];
        let draw_addrs = [draw_buf.as_ptr() as u64];
        let draw_sizes = [draw_buf.len() as u32];
        let compute_addrs = [compute_buf.as_ptr() as u64];
        let compute_sizes = [compute_buf.len() as u32];

        let args = Args {
            rdi: 0,
            rsi: 1,
            rdx: draw_addrs.as_ptr() as u64,
            rcx: draw_sizes.as_ptr() as u64,
            r8: compute_addrs.as_ptr() as u64,
            r9: compute_sizes.as_ptr() as u64,
        };

        let payload = unsafe { capture_submit_payload(&args) };
        let mut expected = Vec::new();
        expected.extend_from_slice(&1u32.to_le_bytes());
        expected.extend_from_slice(&4u32.to_le_bytes());
        expected.extend_from_slice(&2u32.to_le_bytes());
        expected.extend_from_slice(&draw_buf);
        expected.extend_from_slice(&compute_buf);
        assert_eq!(payload, expected);
    }

    #[test]
    fn zero_buffers_yields_just_the_count() {
        let args = Args {
            rdi: 0,
            rsi: 0,
            rdx: 0,
            rcx: 0,
            r8: 0,
            r9: 0,
        };
        let payload = unsafe { capture_submit_payload(&args) };
        assert_eq!(payload, 0u32.to_le_bytes().to_vec());
    }
}
