// This file is part of the extern-traces agent.
//
// Licensed under the GNU General Public License, version 3 or later.
// See the LICENSE file distributed with this crate for details.

//! Builds the shared hook body and per-symbol stubs, maps them into
//! executable pages, and patches every accepted JUMP_SLOT target to point
//! at its stub.
//!
//! Grounded on original_source's `hook.c` `register_hooks` (the
//! mmap-a-RWX-block-then-flip-to-RX install protocol, and the
//! already-in-stub-region / sentinel-value skip checks) and spec.md §4.5's
//! explicit failure-mode split between `Resource` (mapping failure) and
//! `Corruption` (verification mismatch).

mod codegen;
mod hook_body;
mod stub;

use log::{debug, info, warn};
use reloc::RelocationIndex;
use std::os::raw::c_void;
use std::sync::Mutex;
use thiserror::Error;
use tls::TlsLayout;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("failed to map {len} bytes of trampoline memory: {source}")]
    Resource {
        len: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("trampoline code at {region:#x} did not read back as written")]
    Corruption { region: usize },
}

const PAGE_SIZE: usize = 4096;

/// JUMP_SLOT values at or above this look like the dynamic linker's
/// not-yet-resolved lazy-binding sentinel rather than a real function
/// pointer; original_source's `hook.c` treats these the same way spec.md
/// §4.5 describes: skip rather than capture as "original".
const SENTINEL_FLOOR: u64 = 0xeffffffe_00000000;

fn round_up_to_page(len: usize) -> usize {
    ((len + PAGE_SIZE - 1) / PAGE_SIZE) * PAGE_SIZE
}

fn mmap_rwx(len: usize) -> Result<*mut u8, InstallError> {
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        return Err(InstallError::Resource {
            len,
            source: std::io::Error::last_os_error(),
        });
    }
    Ok(ptr as *mut u8)
}

fn mprotect(ptr: *mut u8, len: usize, prot: libc::c_int) -> Result<(), InstallError> {
    let rc = unsafe { libc::mprotect(ptr as *mut c_void, len, prot) };
    if rc != 0 {
        return Err(InstallError::Resource {
            len,
            source: std::io::Error::last_os_error(),
        });
    }
    Ok(())
}

fn page_align_down(addr: usize) -> *mut u8 {
    (addr & !(PAGE_SIZE - 1)) as *mut u8
}

fn verify(region: *mut u8, expected: &[u8]) -> Result<(), InstallError> {
    let written = unsafe { std::slice::from_raw_parts(region, expected.len()) };
    if written != expected {
        return Err(InstallError::Corruption {
            region: region as usize,
        });
    }
    Ok(())
}

fn looks_sentinel(value: u64) -> bool {
    value >= SENTINEL_FLOOR
}

fn already_in_region(value: u64, region: *mut u8, region_len: usize) -> bool {
    let base = region as u64;
    value >= base && value < base + region_len as u64
}

/// Result of scanning and patching one JUMP_SLOT target.
enum PatchOutcome {
    Installed,
    SkippedAlreadyInstalled,
    SkippedSentinel,
}

/// Captures the current value at `target`, and if it is neither already
/// one of this installation's own stubs nor a sentinel, writes `bytes` into
/// `stub_slot` and repoints `target` at it. Returns what happened so the
/// caller can log/count without duplicating the decision.
///
/// # Safety
/// `target` must be a writable JUMP_SLOT GOT-equivalent word whose page has
/// already been made writable by the caller; `stub_slot` must be a live,
/// writable, at-least-`stub::STUB_LEN`-byte region inside `region`.
unsafe fn patch_one(
    target: *mut u64,
    stub_slot: *mut u8,
    region: *mut u8,
    region_len: usize,
    label_id: u32,
    layout: TlsLayout,
    hook_body_addr: u64,
) -> PatchOutcome {
    let current = target.read_unaligned();
    if already_in_region(current, region, region_len) {
        return PatchOutcome::SkippedAlreadyInstalled;
    }
    if looks_sentinel(current) {
        return PatchOutcome::SkippedSentinel;
    }
    let bytes = stub::build(label_id, layout, current, hook_body_addr);
    std::ptr::copy_nonoverlapping(bytes.as_ptr(), stub_slot, stub::STUB_LEN);
    target.write_unaligned(stub_slot as u64);
    PatchOutcome::Installed
}

/// Owns the mapped hook body and stub pages and the book-keeping needed to
/// re-scan and re-patch JUMP_SLOT targets after a module load.
pub struct Trampolines {
    labels: Vec<reloc::Label>,
    image_base: u64,
    layout: TlsLayout,
    stub_region: *mut u8,
    stub_region_len: usize,
    hook_body_region: *mut u8,
    hook_body_region_len: usize,
    /// Serializes `reregister` against itself; install-time patching is
    /// single-threaded by construction (it runs before any stub can fire).
    lock: Mutex<()>,
}

// SAFETY: `stub_region`/`hook_body_region` are plain heap-like mmap'd
// allocations never aliased by safe Rust; all mutation after construction
// goes through `reregister`, which is serialized by `lock`.
unsafe impl Send for Trampolines {}
unsafe impl Sync for Trampolines {}

impl Trampolines {
    /// Builds the hook body and one stub per `index` label, and patches
    /// every accepted JUMP_SLOT target (at `image_base + target_image_offset`)
    /// to point at its stub. `emit_span_start`/`emit_span_end` are the
    /// addresses of `trace`'s `extern "C"` entry points.
    pub fn install(
        index: &RelocationIndex,
        layout: TlsLayout,
        image_base: u64,
        emit_span_start: u64,
        emit_span_end: u64,
    ) -> Result<Self, InstallError> {
        let hook_body_bytes = hook_body::build(layout, emit_span_start, emit_span_end);
        let hook_body_region_len = round_up_to_page(hook_body_bytes.len());
        let hook_body_region = mmap_rwx(hook_body_region_len)?;
        unsafe {
            std::ptr::copy_nonoverlapping(hook_body_bytes.as_ptr(), hook_body_region, hook_body_bytes.len());
        }
        verify(hook_body_region, &hook_body_bytes)?;
        let hook_body_addr = hook_body_region as u64;

        let stub_region_len = round_up_to_page(stub::STUB_LEN * index.labels.len().max(1));
        let stub_region = mmap_rwx(stub_region_len)?;

        let mut installed = 0usize;
        let mut skipped = 0usize;
        for (i, label) in index.labels.iter().enumerate() {
            let stub_slot = unsafe { stub_region.add(i * stub::STUB_LEN) };
            let target = (image_base + label.target_image_offset) as *mut u64;
            mprotect(page_align_down(target as usize), PAGE_SIZE, libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC)?;

            match unsafe {
                patch_one(target, stub_slot, stub_region, stub_region_len, label.label_id, layout, hook_body_addr)
            } {
                PatchOutcome::Installed => installed += 1,
                PatchOutcome::SkippedAlreadyInstalled => {
                    debug!("label {} already points into the stub region; leaving as-is", label.label_id);
                    skipped += 1;
                }
                PatchOutcome::SkippedSentinel => {
                    warn!("label {} JUMP_SLOT target looks unresolved; skipping", label.label_id);
                    skipped += 1;
                }
            }
        }
        mprotect(stub_region, stub_region_len, libc::PROT_READ | libc::PROT_EXEC)?;
        mprotect(hook_body_region, hook_body_region_len, libc::PROT_READ | libc::PROT_EXEC)?;

        info!("installed {} trampolines ({} skipped)", installed, skipped);

        Ok(Self {
            labels: index.labels.clone(),
            image_base,
            layout,
            stub_region,
            stub_region_len,
            hook_body_region,
            hook_body_region_len,
            lock: Mutex::new(()),
        })
    }

    /// Re-scans every label's JUMP_SLOT target and re-patches any that the
    /// dynamic loader has re-bound since install (or the last
    /// `reregister`), updating the existing stub's baked-in original
    /// target rather than allocating a new one. Called after a span-end
    /// for the module-load label.
    pub fn reregister(&self) -> Result<(), InstallError> {
        let _guard = self.lock.lock().unwrap();
        mprotect(self.stub_region, self.stub_region_len, libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC)?;

        let mut rebound = 0usize;
        for (i, label) in self.labels.iter().enumerate() {
            let stub_slot = unsafe { self.stub_region.add(i * stub::STUB_LEN) };
            let stub_addr = stub_slot as u64;
            let target = (self.image_base + label.target_image_offset) as *mut u64;
            mprotect(page_align_down(target as usize), PAGE_SIZE, libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC)?;

            let current = unsafe { target.read_unaligned() };
            if current == stub_addr || looks_sentinel(current) {
                continue;
            }
            unsafe {
                let orig_slot = stub_slot.add(stub::ORIG_TARGET_OFFSET) as *mut u64;
                orig_slot.write_unaligned(current);
                target.write_unaligned(stub_addr);
            }
            rebound += 1;
        }
        mprotect(self.stub_region, self.stub_region_len, libc::PROT_READ | libc::PROT_EXEC)?;
        if rebound > 0 {
            info!("reregistered {} JUMP_SLOT targets rebound by the dynamic loader", rebound);
        }
        Ok(())
    }
}

impl Drop for Trampolines {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.stub_region as *mut c_void, self.stub_region_len);
            libc::munmap(self.hook_body_region as *mut c_void, self.hook_body_region_len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_in_region_bounds_check() {
        let region = 0x1000 as *mut u8;
        assert!(already_in_region(0x1500, region, 0x1000));
        assert!(!already_in_region(0x2500, region, 0x1000));
        assert!(!already_in_region(0x0500, region, 0x1000));
    }

    #[test]
    fn sentinel_floor_matches_spec() {
        assert!(looks_sentinel(0xeffffffe_00000000));
        assert!(!looks_sentinel(0xeffffffd_ffffffff));
    }

    #[test]
    fn page_rounding_rounds_up() {
        assert_eq!(round_up_to_page(1), PAGE_SIZE);
        assert_eq!(round_up_to_page(PAGE_SIZE), PAGE_SIZE);
        assert_eq!(round_up_to_page(PAGE_SIZE + 1), PAGE_SIZE * 2);
    }
}
