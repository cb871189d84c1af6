// This file is part of the extern-traces agent.
//
// Licensed under the GNU General Public License, version 3 or later.
// See the LICENSE file distributed with this crate for details.

//! `PerThreadState` and the 256-slot `ThreadRegistry` that publishes it for
//! the drain thread to find.
//!
//! Grounded on original_source's `logger.c`: `global_states[256]`,
//! `init_thread_local_state`'s CAS-into-first-null-slot publish, and
//! `destructor_function`'s lazy `is_finished` mark picked up by the drainer
//! in `flush_thread`.

use log::warn;
use once_cell::sync::Lazy;
use ring::RingBuffer;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU64, Ordering};
use tls::TlsLayout;

/// Hard cap on concurrently drained threads, per spec.md §9's "Registry
/// capacity" design note.
pub const REGISTRY_CAPACITY: usize = 256;

pub struct PerThreadState {
    pub thread_id: u64,
    current_buffer: AtomicPtr<RingBuffer>,
    dropped_packets: AtomicU64,
    last_dropped_reported: AtomicU64,
    last_counter_time: AtomicU64,
    is_finished: AtomicBool,
    last_label_id: AtomicU64,
}

impl PerThreadState {
    fn new(thread_id: u64, initial_ring_size: u64) -> Box<Self> {
        let ring = Box::new(RingBuffer::new(initial_ring_size));
        Box::new(Self {
            thread_id,
            current_buffer: AtomicPtr::new(Box::into_raw(ring)),
            dropped_packets: AtomicU64::new(0),
            last_dropped_reported: AtomicU64::new(0),
            last_counter_time: AtomicU64::new(0),
            is_finished: AtomicBool::new(false),
            last_label_id: AtomicU64::new(0),
        })
    }

    pub fn last_label_id(&self) -> u64 {
        self.last_label_id.load(Ordering::Relaxed)
    }

    pub fn set_last_label_id(&self, label_id: u64) {
        self.last_label_id.store(label_id, Ordering::Relaxed);
    }

    pub fn dropped_packets(&self) -> u64 {
        self.dropped_packets.load(Ordering::Relaxed)
    }

    pub fn last_dropped_reported(&self) -> u64 {
        self.last_dropped_reported.load(Ordering::Relaxed)
    }

    pub fn set_last_dropped_reported(&self, value: u64) {
        self.last_dropped_reported.store(value, Ordering::Relaxed);
    }

    pub fn last_counter_time(&self) -> u64 {
        self.last_counter_time.load(Ordering::Relaxed)
    }

    pub fn set_last_counter_time(&self, value: u64) {
        self.last_counter_time.store(value, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.is_finished.load(Ordering::Acquire)
    }

    fn mark_finished(&self) {
        self.is_finished.store(true, Ordering::Release);
    }

    /// The drainer's view of this thread's ring chain head.
    pub fn current_buffer(&self) -> &RingBuffer {
        // SAFETY: always a live ring, published by `new`/`emit` with
        // `Release` and never set null while this state is reachable.
        unsafe { &*self.current_buffer.load(Ordering::Acquire) }
    }

    /// Writer side of spec.md §4.6: reserve against the current ring,
    /// growing and swinging `current_buffer` on overflow, dropping (and
    /// counting) the record if even a grown ring can't hold it.
    pub fn emit(&self, bytes: &[u8]) {
        let current_ptr = self.current_buffer.load(Ordering::Acquire);
        // SAFETY: only this thread ever replaces `current_buffer`, and it
        // never frees the ring it points past (that's `previous`'s job).
        let current = unsafe { &*current_ptr };
        match current.reserve(bytes.len()) {
            ring::ReserveOutcome::Fits(reservation) => {
                current.write(&reservation, bytes);
                current.commit(reservation);
            }
            ring::ReserveOutcome::Grown {
                new_ring,
                reservation,
            } => {
                new_ring.write(&reservation, bytes);
                new_ring.commit(reservation);
                self.current_buffer
                    .store(Box::into_raw(new_ring), Ordering::Release);
            }
            ring::ReserveOutcome::Dropped => {
                self.dropped_packets.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl Drop for PerThreadState {
    fn drop(&mut self) {
        let ring = self.current_buffer.swap(ptr::null_mut(), Ordering::Relaxed);
        if !ring.is_null() {
            // SAFETY: uniquely owned; see `current_buffer`'s invariant.
            drop(unsafe { Box::from_raw(ring) });
        }
    }
}

/// The 256-slot registry. Logically a fixed-size array; stored as a `Vec`
/// because `AtomicPtr` is not `Copy` and array-repeat syntax needs it.
pub struct ThreadRegistry {
    slots: Vec<AtomicPtr<PerThreadState>>,
    overflow_warned: AtomicBool,
}

impl ThreadRegistry {
    fn new() -> Self {
        Self {
            slots: (0..REGISTRY_CAPACITY)
                .map(|_| AtomicPtr::new(ptr::null_mut()))
                .collect(),
            overflow_warned: AtomicBool::new(false),
        }
    }

    /// Slot view for the drain thread's round-robin pass.
    pub fn slots(&self) -> &[AtomicPtr<PerThreadState>] {
        &self.slots
    }

    /// CAS-publishes `state` into the first free slot. Returns `None` if
    /// the registry is full: `state` is still valid and usable, it simply
    /// will never be drained (spec.md §9).
    fn publish(&self, state: *mut PerThreadState) -> bool {
        for slot in &self.slots {
            if slot
                .compare_exchange(ptr::null_mut(), state, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
        if !self.overflow_warned.swap(true, Ordering::Relaxed) {
            warn!(
                "thread registry is full ({} slots); overflowing threads will emit but not be drained",
                REGISTRY_CAPACITY
            );
        }
        false
    }

    /// Frees `state` and nulls `slot` if it has finished. Drainer-only.
    pub fn reclaim_if_finished(&self, slot: &AtomicPtr<PerThreadState>) {
        let ptr = slot.load(Ordering::Acquire);
        if ptr.is_null() {
            return;
        }
        // SAFETY: non-null slot values are always state pointers this
        // registry (or the owning thread, for unregistered overflow
        // states) published.
        let state = unsafe { &*ptr };
        if state.is_finished()
            && slot
                .compare_exchange(ptr, ptr::null_mut(), Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
        {
            drop(unsafe { Box::from_raw(ptr) });
        }
    }
}

static REGISTRY: Lazy<ThreadRegistry> = Lazy::new(ThreadRegistry::new);

pub fn registry() -> &'static ThreadRegistry {
    &REGISTRY
}

struct ThreadHandle {
    state: *mut PerThreadState,
    registered: bool,
}

impl Drop for ThreadHandle {
    fn drop(&mut self) {
        // SAFETY: `state` was allocated by `PerThreadState::new` and never
        // freed elsewhere while this handle is alive.
        let state = unsafe { &*self.state };
        if self.registered {
            // The drainer frees it on its next pass.
            state.mark_finished();
        } else {
            drop(unsafe { Box::from_raw(self.state) });
        }
    }
}

std::thread_local! {
    static CURRENT: std::cell::RefCell<Option<ThreadHandle>> = std::cell::RefCell::new(None);
}

fn current_thread_id() -> u64 {
    // A stable-enough per-thread numeric id for wire records; not required
    // to match the host's native thread id space.
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    use std::hash::{Hash, Hasher};
    std::thread::current().id().hash(&mut hasher);
    hasher.finish()
}

/// Returns this thread's `PerThreadState`, lazily creating, registering,
/// and publishing it into the TLS `OFF_STATE` slot on first use. Mirrors
/// original_source's `lazy_read_value`.
///
/// # Safety
/// Must be called from the thread the state belongs to, with `tls_layout`
/// matching the layout the live trampolines were installed with.
pub unsafe fn current(tls_layout: TlsLayout, initial_ring_size: u64) -> *mut PerThreadState {
    CURRENT.with(|cell| {
        if let Some(handle) = cell.borrow().as_ref() {
            return handle.state;
        }
        let thread_id = current_thread_id();
        let state = Box::into_raw(PerThreadState::new(thread_id, initial_ring_size));
        let registered = registry().publish(state);
        tls::raw::write_u64(tls_layout.off_state, state as u64);
        *cell.borrow_mut() = Some(ThreadHandle { state, registered });
        state
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_then_current_buffer_drains_in_order() {
        let state = PerThreadState::new(42, 64);
        state.emit(b"one");
        state.emit(b"two");

        let mut sink = Vec::new();
        ring::drain(state.current_buffer(), &mut sink).unwrap();
        assert_eq!(sink, b"onetwo");
    }

    #[test]
    fn dropped_packets_counted_on_oversized_reservation() {
        let state = PerThreadState::new(1, 16);
        let huge = vec![0u8; (ring::RING_SIZE_CAP + 1) as usize];
        state.emit(&huge);
        assert_eq!(state.dropped_packets(), 1);
    }

    #[test]
    fn publish_fills_slots_and_reports_overflow() {
        let registry = ThreadRegistry::new();
        let mut handles = Vec::new();
        for i in 0..REGISTRY_CAPACITY {
            let state = Box::into_raw(PerThreadState::new(i as u64, 64));
            assert!(registry.publish(state));
            handles.push(state);
        }
        let overflow = Box::into_raw(PerThreadState::new(9999, 64));
        assert!(!registry.publish(overflow));

        for state in handles {
            drop(unsafe { Box::from_raw(state) });
        }
        drop(unsafe { Box::from_raw(overflow) });
    }

    #[test]
    fn reclaim_frees_finished_slot() {
        let registry = ThreadRegistry::new();
        let state = Box::into_raw(PerThreadState::new(7, 64));
        assert!(registry.publish(state));
        unsafe { (*state).mark_finished() };

        registry.reclaim_if_finished(&registry.slots()[0]);
        assert!(registry.slots()[0].load(Ordering::Acquire).is_null());
    }
}
