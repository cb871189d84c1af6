// This file is part of the extern-traces agent.
//
// Licensed under the GNU General Public License, version 3 or later.
// See the LICENSE file distributed with this crate for details.

//! The `emit_span_start`/`emit_span_end` entry points the hook body calls,
//! and the one-shot "capture this submit" trigger.
//!
//! Grounded on original_source's `tracing.c`: the `SpecificSymbolsTable`
//! dispatch in `emit_span_start`, `capture_next_submit`'s one-shot flag,
//! and `emit_span_end`'s post-commit `reregister_hooks()` call for the
//! module-load label — generalized per spec.md §9's design note into an
//! explicit `label_id -> continuation` table rather than file-scope
//! `static` trampoline state.

pub mod capture;
pub mod records;

use capture::Args;
use once_cell::sync::OnceCell;
use registry::PerThreadState;
use reloc::WellKnownSymbols;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tls::TlsLayout;

/// Continuations to run once a span-end record for a specific label id has
/// been committed — e.g. re-scanning the GOT after a module load.
pub type PostHooks = HashMap<u64, Box<dyn Fn() + Send + Sync>>;

struct TraceEmitterState {
    well_known: WellKnownSymbols,
    tls_layout: TlsLayout,
    initial_ring_size: u64,
    capture_next_submit: AtomicBool,
    post_hooks: PostHooks,
}

static STATE: OnceCell<TraceEmitterState> = OnceCell::new();

/// Wires the emitter up. Must run once, before the target can reach any
/// installed trampoline.
pub fn install(
    well_known: WellKnownSymbols,
    tls_layout: TlsLayout,
    initial_ring_size: u64,
    post_hooks: PostHooks,
) {
    let state = TraceEmitterState {
        well_known,
        tls_layout,
        initial_ring_size,
        capture_next_submit: AtomicBool::new(false),
        post_hooks,
    };
    if STATE.set(state).is_err() {
        log::warn!("trace::install called more than once; ignoring");
    }
}

/// Arms the one-shot "capture the next GPU submit's buffers" trigger.
/// Consumed (cleared) by the next matching submit, per spec.md §4.8.
pub fn arm_capture_next_submit() {
    if let Some(state) = STATE.get() {
        state.capture_next_submit.store(true, Ordering::Release);
    }
}

fn state() -> &'static TraceEmitterState {
    STATE
        .get()
        .expect("trace::install must run before any hooked call can fire")
}

/// Resolves a possibly-null state pointer, lazily creating and registering
/// a `PerThreadState` on first use from a given thread. Mirrors
/// original_source's `lazy_read_value`.
///
/// # Safety
/// `state_ptr`, if non-null, must point at a live `PerThreadState` owned by
/// the calling thread.
unsafe fn resolve_state(state_ptr: *mut PerThreadState) -> &'static PerThreadState {
    if !state_ptr.is_null() {
        return &*state_ptr;
    }
    let cfg = state();
    &*registry::current(cfg.tls_layout, cfg.initial_ring_size)
}

#[cfg(target_arch = "x86_64")]
fn read_cycle_counter() -> u64 {
    let mut aux: u32 = 0;
    unsafe { core::arch::x86_64::__rdtscp(&mut aux) }
}

#[cfg(not(target_arch = "x86_64"))]
fn read_cycle_counter() -> u64 {
    0
}

fn is_submit_label(well_known: &WellKnownSymbols, label_id: u64) -> bool {
    let label = label_id as i64;
    label == well_known.gnm_submit_and_flip_for_workload
        || label == well_known.gnm_submit_and_flip
        || label == well_known.gnm_submit
}

/// Called by the hook body with the label id and `PerThreadState` pointer
/// it read out of TLS, plus a pointer to the caller's saved argument
/// registers. Never unwinds: spec.md §7 forbids the fast path from
/// propagating errors into the hooked call.
///
/// # Safety
/// Must only be called from generated trampoline code with the arguments
/// that code promises: `state_ptr` either null or this thread's own state,
/// `args` a live pointer to six saved argument registers.
#[no_mangle]
pub unsafe extern "C" fn emit_span_start(label_id: u64, state_ptr: *mut PerThreadState, args: *const Args) {
    let state = resolve_state(state_ptr);
    state.set_last_label_id(label_id);
    let time = read_cycle_counter();
    let cfg = self::state();

    if is_submit_label(&cfg.well_known, label_id) && cfg.capture_next_submit.swap(false, Ordering::AcqRel) {
        let payload = capture::capture_submit_payload(&*args);
        state.emit(&records::span_start_extra(state.thread_id, time, label_id, &payload));
    } else {
        state.emit(&records::span_start(state.thread_id, time, label_id));
    }
}

/// Called by the hook body after the original function returns, with the
/// raw return value (RAX) per spec.md §4.5. The wire format does not yet
/// carry it; the parameter exists so the hook body's ABI matches §4.5
/// exactly and future record kinds can use it.
///
/// # Safety
/// Same requirements as [`emit_span_start`].
#[no_mangle]
pub unsafe extern "C" fn emit_span_end(state_ptr: *mut PerThreadState, return_value: u64) {
    let _ = return_value;
    let state = resolve_state(state_ptr);
    let time = read_cycle_counter();
    state.emit(&records::span_end(state.thread_id, time));

    let cfg = self::state();
    if let Some(hook) = cfg.post_hooks.get(&state.last_label_id()) {
        hook();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn fresh_state() -> Box<PerThreadState> {
        // PerThreadState::new is private to `registry`; build one indirectly
        // via the lazy-init path on a throwaway thread so each test gets an
        // independent instance without touching the process-wide registry
        // from the main test thread.
        std::thread::spawn(|| unsafe {
            let ptr = registry::current(TlsLayout::new(0), 64);
            Box::from_raw(ptr)
        })
        .join()
        .unwrap()
    }

    #[test]
    fn span_start_then_end_emits_two_records_in_order() {
        let state = fresh_state();
        let args = Args { rdi: 0, rsi: 0, rdx: 0, rcx: 0, r8: 0, r9: 0 };
        unsafe {
            emit_span_start(5, &*state as *const _ as *mut _, &args as *const _);
            emit_span_end(&*state as *const _ as *mut _, 0);
        }

        let mut sink = Vec::new();
        ring::drain(state.current_buffer(), &mut sink).unwrap();
        assert_eq!(sink.len(), 32 + 24);
        let label_id = u64::from_le_bytes(sink[24..32].try_into().unwrap());
        assert_eq!(label_id, 5);
        let end_tag = u64::from_le_bytes(sink[32..40].try_into().unwrap());
        assert_eq!(end_tag, records::TAG_SPAN_END);
    }

    #[test]
    fn post_hook_fires_after_span_end_for_its_label() {
        install(
            WellKnownSymbols {
                sysmodule_load_module: 3,
                ..Default::default()
            },
            TlsLayout::new(0),
            64,
            {
                let mut hooks: PostHooks = HashMap::new();
                let fired = Arc::new(AtomicUsize::new(0));
                let fired_for_hook = fired.clone();
                hooks.insert(3, Box::new(move || {
                    fired_for_hook.fetch_add(1, Ordering::SeqCst);
                }));
                hooks
            },
        );

        let state = fresh_state();
        let args = Args { rdi: 0, rsi: 0, rdx: 0, rcx: 0, r8: 0, r9: 0 };
        unsafe {
            emit_span_start(3, &*state as *const _ as *mut _, &args as *const _);
            emit_span_end(&*state as *const _ as *mut _, 0);
        }
        assert_eq!(state.last_label_id(), 3);
    }
}
