// This file is part of the extern-traces agent.
//
// Licensed under the GNU General Public License, version 3 or later.
// See the LICENSE file distributed with this crate for details.

//! Owns the TCP connection to the collector: sends the one-time preamble,
//! then round-robins the thread registry, shipping each thread's ring
//! chain and a counters record when its dropped-packet count has moved.
//!
//! Grounded on original_source's `logger.c` (`flush_thread`'s per-slot
//! drain-then-reclaim loop and the `InitialMessageHeader`/module/library/
//! symbol preamble write in its connect path).

pub mod preamble;

use byteorder::{WriteBytesExt, LE};
use dynamic::{Library, Module};
use log::{error, info, warn};
use reloc::Label;
use registry::{PerThreadState, ThreadRegistry};
use std::io::Write;
use std::net::{Ipv4Addr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DrainError {
    #[error("failed to connect to collector at {addr}:{port}: {source}")]
    Connect {
        addr: Ipv4Addr,
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("transport error while draining: {0}")]
    Transport(#[from] std::io::Error),
}

/// Sleep between round-robin passes when there is nothing new to ship.
/// spec.md §4.9 budgets this at "≤ 10 ms, alternative: yield".
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

const TAG_COUNTERS: u64 = 2;

/// Connects, sends the preamble, and returns the open stream ready for the
/// steady-state record loop.
pub fn connect_and_greet(
    addr: Ipv4Addr,
    port: u16,
    tsc_frequency: u64,
    anchor: (i64, i64, u64),
    modules: &[Module],
    libraries: &[Library],
    labels: &[Label],
) -> Result<TcpStream, DrainError> {
    let mut stream = TcpStream::connect((addr, port)).map_err(|source| DrainError::Connect { addr, port, source })?;
    preamble::write_preamble(&mut stream, tsc_frequency, anchor, modules, libraries, labels)?;
    Ok(stream)
}

fn emit_counters_if_advanced(stream: &mut TcpStream, state: &PerThreadState, now: u64) -> std::io::Result<()> {
    let dropped = state.dropped_packets();
    let last_reported = state.last_dropped_reported();
    if dropped == last_reported {
        return Ok(());
    }
    let delta = dropped - last_reported;
    let last_time = state.last_counter_time();
    stream.write_u64::<LE>(TAG_COUNTERS)?;
    stream.write_u64::<LE>(state.thread_id)?;
    stream.write_u64::<LE>(delta)?;
    stream.write_u64::<LE>(last_time)?;
    stream.write_u64::<LE>(now)?;
    state.set_last_dropped_reported(dropped);
    state.set_last_counter_time(now);
    Ok(())
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

/// One round-robin pass over every registry slot: drain its ring chain,
/// emit a counters record if warranted, and reclaim it if the owning
/// thread has finished.
fn drain_pass(stream: &mut TcpStream, registry: &ThreadRegistry) -> std::io::Result<()> {
    for slot in registry.slots() {
        let ptr = slot.load(std::sync::atomic::Ordering::Acquire);
        if ptr.is_null() {
            continue;
        }
        // SAFETY: non-null slot values always point at a live
        // `PerThreadState` published by `registry::current`.
        let state = unsafe { &*ptr };
        ring::drain(state.current_buffer(), stream)?;
        emit_counters_if_advanced(stream, state, read_cycle_counter())?;
        registry.reclaim_if_finished(slot);
    }
    Ok(())
}

/// Runs the drain loop until `shutdown` is observed or a transport error
/// occurs, at which point the socket is closed and the loop returns. Per
/// spec.md §5, the target keeps recording (and possibly dropping once its
/// rings fill) after this returns; it does not tear down trampolines.
pub fn run(mut stream: TcpStream, registry: &ThreadRegistry, shutdown: Arc<AtomicBool>) {
    loop {
        let stopping = shutdown.load(Ordering::Acquire);
        if let Err(err) = drain_pass(&mut stream, registry) {
            error!("drain transport error, closing connection: {err}");
            return;
        }
        if stopping {
            info!("drain thread observed shutdown flag; exiting after final pass");
            return;
        }
        std::thread::sleep(DRAIN_POLL_INTERVAL);
    }
}

/// Convenience for callers that only have a stream, not yet wrapped for
/// `Write`; kept separate from `run` so tests can drive `drain_pass`
/// directly against an in-memory sink.
pub fn warn_if_registry_overflowed_at_start(registry: &ThreadRegistry) {
    if registry.slots().iter().all(|s| s.load(std::sync::atomic::Ordering::Relaxed).is_null()) {
        warn!("drain starting with an empty thread registry; nothing to ship yet");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn emit_counters_skips_when_nothing_dropped() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut client = TcpStream::connect(addr).unwrap();
        let (_server, _) = listener.accept().unwrap();

        let state = unsafe { &*registry::current(tls::TlsLayout::new(0), 64) };
        emit_counters_if_advanced(&mut client, state, 42).unwrap();
    }
}
