// This file is part of the extern-traces agent.
//
// Licensed under the GNU General Public License, version 3 or later.
// See the LICENSE file distributed with this crate for details.

//! A single-producer/single-consumer ring buffer that grows by chaining a
//! freshly allocated, larger ring behind the one it supersedes, rather than
//! ever copying existing payload bytes.
//!
//! Grounded on original_source's `logger.c` (`write_to_buffer`/
//! `flush_logging_entries`, the fixed-size variant this generalizes) for the
//! wrap-around split and the free-space-at-equality-rejects rule.

use log::warn;
use std::cell::UnsafeCell;
use std::io;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU64, Ordering};

/// Smallest ring ever allocated; matches the 16 KiB starting size used in
/// the growth scenario this module is tested against.
pub const DEFAULT_RING_SIZE: u64 = 16 * 1024;

/// No ring grows past this size; a reservation that would need more is
/// dropped instead.
pub const RING_SIZE_CAP: u64 = 64 * 1024 * 1024;

/// A reservation returned by [`RingBuffer::reserve`]: a contiguous logical
/// window `[write_idx, write_idx + len)` (mod `size`) the caller may now
/// fill via [`RingBuffer::write`] and publish via [`RingBuffer::commit`].
#[derive(Debug, Clone, Copy)]
pub struct Reservation {
    write_idx: u64,
    len: usize,
    /// Whether this reservation is against a freshly grown ring rather than
    /// the one `reserve` was called on.
    pub is_new: bool,
}

/// The result of [`RingBuffer::reserve`].
pub enum ReserveOutcome {
    /// The existing ring had room; write against the ring `reserve` was
    /// called on.
    Fits(Reservation),
    /// The existing ring was full; a new, larger ring was allocated with
    /// the old one linked as `previous`. Write against `new_ring`, then
    /// publish it as the caller's current ring once committed.
    Grown {
        new_ring: Box<RingBuffer>,
        reservation: Reservation,
    },
    /// Allocation of a larger ring failed (or the requested length exceeds
    /// [`RING_SIZE_CAP`]). The caller should count this as a dropped
    /// record; nothing was reserved.
    Dropped,
}

pub struct RingBuffer {
    write_idx: AtomicU64,
    read_idx: AtomicU64,
    size: u64,
    data: UnsafeCell<Box<[u8]>>,
    /// Raw pointer to the ring this one superseded, or null. Owned: once
    /// stored here, freeing it is this ring's responsibility (via `drain`
    /// or `Drop`).
    previous: AtomicPtr<RingBuffer>,
}

// SAFETY: `data` is written only by the single producer and read only by
// the single consumer, coordinated by the `write_idx`/`read_idx` acquire-
// release pair documented on each method below.
unsafe impl Sync for RingBuffer {}

impl RingBuffer {
    pub fn new(size: u64) -> Self {
        assert!(size >= 2, "ring must hold at least one byte of payload");
        Self {
            write_idx: AtomicU64::new(0),
            read_idx: AtomicU64::new(0),
            size,
            data: UnsafeCell::new(vec![0u8; size as usize].into_boxed_slice()),
            previous: AtomicPtr::new(ptr::null_mut()),
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Usable payload capacity: one byte short of `size`, so that
    /// `write_idx == read_idx` is unambiguously "empty".
    pub fn capacity(&self) -> u64 {
        self.size - 1
    }

    fn free_space(write_idx: u64, read_idx: u64, size: u64) -> u64 {
        if write_idx >= read_idx {
            size - (write_idx - read_idx)
        } else {
            read_idx - write_idx
        }
    }

    fn grow_size(len: u64, current_size: u64) -> u64 {
        let target = (2 * len).max(2 * current_size).max(2);
        target.next_power_of_two().min(RING_SIZE_CAP)
    }

    /// Reserves `len` bytes of contiguous logical space. Growth happens in
    /// place conceptually: the returned `Grown` ring already carries the
    /// reservation, and the old ring (`self`) becomes its `previous` link.
    pub fn reserve(&self, len: usize) -> ReserveOutcome {
        let len_u64 = len as u64;
        let write_idx = self.write_idx.load(Ordering::Relaxed);
        let read_idx = self.read_idx.load(Ordering::Acquire);
        let free = Self::free_space(write_idx, read_idx, self.size);

        // Equality is rejected, not just `<`, so a full ring is never
        // mistaken for an empty one.
        if free > len_u64 {
            return ReserveOutcome::Fits(Reservation {
                write_idx,
                len,
                is_new: false,
            });
        }

        let new_size = Self::grow_size(len_u64, self.size);
        if new_size <= len_u64 {
            warn!(
                "reservation of {} bytes exceeds the {} byte ring cap; dropping",
                len, RING_SIZE_CAP
            );
            return ReserveOutcome::Dropped;
        }

        let new_ring = Box::new(RingBuffer {
            write_idx: AtomicU64::new(0),
            read_idx: AtomicU64::new(0),
            size: new_size,
            data: UnsafeCell::new(vec![0u8; new_size as usize].into_boxed_slice()),
            previous: AtomicPtr::new(self as *const RingBuffer as *mut RingBuffer),
        });
        ReserveOutcome::Grown {
            new_ring,
            reservation: Reservation {
                write_idx: 0,
                len,
                is_new: true,
            },
        }
    }

    /// Writes `bytes` into the window named by `reservation`, splitting
    /// across the wrap point if needed. Must be called against the ring
    /// the reservation was taken from (`self` if `Fits`, `new_ring` if
    /// `Grown`).
    pub fn write(&self, reservation: &Reservation, bytes: &[u8]) {
        debug_assert_eq!(bytes.len(), reservation.len);
        // SAFETY: sole writer; no concurrent reader can observe these bytes
        // until `commit` publishes `write_idx`.
        let data = unsafe { &mut *self.data.get() };
        let start = reservation.write_idx;
        let end_pos = (start + reservation.len as u64) % self.size;
        if end_pos < start {
            let first_len = (self.size - start) as usize;
            data[start as usize..].copy_from_slice(&bytes[..first_len]);
            data[..end_pos as usize].copy_from_slice(&bytes[first_len..]);
        } else {
            data[start as usize..start as usize + reservation.len].copy_from_slice(bytes);
        }
    }

    /// Publishes the reservation's bytes to the consumer. Must happen after
    /// [`write`](Self::write) completes; the `Release` store is the
    /// ordering boundary the consumer's `Acquire` load on `write_idx` pairs
    /// with.
    pub fn commit(&self, reservation: Reservation) {
        let end_pos = (reservation.write_idx + reservation.len as u64) % self.size;
        self.write_idx.store(end_pos, Ordering::Release);
    }
}

impl Drop for RingBuffer {
    fn drop(&mut self) {
        let prev = self.previous.swap(ptr::null_mut(), Ordering::Relaxed);
        if !prev.is_null() {
            // SAFETY: `previous` is either null or a pointer this ring
            // uniquely owns, established when it was linked in `reserve`.
            drop(unsafe { Box::from_raw(prev) });
        }
    }
}

/// Anything the drainer can ship bytes to: a live socket in production, a
/// `Vec<u8>` in tests.
pub trait DrainSink {
    fn send_all(&mut self, bytes: &[u8]) -> io::Result<()>;
}

impl<T: io::Write> DrainSink for T {
    fn send_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_all(bytes)
    }
}

/// Drains `buf`'s full chain — oldest `previous` ring first, freeing each
/// as it is fully read — then `buf`'s own unread bytes. Returns the total
/// number of bytes shipped to `sink`.
///
/// `buf` itself is never freed here: the caller (who still holds the live
/// pointer to it as its current ring) owns that decision.
pub fn drain(buf: &RingBuffer, sink: &mut impl DrainSink) -> io::Result<usize> {
    let mut total = 0;
    let prev_ptr = buf.previous.swap(ptr::null_mut(), Ordering::AcqRel);
    if !prev_ptr.is_null() {
        // SAFETY: `previous` was either null or a uniquely-owned ring;
        // we just claimed ownership via the swap above.
        let prev = unsafe { Box::from_raw(prev_ptr) };
        total += drain(&prev, sink)?;
        // `prev` drops here: its own (already-drained, now-null) `previous`
        // makes this a no-op free of just this one ring.
    }
    total += drain_self(buf, sink)?;
    Ok(total)
}

fn drain_self(buf: &RingBuffer, sink: &mut impl DrainSink) -> io::Result<usize> {
    let write_idx = buf.write_idx.load(Ordering::Acquire);
    let read_idx = buf.read_idx.load(Ordering::Relaxed);
    if write_idx == read_idx {
        return Ok(0);
    }

    // SAFETY: sole reader; bytes up to `write_idx` were published by the
    // producer's `Release` store above, observed via the `Acquire` load.
    let data = unsafe { &*buf.data.get() };

    if write_idx > read_idx {
        let bytes_to_send = (write_idx - read_idx) as usize;
        sink.send_all(&data[read_idx as usize..read_idx as usize + bytes_to_send])?;
        buf.read_idx.store(write_idx, Ordering::Release);
        Ok(bytes_to_send)
    } else {
        let mut total = 0;
        let bytes_to_send_first = (buf.size - read_idx) as usize;
        if bytes_to_send_first > 0 {
            sink.send_all(&data[read_idx as usize..])?;
            // Advance by exactly `bytes_to_send_first`, i.e. wrap to 0 —
            // not by whatever `send_all` reports, since the wrap point has
            // already been reached.
            buf.read_idx.store(0, Ordering::Release);
            total += bytes_to_send_first;
        }
        let bytes_to_send_second = write_idx as usize;
        if bytes_to_send_second > 0 {
            sink.send_all(&data[..bytes_to_send_second])?;
            buf.read_idx.store(write_idx, Ordering::Release);
            total += bytes_to_send_second;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reserve_write_commit(ring: &RingBuffer, bytes: &[u8]) -> Option<Box<RingBuffer>> {
        match ring.reserve(bytes.len()) {
            ReserveOutcome::Fits(r) => {
                ring.write(&r, bytes);
                ring.commit(r);
                None
            }
            ReserveOutcome::Grown { new_ring, reservation } => {
                new_ring.write(&reservation, bytes);
                new_ring.commit(reservation);
                Some(new_ring)
            }
            ReserveOutcome::Dropped => panic!("unexpected drop in test"),
        }
    }

    #[test]
    fn write_then_drain_round_trips_exactly() {
        let ring = RingBuffer::new(64);
        let payload = b"hello world, this is a span record";
        assert!(reserve_write_commit(&ring, payload).is_none());

        let mut sink = Vec::new();
        let n = drain(&ring, &mut sink).unwrap();
        assert_eq!(n, payload.len());
        assert_eq!(sink, payload);
    }

    #[test]
    fn full_size_reservation_forces_growth() {
        let ring = RingBuffer::new(16);
        let payload = vec![0xABu8; 16];
        let grown = reserve_write_commit(&ring, &payload);
        assert!(grown.is_some(), "reserve(size) must report is_new=true");
    }

    #[test]
    fn almost_full_reservation_may_fit() {
        let ring = RingBuffer::new(16);
        let payload = vec![0xCDu8; 15];
        let grown = reserve_write_commit(&ring, &payload);
        assert!(grown.is_none());
    }

    #[test]
    fn chain_drains_oldest_first() {
        let ring = RingBuffer::new(16);
        reserve_write_commit(&ring, b"first-8-");
        // This payload doesn't fit in the remaining space, so it grows.
        let grown = reserve_write_commit(&ring, b"this-does-not-fit-in-8-bytes").unwrap();

        let mut sink = Vec::new();
        let n = drain(&grown, &mut sink).unwrap();
        assert_eq!(n, "first-8-".len() + "this-does-not-fit-in-8-bytes".len());
        assert_eq!(&sink[..8], b"first-8-");
        assert_eq!(&sink[8..], b"this-does-not-fit-in-8-bytes");
    }

    #[test]
    fn wraparound_write_and_drain() {
        let ring = RingBuffer::new(16);
        reserve_write_commit(&ring, &[1u8; 10]);
        let mut sink = Vec::new();
        drain(&ring, &mut sink).unwrap();
        // read_idx is now 10; writing 10 more bytes wraps.
        reserve_write_commit(&ring, &[2u8; 10]);
        let mut sink2 = Vec::new();
        let n = drain(&ring, &mut sink2).unwrap();
        assert_eq!(n, 10);
        assert_eq!(sink2, vec![2u8; 10]);
    }

    #[test]
    fn oversized_reservation_past_cap_is_dropped() {
        let ring = RingBuffer::new(16);
        match ring.reserve((RING_SIZE_CAP + 1) as usize) {
            ReserveOutcome::Dropped => {}
            _ => panic!("expected drop past the ring size cap"),
        }
    }
}
