// This file is part of the extern-traces agent.
//
// Licensed under the GNU General Public License, version 3 or later.
// See the LICENSE file distributed with this crate for details.

//! The four little-endian wire record layouts of spec.md §4.8.

use byteorder::{WriteBytesExt, LE};
use std::io::Write;

pub const TAG_SPAN_START: u64 = 0;
pub const TAG_SPAN_END: u64 = 1;
pub const TAG_COUNTERS: u64 = 2;
pub const TAG_SPAN_START_EXTRA: u64 = 3;

pub fn span_start(thread_id: u64, time: u64, label_id: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(32);
    out.write_u64::<LE>(TAG_SPAN_START).unwrap();
    out.write_u64::<LE>(thread_id).unwrap();
    out.write_u64::<LE>(time).unwrap();
    out.write_u64::<LE>(label_id).unwrap();
    out
}

pub fn span_end(thread_id: u64, time: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(24);
    out.write_u64::<LE>(TAG_SPAN_END).unwrap();
    out.write_u64::<LE>(thread_id).unwrap();
    out.write_u64::<LE>(time).unwrap();
    out
}

pub fn counters(thread_id: u64, dropped_delta: u64, last_time: u64, time: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(40);
    out.write_u64::<LE>(TAG_COUNTERS).unwrap();
    out.write_u64::<LE>(thread_id).unwrap();
    out.write_u64::<LE>(dropped_delta).unwrap();
    out.write_u64::<LE>(last_time).unwrap();
    out.write_u64::<LE>(time).unwrap();
    out
}

pub fn span_start_extra(thread_id: u64, time: u64, label_id: u64, extra: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(40 + extra.len());
    out.write_u64::<LE>(TAG_SPAN_START_EXTRA).unwrap();
    out.write_u64::<LE>(thread_id).unwrap();
    out.write_u64::<LE>(time).unwrap();
    out.write_u64::<LE>(label_id).unwrap();
    out.write_u64::<LE>(extra.len() as u64).unwrap();
    out.write_all(extra).unwrap();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::ReadBytesExt;
    use std::io::Cursor;

    #[test]
    fn span_start_layout_matches_tag_thread_time_label() {
        let bytes = span_start(7, 1000, 42);
        let mut c = Cursor::new(bytes);
        assert_eq!(c.read_u64::<LE>().unwrap(), TAG_SPAN_START);
        assert_eq!(c.read_u64::<LE>().unwrap(), 7);
        assert_eq!(c.read_u64::<LE>().unwrap(), 1000);
        assert_eq!(c.read_u64::<LE>().unwrap(), 42);
    }

    #[test]
    fn span_start_extra_carries_length_prefixed_payload() {
        let extra = [1u8, 2, 3, 4, 5];
        let bytes = span_start_extra(1, 2, 3, &extra);
        let mut c = Cursor::new(bytes);
        assert_eq!(c.read_u64::<LE>().unwrap(), TAG_SPAN_START_EXTRA);
        c.read_u64::<LE>().unwrap();
        c.read_u64::<LE>().unwrap();
        c.read_u64::<LE>().unwrap();
        assert_eq!(c.read_u64::<LE>().unwrap(), extra.len() as u64);
        let mut tail = Vec::new();
        std::io::Read::read_to_end(&mut c, &mut tail).unwrap();
        assert_eq!(tail, extra);
    }
}
