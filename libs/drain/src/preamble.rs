// This file is part of the extern-traces agent.
//
// Licensed under the GNU General Public License, version 3 or later.
// See the LICENSE file distributed with this crate for details.

//! The one-time preamble sent right after connect: a clock anchor, then
//! the module, library, and symbol tables, per spec.md §4.9.

use byteorder::{WriteBytesExt, LE};
use dynamic::{Library, Module};
use reloc::Label;
use std::io::{self, Write};
use std::time::{SystemTime, UNIX_EPOCH};

/// Reads the clock anchor: an RDTSCP sample paired with the host wall
/// clock reading taken immediately after it, so the collector can later
/// reconstruct wall-clock time from any later RDTSCP sample.
#[cfg(target_arch = "x86_64")]
pub fn capture_anchor() -> (i64, i64, u64) {
    let mut aux: u32 = 0;
    let timestamp = unsafe { core::arch::x86_64::__rdtscp(&mut aux) };
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    (now.as_secs() as i64, now.subsec_nanos() as i64, timestamp)
}

#[cfg(not(target_arch = "x86_64"))]
pub fn capture_anchor() -> (i64, i64, u64) {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    (now.as_secs() as i64, now.subsec_nanos() as i64, 0)
}

/// Estimates the RDTSCP counter's frequency by timing a short busy window.
/// Run once at start-up; the error this introduces is bounded by the
/// window length and is good enough for wall-clock reconstruction in a
/// trace viewer, not for cycle-accurate profiling.
#[cfg(target_arch = "x86_64")]
pub fn measure_tsc_frequency() -> u64 {
    use std::time::{Duration, Instant};
    let mut aux: u32 = 0;
    let window = Duration::from_millis(20);
    let start_tsc = unsafe { core::arch::x86_64::__rdtscp(&mut aux) };
    let start_wall = Instant::now();
    while start_wall.elapsed() < window {
        std::hint::spin_loop();
    }
    let end_tsc = unsafe { core::arch::x86_64::__rdtscp(&mut aux) };
    let elapsed_secs = start_wall.elapsed().as_secs_f64();
    if elapsed_secs <= 0.0 {
        return 0;
    }
    ((end_tsc - start_tsc) as f64 / elapsed_secs) as u64
}

#[cfg(not(target_arch = "x86_64"))]
pub fn measure_tsc_frequency() -> u64 {
    0
}

fn write_counted_name(out: &mut impl Write, name: &[u8]) -> io::Result<()> {
    out.write_u32::<LE>(name.len() as u32)?;
    out.write_all(name)
}

/// Writes `InitialMessageHeader`, the module and library tables, then one
/// symbol entry per label in label-id order (the labels are already dense
/// and insertion-ordered, so iterating `labels` directly yields the right
/// order).
pub fn write_preamble(
    out: &mut impl Write,
    tsc_frequency: u64,
    anchor: (i64, i64, u64),
    modules: &[Module],
    libraries: &[Library],
    labels: &[Label],
) -> io::Result<()> {
    let (anchor_seconds, anchor_nanoseconds, anchor_timestamp) = anchor;
    out.write_u64::<LE>(tsc_frequency)?;
    out.write_i64::<LE>(anchor_seconds)?;
    out.write_i64::<LE>(anchor_nanoseconds)?;
    out.write_u64::<LE>(anchor_timestamp)?;

    out.write_u32::<LE>(modules.len() as u32)?;
    for m in modules {
        out.write_u16::<LE>(m.id)?;
        out.write_u8(m.major)?;
        out.write_u8(m.minor)?;
        write_counted_name(out, m.name.as_bytes())?;
    }

    out.write_u32::<LE>(libraries.len() as u32)?;
    for l in libraries {
        out.write_u16::<LE>(l.id)?;
        out.write_u16::<LE>(l.version)?;
        write_counted_name(out, l.name.as_bytes())?;
    }

    out.write_u32::<LE>(labels.len() as u32)?;
    for label in labels {
        write_counted_name(out, &label.hash)?;
        out.write_u8(label.library_id as u8)?;
        out.write_u8(label.module_id as u8)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(hash: &[u8; 11], library_id: u64, module_id: u64) -> Label {
        Label {
            label_id: 0,
            target_image_offset: 0,
            sym_index: 0,
            hash: *hash,
            library_id,
            module_id,
        }
    }

    #[test]
    fn preamble_layout_matches_header_then_tables() {
        let modules = vec![Module {
            id: 1,
            name: "libSceFoo".into(),
            major: 1,
            minor: 0,
        }];
        let libraries = vec![Library {
            id: 2,
            name: "libSceFoo_lib".into(),
            version: 3,
        }];
        let labels = vec![label(b"aaaaaaaaaaa", 2, 1)];

        let mut buf = Vec::new();
        write_preamble(&mut buf, 1_500_000_000, (10, 20, 99), &modules, &libraries, &labels).unwrap();

        let mut c = std::io::Cursor::new(buf);
        use byteorder::ReadBytesExt;
        assert_eq!(c.read_u64::<LE>().unwrap(), 1_500_000_000);
        assert_eq!(c.read_i64::<LE>().unwrap(), 10);
        assert_eq!(c.read_i64::<LE>().unwrap(), 20);
        assert_eq!(c.read_u64::<LE>().unwrap(), 99);
        assert_eq!(c.read_u32::<LE>().unwrap(), 1);
    }
}
