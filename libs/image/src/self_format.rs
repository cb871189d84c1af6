// This file is part of the extern-traces agent.
//
// Licensed under the GNU General Public License, version 3 or later.
// See the LICENSE file distributed with this crate for details.

//! The SELF container: a 32-byte header, a table of segment descriptors,
//! and (at the offset immediately following the segment table) the
//! embedded ELF64 image.

use packed_struct::packed_struct;

pub const SELF_MAGIC: [u8; 8] = [0x4F, 0x15, 0x3D, 0x1D, 0x00, 0x01, 0x01, 0x12];
pub const SELF_HEADER_SIZE: usize = 32;
pub const SELF_SEGMENT_SIZE: usize = 32;

/// Flag bit marking a SELF segment as a block segment backing a program
/// header, as opposed to signature or metadata blocks.
pub const SELF_SEGMENT_BLOCK_FLAG: u64 = 0x800;

packed_struct!(RawSelfSegment {
    _0 => flags: u64,
    _1 => offset: u64,
    _2 => enc_compressed_size: u64,
    _3 => dec_decompressed_size: u64
});

impl RawSelfSegment {
    /// The program-header index this segment's block backs, packed into
    /// bits 20..32 of `flags`.
    pub fn program_header_id(&self) -> u32 {
        ((self.flags() >> 20) & 0xFFF) as u32
    }

    pub fn is_block_segment(&self) -> bool {
        self.flags() & SELF_SEGMENT_BLOCK_FLAG != 0
    }
}

/// The fixed 32-byte SELF header. Hand-parsed (rather than overlaid via
/// `packed_struct!`) because `magic` is an array and the trailing padding
/// fields carry no accessor value.
#[derive(Debug, Clone, Copy)]
pub struct SelfHeader {
    pub magic: [u8; 8],
    pub category: u8,
    pub program_type: u8,
    pub header_size: u16,
    pub signature_size: u16,
    pub file_size: u32,
    pub segments_count: u16,
}

impl SelfHeader {
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        use byteorder::{ByteOrder, LE};
        if buf.len() < SELF_HEADER_SIZE {
            return None;
        }
        let mut magic = [0u8; 8];
        magic.copy_from_slice(&buf[0..8]);
        Some(Self {
            magic,
            category: buf[8],
            program_type: buf[9],
            // buf[10..12] is padding
            header_size: LE::read_u16(&buf[12..]),
            signature_size: LE::read_u16(&buf[14..]),
            file_size: LE::read_u32(&buf[16..]),
            // buf[20..24] is padding2
            segments_count: LE::read_u16(&buf[24..]),
            // buf[26..32] is padding3
        })
    }

    pub fn magic_valid(&self) -> bool {
        self.magic == SELF_MAGIC
    }
}
