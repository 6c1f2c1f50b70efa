use std::io::Write;

use memmap2::Mmap;

use super::{SEGMENT_MAGIC, SEGMENT_VERSION};

pub(crate) const FOOTER_SIZE: usize = 48;

/// Fixed-size little-endian trailer of a segment file.
///
/// Carries the record framing count plus the aggregate stats later merges
/// reuse (`{pkey_count, skey_count, max_value_len, max_skey_count}`). The
/// magic sits in the final four bytes so a reader can validate a candidate
/// file from its tail alone.
#[derive(Clone, Copy, Debug)]
pub struct SegmentFooter {
    pub record_count: u64,
    pub pkey_count: u64,
    pub skey_count: u64,
    pub max_value_len: u64,
    pub max_skey_count: u32,
    pub version: u32,
    pub magic: u32,
}

impl SegmentFooter {
    /// Parses the footer from the tail of a mapped segment file.
    ///
    /// # Returns
    /// - `None` if the file is too short or the magic does not match.
    pub fn read_from(mmap: &Mmap) -> Option<Self> {
        if mmap.len() < FOOTER_SIZE {
            return None;
        }
        let base = mmap.len() - FOOTER_SIZE;
        let buf: [u8; FOOTER_SIZE] = mmap[base..].try_into().ok()?;

        let magic = u32::from_le_bytes(buf[44..48].try_into().ok()?);
        if magic != SEGMENT_MAGIC {
            return None;
        }

        Some(Self {
            record_count: u64::from_le_bytes(buf[0..8].try_into().ok()?),
            pkey_count: u64::from_le_bytes(buf[8..16].try_into().ok()?),
            skey_count: u64::from_le_bytes(buf[16..24].try_into().ok()?),
            max_value_len: u64::from_le_bytes(buf[24..32].try_into().ok()?),
            max_skey_count: u32::from_le_bytes(buf[32..36].try_into().ok()?),
            version: u32::from_le_bytes(buf[36..40].try_into().ok()?),
            magic,
        })
    }

    /// Appends the footer to `w`. Layout mirrors `read_from`, reserved
    /// word included.
    pub fn write<W: Write>(
        w: &mut W,
        record_count: u64,
        pkey_count: u64,
        skey_count: u64,
        max_value_len: u64,
        max_skey_count: u32,
    ) -> std::io::Result<()> {
        w.write_all(&record_count.to_le_bytes())?;
        w.write_all(&pkey_count.to_le_bytes())?;
        w.write_all(&skey_count.to_le_bytes())?;
        w.write_all(&max_value_len.to_le_bytes())?;
        w.write_all(&max_skey_count.to_le_bytes())?;
        w.write_all(&SEGMENT_VERSION.to_le_bytes())?;
        w.write_all(&0u32.to_le_bytes())?; // reserved
        w.write_all(&SEGMENT_MAGIC.to_le_bytes())?;
        Ok(())
    }
}
