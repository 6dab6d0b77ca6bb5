//! LSB-first bit writer whose output is a [`ContentPlan`].
//!
//! Deflate packs bits starting at the least significant bit of each byte.
//! Most of a layer is written bit by bit, but the body of a back-reference
//! run is a byte-aligned repetition of one byte value, and that part is
//! recorded as a fill segment instead of being written out.

use num_bigint::BigUint;

use crate::error::{BombError, Result};
use crate::plan::ContentPlan;

#[derive(Debug, Default)]
pub struct BitWriter {
    plan: ContentPlan,
    pending: Vec<u8>,
    bitbuf: u64,
    bitcount: u8,
    total_bits: u64,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the low `bits` bits of `value`, least significant first.
    pub fn write_bits(&mut self, value: u32, bits: u8) {
        debug_assert!(bits <= 32);
        let mask = if bits == 32 { u32::MAX } else { (1u32 << bits) - 1 };
        self.bitbuf |= ((value & mask) as u64) << self.bitcount;
        self.bitcount += bits;
        self.total_bits += bits as u64;
        while self.bitcount >= 8 {
            self.pending.push((self.bitbuf & 0xff) as u8);
            self.bitbuf >>= 8;
            self.bitcount -= 8;
        }
    }

    /// Bits already written into the current, incomplete byte.
    pub fn bit_offset(&self) -> u8 {
        self.bitcount
    }

    /// Bits written through `write_bits`/`write_bytes`; runs are not counted.
    pub fn bit_len(&self) -> u64 {
        self.total_bits
    }

    pub fn is_aligned(&self) -> bool {
        self.bitcount == 0
    }

    /// Pad with zero bits up to the next byte boundary.
    pub fn align(&mut self) {
        if self.bitcount > 0 {
            self.write_bits(0, 8 - self.bitcount);
        }
    }

    /// Copy whole bytes; the writer must be byte aligned.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure_aligned("write_bytes")?;
        self.pending.extend_from_slice(bytes);
        self.total_bits += 8 * bytes.len() as u64;
        Ok(())
    }

    /// Record `count` copies of `value` without writing them.
    pub fn write_run(&mut self, value: u8, count: BigUint) -> Result<()> {
        self.ensure_aligned("write_run")?;
        self.flush_pending();
        self.plan.push_fill(value, count);
        Ok(())
    }

    /// Flush the partial byte (zero padded) and return the written content.
    pub fn finish(mut self) -> ContentPlan {
        self.align();
        self.flush_pending();
        self.plan
    }

    fn flush_pending(&mut self) {
        if !self.pending.is_empty() {
            let bytes = std::mem::take(&mut self.pending);
            self.plan.push_literal(&bytes);
        }
    }

    fn ensure_aligned(&self, op: &str) -> Result<()> {
        if self.is_aligned() {
            Ok(())
        } else {
            Err(BombError::Internal(format!(
                "{op} at bit offset {}",
                self.bitcount
            )))
        }
    }
}
