//! Checksum and length metadata for content that is never materialised.
//!
//! Both container checksums used by the deflate family are linear, so the
//! checksum of `A ‖ B` follows from the checksums of `A` and `B` plus a
//! function of `len(B)`:
//!
//! * CRC-32: `crc(A‖B) = crc(A) · x^(8·len B) mod P  ⊕  crc(B)`. The state
//!   carries `x^(8·len) mod P` itself, so combining never needs the length.
//! * Adler-32: the running sums shift by `len(B) mod 65521`.
//!
//! Lengths are only ever needed modulo 2^32 (gzip ISIZE) and modulo 65521
//! (Adler), so a [`ChecksumState`] is a handful of `u32`s whatever the size
//! of the content it describes.

use num_bigint::BigUint;
use num_traits::Zero;

use crate::error::{BombError, Result};
use crate::plan::{ContentPlan, Segment};

/// Reflected CRC-32 polynomial (IEEE 802.3).
const CRC_POLY: u32 = 0xedb8_8320;
/// `x^0` in the reflected representation.
const X_POW_0: u32 = 0x8000_0000;
/// Largest prime below 2^16.
const ADLER_BASE: u32 = 65_521;

/// Algebraic summary of a byte range: checksums plus reduced lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChecksumState {
    crc: u32,
    /// `x^(8·len) mod P`, the operator that shifts a CRC past this range.
    crc_shift: u32,
    adler: u32,
    len_mod_adler: u32,
    len: u32,
}

impl ChecksumState {
    /// State of the empty byte range; the identity for [`combine`].
    pub const EMPTY: ChecksumState = ChecksumState {
        crc: 0,
        crc_shift: X_POW_0,
        adler: 1,
        len_mod_adler: 0,
        len: 0,
    };

    /// Finalised CRC-32 as written in a gzip trailer.
    pub fn crc32(&self) -> u32 {
        self.crc
    }

    /// Adler-32 as written in a zlib trailer.
    pub fn adler32(&self) -> u32 {
        self.adler
    }

    /// Content length truncated to 32 bits (gzip ISIZE).
    pub fn len_mod_2_32(&self) -> u32 {
        self.len
    }
}

impl Default for ChecksumState {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Multiply two polynomials modulo the CRC polynomial, reflected form.
fn multmodp(a: u32, mut b: u32) -> u32 {
    if a == 0 {
        return 0;
    }
    let mut m = 1u32 << 31;
    let mut p = 0u32;
    loop {
        if a & m != 0 {
            p ^= b;
            if a & (m - 1) == 0 {
                break;
            }
        }
        m >>= 1;
        b = if b & 1 != 0 { (b >> 1) ^ CRC_POLY } else { b >> 1 };
    }
    p
}

/// `x^(8·n) mod P` by square-and-multiply over the bits of `n`.
fn x8nmodp(mut n: u64) -> u32 {
    let mut p = X_POW_0;
    // x^(2^3) = x^8, one byte.
    let mut square = multmodp(X_POW_0 >> 1, X_POW_0 >> 1);
    square = multmodp(square, square);
    square = multmodp(square, square);
    while n != 0 {
        if n & 1 != 0 {
            p = multmodp(square, p);
        }
        square = multmodp(square, square);
        n >>= 1;
    }
    p
}

fn adler_combine(adler1: u32, adler2: u32, len2_mod: u32) -> u32 {
    let base = ADLER_BASE as u64;
    let rem = len2_mod as u64;
    let mut sum1 = (adler1 & 0xffff) as u64;
    let mut sum2 = (rem * sum1) % base;
    sum1 += (adler2 & 0xffff) as u64 + base - 1;
    sum2 += ((adler1 >> 16) & 0xffff) as u64 + ((adler2 >> 16) & 0xffff) as u64 + base - rem;
    if sum1 >= base {
        sum1 -= base;
    }
    if sum1 >= base {
        sum1 -= base;
    }
    if sum2 >= base << 1 {
        sum2 -= base << 1;
    }
    if sum2 >= base {
        sum2 -= base;
    }
    (sum1 | (sum2 << 16)) as u32
}

fn adler_direct(bytes: &[u8]) -> u32 {
    // 5552 is the largest run whose sums cannot overflow a u32 before reduction.
    let mut a = 1u32;
    let mut b = 0u32;
    for chunk in bytes.chunks(5552) {
        for &byte in chunk {
            a += byte as u32;
            b += a;
        }
        a %= ADLER_BASE;
        b %= ADLER_BASE;
    }
    (b << 16) | a
}

/// Direct scan of a concrete buffer.
pub fn state_of(bytes: &[u8]) -> ChecksumState {
    let len = bytes.len() as u64;
    ChecksumState {
        crc: crc32fast::hash(bytes),
        crc_shift: x8nmodp(len),
        adler: adler_direct(bytes),
        len_mod_adler: (len % ADLER_BASE as u64) as u32,
        len: len as u32,
    }
}

/// State of `a`'s content followed by `b`'s content.
pub fn combine(a: &ChecksumState, b: &ChecksumState) -> ChecksumState {
    ChecksumState {
        crc: multmodp(b.crc_shift, a.crc) ^ b.crc,
        crc_shift: multmodp(a.crc_shift, b.crc_shift),
        adler: adler_combine(a.adler, b.adler, b.len_mod_adler),
        len_mod_adler: (a.len_mod_adler + b.len_mod_adler) % ADLER_BASE,
        len: a.len.wrapping_add(b.len),
    }
}

/// State of `value` repeated `count` times, in O(log count) combines.
///
/// Walks the bits of `count` from the top: each step doubles the covered run
/// by combining it with itself, and appends one more byte when the bit is set.
pub fn state_of_fill(value: u8, count: &BigUint) -> Result<ChecksumState> {
    if count.is_zero() {
        return Err(BombError::InvalidDirective(format!(
            "fill of {value:#04x} has a zero count"
        )));
    }
    let unit = state_of(&[value]);
    let mut acc = ChecksumState::EMPTY;
    for bit in (0..count.bits()).rev() {
        acc = combine(&acc, &acc);
        if count.bit(bit) {
            acc = combine(&acc, &unit);
        }
    }
    Ok(acc)
}

pub fn state_of_segment(segment: &Segment) -> Result<ChecksumState> {
    match segment {
        Segment::Literal(bytes) => Ok(state_of(bytes)),
        Segment::Fill { value, count } => state_of_fill(*value, count),
    }
}

/// Fold every segment of `plan`, left to right.
pub fn state_of_plan(plan: &ContentPlan) -> Result<ChecksumState> {
    plan.segments()
        .iter()
        .try_fold(ChecksumState::EMPTY, |acc, segment| {
            Ok(combine(&acc, &state_of_segment(segment)?))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_of_one_byte_is_x8() {
        assert_eq!(x8nmodp(1), 0x0080_0000);
        assert_eq!(x8nmodp(0), X_POW_0);
    }

    #[test]
    fn empty_is_identity() {
        let s = state_of(b"hello world");
        assert_eq!(combine(&ChecksumState::EMPTY, &s), s);
        assert_eq!(combine(&s, &ChecksumState::EMPTY), s);
        assert_eq!(state_of(b""), ChecksumState::EMPTY);
    }

    #[test]
    fn known_vectors() {
        let s = state_of(b"123456789");
        assert_eq!(s.crc32(), 0xcbf4_3926);
        assert_eq!(s.adler32(), 0x091e_01de);
    }

    #[test]
    fn split_buffer_combines_to_whole() {
        let data = b"The quick brown fox jumps over the lazy dog";
        for cut in 0..=data.len() {
            let (a, b) = data.split_at(cut);
            assert_eq!(combine(&state_of(a), &state_of(b)), state_of(data));
        }
    }

    #[test]
    fn adler_sums_reduce_at_chunk_edges() {
        let data = vec![0xffu8; 5552 * 3 + 7];
        let mut a = 1u64;
        let mut b = 0u64;
        for &byte in &data {
            a = (a + byte as u64) % ADLER_BASE as u64;
            b = (b + a) % ADLER_BASE as u64;
        }
        assert_eq!(adler_direct(&data) as u64, (b << 16) | a);
    }
}
