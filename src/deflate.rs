//! Single-layer deflate encoder for content plans.
//!
//! Literal content is written as stored blocks. A long fill run becomes one
//! dynamic-Huffman block built so that nearly all of it is a single repeated
//! byte:
//!
//! ```text
//! [header][lit v]{1,2}[ref]{0,3} | body: N bytes of 4 refs each | [ref]{0,3}[tail][eob]
//! ```
//!
//! `ref` is "copy 258 bytes from distance 1". Its literal/length code (symbol
//! 285) and distance code are one bit each, so four refs fill a byte and
//! every body byte decodes to 1032 bytes of output. The body is returned as
//! a fill segment of the output plan; the next layer sees it as just another
//! fill run and compresses it the same way.

use log::debug;
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};

use crate::bitio::BitWriter;
use crate::codec::DeflateLimits;
use crate::error::{BombError, Result};
use crate::plan::{ContentPlan, Segment};

const END_OF_BLOCK: usize = 256;
const FIRST_LENGTH_SYMBOL: usize = 257;
const MAX_MATCH_SYMBOL: usize = 285;
/// Literal/length codes transmitted (HLIT + 257).
const LITLEN_CODES: usize = 286;
/// Distance codes transmitted (HDIST + 1).
const DIST_CODES: usize = 2;
/// Code-length code lengths transmitted (HCLEN + 4), enough to reach symbol 1.
const CODELEN_CODES: usize = 18;
const MAX_CODE_BITS: u8 = 15;

/// Back-references only ever copy the previous byte.
const RUN_DISTANCE: u32 = 1;

const CODELEN_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/// Complete code over the code-length symbols the run header uses:
/// 0 and 18 get two bits; 1, 2, 3 and 17 get three.
const CODELEN_LENGTHS: [u8; 19] = [2, 3, 3, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 3, 2];

/// Literal/length code lengths of a run block; together a complete code.
const MAX_MATCH_LEN_BITS: u8 = 1;
const TAIL_LEN_BITS: u8 = 2;
const FILL_LITERAL_BITS: u8 = 3;
const EOB_BITS: u8 = 3;

const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115,
    131, 163, 195, 227, 258,
];
const LENGTH_EXTRA: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];

/// A Huffman code, bits already reversed for LSB-first output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Code {
    bits: u16,
    len: u8,
}

impl Code {
    fn write(self, w: &mut BitWriter) {
        w.write_bits(self.bits as u32, self.len);
    }
}

fn reverse_bits(value: u16, len: u8) -> u16 {
    let mut out = 0u16;
    for i in 0..len {
        out = (out << 1) | ((value >> i) & 1);
    }
    out
}

/// Canonical Huffman codes (RFC 1951 §3.2.2) for the given code lengths.
fn canonical_codes(lengths: &[u8]) -> Vec<Code> {
    let mut bl_count = [0u16; MAX_CODE_BITS as usize + 1];
    for &len in lengths {
        if len > 0 {
            bl_count[len as usize] += 1;
        }
    }
    let mut next_code = [0u16; MAX_CODE_BITS as usize + 1];
    let mut code = 0u16;
    for bits in 1..=MAX_CODE_BITS as usize {
        code = (code + bl_count[bits - 1]) << 1;
        next_code[bits] = code;
    }
    lengths
        .iter()
        .map(|&len| {
            if len == 0 {
                return Code::default();
            }
            let canonical = next_code[len as usize];
            next_code[len as usize] += 1;
            Code {
                bits: reverse_bits(canonical, len),
                len,
            }
        })
        .collect()
}

/// Length symbol, extra-bit value and extra-bit count for a match length.
fn length_symbol(len: u16) -> (usize, u16, u8) {
    if len == LENGTH_BASE[28] {
        return (MAX_MATCH_SYMBOL, 0, 0);
    }
    let idx = LENGTH_BASE[..28]
        .iter()
        .rposition(|&base| base <= len)
        .unwrap_or(0);
    (FIRST_LENGTH_SYMBOL + idx, len - LENGTH_BASE[idx], LENGTH_EXTRA[idx])
}

/// Code tables of one run block.
struct RunTables {
    fill: u8,
    tail_symbol: usize,
    litlen: Vec<Code>,
    dist: Vec<Code>,
}

impl RunTables {
    fn new(fill: u8, tail_symbol: usize) -> Self {
        let litlen = canonical_codes(&run_litlen_lengths(fill, tail_symbol));
        let dist = canonical_codes(&[1; DIST_CODES]);
        Self {
            fill,
            tail_symbol,
            litlen,
            dist,
        }
    }

    fn write_literal(&self, w: &mut BitWriter) {
        self.litlen[self.fill as usize].write(w);
    }

    /// One maximum-length back-reference.
    fn write_max_ref(&self, w: &mut BitWriter) {
        self.litlen[MAX_MATCH_SYMBOL].write(w);
        self.dist[0].write(w);
    }

    fn write_tail_ref(&self, w: &mut BitWriter, len: u16) -> Result<()> {
        let (symbol, extra, extra_bits) = length_symbol(len);
        if symbol != self.tail_symbol {
            return Err(BombError::Internal(format!(
                "tail length {len} needs symbol {symbol}, table has {}",
                self.tail_symbol
            )));
        }
        self.litlen[symbol].write(w);
        w.write_bits(extra as u32, extra_bits);
        self.dist[0].write(w);
        Ok(())
    }

    fn write_end(&self, w: &mut BitWriter) {
        self.litlen[END_OF_BLOCK].write(w);
    }

    /// The byte formed by four back-to-back maximum references.
    fn body_byte(&self) -> Result<u8> {
        let code = self.litlen[MAX_MATCH_SYMBOL];
        let dist = self.dist[0];
        let width = code.len + dist.len;
        if width == 0 || 8 % width != 0 {
            return Err(BombError::Internal(format!(
                "back-reference of {width} bits does not tile a byte"
            )));
        }
        let unit = code.bits as u32 | ((dist.bits as u32) << code.len);
        let byte = (0..8 / width).fold(0u32, |acc, i| acc | (unit << (i * width)));
        Ok(byte as u8)
    }
}

fn run_litlen_lengths(fill: u8, tail_symbol: usize) -> [u8; LITLEN_CODES] {
    let mut lengths = [0u8; LITLEN_CODES];
    lengths[fill as usize] = FILL_LITERAL_BITS;
    lengths[END_OF_BLOCK] = EOB_BITS;
    lengths[tail_symbol] = TAIL_LEN_BITS;
    lengths[MAX_MATCH_SYMBOL] = MAX_MATCH_LEN_BITS;
    lengths
}

/// Code-length symbols `(symbol, extra)` describing a run block's tables.
///
/// Literal and end-of-block lengths use zero-run codes. Length symbols are
/// sent one entry at a time, which costs the same whichever of them is the
/// tail symbol, so the header size depends only on the fill byte.
fn code_length_stream(fill: u8, tail_symbol: usize) -> Vec<(u8, u8)> {
    let lengths = run_litlen_lengths(fill, tail_symbol);
    let mut out = Vec::new();

    let literals = &lengths[..=END_OF_BLOCK];
    let mut i = 0;
    while i < literals.len() {
        if literals[i] != 0 {
            out.push((literals[i], 0));
            i += 1;
            continue;
        }
        let run = literals[i..].iter().take_while(|&&len| len == 0).count();
        i += run;
        let mut left = run;
        while left >= 11 {
            let n = left.min(138);
            out.push((18, (n - 11) as u8));
            left -= n;
        }
        if left >= 3 {
            out.push((17, (left - 3) as u8));
        } else {
            out.extend(std::iter::repeat((0, 0)).take(left));
        }
    }

    out.extend(lengths[FIRST_LENGTH_SYMBOL..].iter().map(|&len| (len, 0)));
    out.extend(std::iter::repeat((1, 0)).take(DIST_CODES));
    out
}

fn codelen_extra_bits(symbol: u8) -> u8 {
    match symbol {
        16 => 2,
        17 => 3,
        18 => 7,
        _ => 0,
    }
}

/// Bit length of a run block header, block type bits included.
fn run_header_bits(fill: u8) -> usize {
    let fixed = 3 + 5 + 5 + 4 + 3 * CODELEN_CODES;
    let stream: usize = code_length_stream(fill, FIRST_LENGTH_SYMBOL)
        .iter()
        .map(|&(sym, _)| (CODELEN_LENGTHS[sym as usize] + codelen_extra_bits(sym)) as usize)
        .sum();
    fixed + stream
}

fn write_run_header(w: &mut BitWriter, last: bool, tables: &RunTables) {
    let cl_codes = canonical_codes(&CODELEN_LENGTHS);
    w.write_bits(last as u32, 1);
    w.write_bits(0b10, 2);
    w.write_bits((LITLEN_CODES - 257) as u32, 5);
    w.write_bits((DIST_CODES - 1) as u32, 5);
    w.write_bits((CODELEN_CODES - 4) as u32, 4);
    for &sym in CODELEN_ORDER.iter().take(CODELEN_CODES) {
        w.write_bits(CODELEN_LENGTHS[sym] as u32, 3);
    }
    for (sym, extra) in code_length_stream(tables.fill, tables.tail_symbol) {
        cl_codes[sym as usize].write(w);
        w.write_bits(extra as u32, codelen_extra_bits(sym));
    }
}

fn write_stored(w: &mut BitWriter, bytes: &[u8], last: bool) -> Result<()> {
    w.write_bits(last as u32, 1);
    w.write_bits(0b00, 2);
    w.align();
    let len = u16::try_from(bytes.len())
        .map_err(|_| BombError::Internal(format!("stored block of {} bytes", bytes.len())))?;
    w.write_bits(len as u32, 16);
    w.write_bits(!len as u32, 16);
    w.write_bytes(bytes)
}

/// Emit `count` copies of `fill` as one dynamic block.
fn write_run(
    w: &mut BitWriter,
    fill: u8,
    count: &BigUint,
    last: bool,
    limits: &DeflateLimits,
) -> Result<()> {
    debug_assert!(RUN_DISTANCE <= limits.window);
    let max_match = BigUint::from(limits.max_match);

    // Back-references are two bits wide, so the bit position must be even
    // before they can reach a byte boundary. A second literal fixes parity.
    let mut pos = w.bit_offset() as usize + run_header_bits(fill) + FILL_LITERAL_BITS as usize;
    let mut literals = 1u32;
    if pos % 2 == 1 {
        literals += 1;
        pos += FILL_LITERAL_BITS as usize;
    }
    let remaining = count - BigUint::from(literals);
    let full = &remaining / &max_match;
    let rem = (&remaining % &max_match)
        .to_u16()
        .ok_or_else(|| BombError::Internal("match remainder overflow".into()))?;

    let lead = ((8 - pos % 8) % 8) / 2;
    let (lead, body, trailing) = if full >= BigUint::from(lead + 4) {
        let after = &full - BigUint::from(lead);
        let trailing = (&after % 4u32).to_usize().unwrap_or(0);
        (lead, after >> 2usize, trailing)
    } else {
        let trailing = full
            .to_usize()
            .ok_or_else(|| BombError::Internal("short run overflow".into()))?;
        (0, BigUint::zero(), trailing)
    };

    let tail_symbol = if rem >= limits.min_match {
        length_symbol(rem).0
    } else {
        FIRST_LENGTH_SYMBOL
    };
    let tables = RunTables::new(fill, tail_symbol);

    debug!(
        "run block: fill={fill:#04x} count={count} body={body} \
         lead={lead} trailing={trailing} rem={rem}"
    );

    write_run_header(w, last, &tables);
    for _ in 0..literals {
        tables.write_literal(w);
    }
    for _ in 0..lead {
        tables.write_max_ref(w);
    }
    if !body.is_zero() {
        w.write_run(tables.body_byte()?, body)?;
    }
    for _ in 0..trailing {
        tables.write_max_ref(w);
    }
    match rem {
        0 => {}
        r if r < limits.min_match => {
            for _ in 0..r {
                tables.write_literal(w);
            }
        }
        r => tables.write_tail_ref(w, r)?,
    }
    tables.write_end(w);
    Ok(())
}

/// A unit of output: coalesced literal bytes, or one long fill run.
enum Block<'a> {
    Stored(Vec<u8>),
    Run { fill: u8, count: &'a BigUint },
}

fn split_blocks<'a>(
    plan: &'a ContentPlan,
    limits: &DeflateLimits,
    max_literal_len: usize,
) -> Result<Vec<Block<'a>>> {
    let min_run = BigUint::from(limits.min_profitable_run);
    let mut blocks = Vec::new();
    let mut stored = Vec::new();
    for segment in plan.segments() {
        match segment {
            Segment::Literal(bytes) => {
                if bytes.len() > max_literal_len {
                    return Err(BombError::SegmentTooLarge {
                        len: bytes.len(),
                        limit: max_literal_len,
                    });
                }
                stored.extend_from_slice(bytes);
            }
            Segment::Fill { value, count } if *count < min_run => {
                let n = count.to_usize().unwrap_or(0);
                stored.resize(stored.len() + n, *value);
            }
            Segment::Fill { value, count } => {
                if !stored.is_empty() {
                    blocks.push(Block::Stored(std::mem::take(&mut stored)));
                }
                blocks.push(Block::Run { fill: *value, count });
            }
        }
    }
    if !stored.is_empty() || blocks.is_empty() {
        blocks.push(Block::Stored(stored));
    }
    Ok(blocks)
}

/// Encode `plan` as a raw deflate stream, itself described as a plan.
///
/// The result decodes to exactly the bytes `plan` describes. Literal
/// segments longer than `max_literal_len` are rejected; fill runs have no
/// size limit.
pub fn encode_plan(
    plan: &ContentPlan,
    limits: &DeflateLimits,
    max_literal_len: usize,
) -> Result<ContentPlan> {
    let blocks = split_blocks(plan, limits, max_literal_len)?;
    let mut w = BitWriter::new();
    let last_index = blocks.len() - 1;
    for (i, block) in blocks.iter().enumerate() {
        let last = i == last_index;
        match block {
            Block::Stored(bytes) => {
                debug!("stored: {} bytes", bytes.len());
                let mut chunks = bytes.chunks(limits.max_stored_block).peekable();
                if chunks.peek().is_none() {
                    write_stored(&mut w, &[], last)?;
                }
                while let Some(chunk) = chunks.next() {
                    write_stored(&mut w, chunk, last && chunks.peek().is_none())?;
                }
            }
            Block::Run { fill, count } => write_run(&mut w, *fill, count, last, limits)?,
        }
    }
    Ok(w.finish())
}

/// Encode a concrete buffer as a raw deflate stream.
pub fn encode_bytes(bytes: &[u8], limits: &DeflateLimits) -> Result<Vec<u8>> {
    let plan = ContentPlan::from_bytes(bytes.to_vec());
    encode_plan(&plan, limits, bytes.len())?.materialize(usize::MAX)
}
