//! Content plans describe the decoded content of a layer without holding it.
//!
//! A plan is an ordered list of [`Segment`]s. Literal segments carry their
//! bytes; fill segments carry a byte value and a repeat count that may be far
//! larger than anything addressable. Everything downstream (checksums,
//! encoding, framing) works on the segment descriptors, so the virtual
//! content is never built. Only [`ContentPlan::materialize`] produces bytes,
//! and it refuses when the plan is larger than the caller's limit.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::str::FromStr;

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};

use crate::error::{BombError, Result};

/// Default cap on the explicit length of a single literal segment.
pub const DEFAULT_MAX_LITERAL_LEN: usize = 1 << 30;

/// One run of decoded content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Explicit bytes, copied through as-is.
    Literal(Vec<u8>),
    /// `value` repeated `count` times. `count` is never zero.
    Fill { value: u8, count: BigUint },
}

impl Segment {
    /// Build a fill segment, rejecting a zero count.
    pub fn fill(value: u8, count: BigUint) -> Result<Self> {
        if count.is_zero() {
            return Err(BombError::InvalidDirective(format!(
                "fill of {value:#04x} has a zero count"
            )));
        }
        Ok(Segment::Fill { value, count })
    }

    /// Number of decoded bytes this segment stands for.
    pub fn len(&self) -> BigUint {
        match self {
            Segment::Literal(bytes) => BigUint::from(bytes.len()),
            Segment::Fill { count, .. } => count.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Segment::Literal(bytes) => bytes.is_empty(),
            Segment::Fill { count, .. } => count.is_zero(),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Literal(bytes) => write!(f, "literal({} bytes)", bytes.len()),
            Segment::Fill { value, count } => write!(f, "fill({value:#04x} x {count})"),
        }
    }
}

/// Ordered segments making up one piece of (virtual) content.
///
/// Adjacent literals are merged on insertion and empty segments are dropped,
/// so two plans describing the same bytes through the same builder calls are
/// structurally equal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentPlan {
    segments: Vec<Segment>,
}

impl ContentPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// A plan holding `bytes` as its only literal segment.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let mut plan = Self::new();
        plan.push_segment(Segment::Literal(bytes.into()));
        plan
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Total decoded length across all segments.
    pub fn virtual_len(&self) -> BigUint {
        self.segments.iter().map(Segment::len).sum()
    }

    /// Append a segment, merging it into the previous one when both are
    /// literals or both are fills of the same byte.
    pub fn push_segment(&mut self, segment: Segment) {
        if segment.is_empty() {
            return;
        }
        match (self.segments.last_mut(), segment) {
            (Some(Segment::Literal(prev)), Segment::Literal(bytes)) => {
                prev.extend_from_slice(&bytes);
            }
            (
                Some(Segment::Fill { value: prev_value, count: prev_count }),
                Segment::Fill { value, count },
            ) if *prev_value == value => {
                *prev_count += count;
            }
            (_, segment) => self.segments.push(segment),
        }
    }

    pub fn push_literal(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        if let Some(Segment::Literal(prev)) = self.segments.last_mut() {
            prev.extend_from_slice(bytes);
        } else {
            self.segments.push(Segment::Literal(bytes.to_vec()));
        }
    }

    /// Append a fill run; a zero count appends nothing.
    pub fn push_fill(&mut self, value: u8, count: BigUint) {
        self.push_segment(Segment::Fill { value, count });
    }

    /// Append every segment of `other`, in order.
    pub fn append(&mut self, other: ContentPlan) {
        for segment in other.segments {
            self.push_segment(segment);
        }
    }

    /// Produce the concrete bytes, failing if the plan is longer than `limit`.
    pub fn materialize(&self, limit: usize) -> Result<Vec<u8>> {
        let total = self.virtual_len();
        let len = match total.to_usize() {
            Some(len) if len <= limit => len,
            _ => {
                return Err(BombError::OutputTooLarge {
                    len: total.to_string(),
                    limit,
                })
            }
        };
        let mut out = Vec::with_capacity(len);
        for segment in &self.segments {
            match segment {
                Segment::Literal(bytes) => out.extend_from_slice(bytes),
                Segment::Fill { value, count } => {
                    let count = count
                        .to_usize()
                        .ok_or_else(|| BombError::Internal("fill count overflow".into()))?;
                    out.resize(out.len() + count, *value);
                }
            }
        }
        Ok(out)
    }
}

impl IntoIterator for ContentPlan {
    type Item = Segment;
    type IntoIter = std::vec::IntoIter<Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.into_iter()
    }
}

impl<'a> IntoIterator for &'a ContentPlan {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

// ---------------------------------------------------------------------------
// Directives

/// One instruction for building a plan, in the order the operator gave them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Literal bytes given inline.
    Literal(Vec<u8>),
    /// Literal bytes read from a file when the directive is applied.
    File(PathBuf),
    /// A fill run. `None` takes the bomb size configured on the builder.
    Fill { value: u8, count: Option<BigUint> },
    /// A pattern repeated up to the bomb size, truncated to the exact count.
    Tile(Vec<u8>),
}

impl FromStr for Directive {
    type Err = BombError;

    /// Parse `file:PATH`, `text:STRING`, `hex:HEX`, `fill:BYTE`,
    /// `fill:BYTE*COUNT` or `tile:TEXT`.
    fn from_str(s: &str) -> Result<Self> {
        let (kind, arg) = s.split_once(':').ok_or_else(|| {
            BombError::InvalidDirective(format!("'{s}' is missing a kind prefix"))
        })?;
        match kind {
            "file" => Ok(Directive::File(PathBuf::from(arg))),
            "text" => Ok(Directive::Literal(arg.as_bytes().to_vec())),
            "hex" => hex::decode(arg)
                .map(Directive::Literal)
                .map_err(|e| BombError::InvalidDirective(format!("bad hex literal '{arg}': {e}"))),
            "fill" => {
                // A trailing "*COUNT" is only split off when something precedes it,
                // so "fill:*" still means the byte '*'.
                let (byte, count) = match arg.rsplit_once('*') {
                    Some((byte, count)) if !byte.is_empty() => (byte, Some(parse_count(count)?)),
                    _ => (arg, None),
                };
                Ok(Directive::Fill {
                    value: parse_byte(byte)?,
                    count,
                })
            }
            "tile" => {
                if arg.is_empty() {
                    return Err(BombError::InvalidDirective("tile pattern is empty".into()));
                }
                Ok(Directive::Tile(arg.as_bytes().to_vec()))
            }
            other => Err(BombError::InvalidDirective(format!(
                "unknown directive kind '{other}'"
            ))),
        }
    }
}

/// Parse a fill byte: a single character, `0xNN`, or a decimal `0..=255`.
pub fn parse_byte(s: &str) -> Result<u8> {
    if s.len() == 1 {
        return Ok(s.as_bytes()[0]);
    }
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|_| BombError::InvalidDirective(format!("'{s}' is not a byte value")))
}

/// Parse a non-negative count: plain decimal, `AeB` or `A^B`.
pub fn parse_count(s: &str) -> Result<BigUint> {
    let s = s.trim();
    let bad = || BombError::InvalidDirective(format!("'{s}' is not a valid count"));
    if s.starts_with('-') {
        return Err(BombError::InvalidDirective(format!(
            "count '{s}' is negative"
        )));
    }
    let decimal = |digits: &str| -> Result<BigUint> {
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad());
        }
        BigUint::parse_bytes(digits.as_bytes(), 10).ok_or_else(bad)
    };
    let exponent = |digits: &str| -> Result<u32> { digits.parse::<u32>().map_err(|_| bad()) };

    if let Some((mantissa, exp)) = s.split_once(['e', 'E']) {
        let ten = BigUint::from(10u32);
        return Ok(decimal(mantissa)? * ten.pow(exponent(exp)?));
    }
    if let Some((base, exp)) = s.split_once('^') {
        return Ok(decimal(base)?.pow(exponent(exp)?));
    }
    decimal(s)
}

// ---------------------------------------------------------------------------
// Builder

/// Builds a [`ContentPlan`] from ordered directives.
///
/// The bomb size supplies the count for every fill or tile directive that
/// does not carry its own.
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    bomb_size: BigUint,
    max_literal_len: usize,
    plan: ContentPlan,
}

impl PlanBuilder {
    pub fn new(bomb_size: BigUint) -> Self {
        Self {
            bomb_size,
            max_literal_len: DEFAULT_MAX_LITERAL_LEN,
            plan: ContentPlan::new(),
        }
    }

    /// Cap the size of literals produced by tiling multi-byte patterns.
    pub fn with_literal_limit(mut self, max_literal_len: usize) -> Self {
        self.max_literal_len = max_literal_len;
        self
    }

    pub fn bomb_size(&self) -> &BigUint {
        &self.bomb_size
    }

    pub fn literal(&mut self, bytes: impl AsRef<[u8]>) -> &mut Self {
        self.plan.push_literal(bytes.as_ref());
        self
    }

    /// Read a literal from `source` to its end.
    pub fn literal_from<R: Read>(&mut self, mut source: R) -> Result<&mut Self> {
        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes).map_err(|e| {
            BombError::InvalidDirective(format!("literal source could not be read: {e}"))
        })?;
        self.plan.push_literal(&bytes);
        Ok(self)
    }

    /// Fill with the configured bomb size.
    pub fn fill(&mut self, value: u8) -> Result<&mut Self> {
        let count = self.bomb_size.clone();
        self.fill_count(value, count)
    }

    pub fn fill_count(&mut self, value: u8, count: BigUint) -> Result<&mut Self> {
        let segment = Segment::fill(value, count)?;
        self.plan.push_segment(segment);
        Ok(self)
    }

    /// Repeat `pattern` until exactly the bomb size is reached.
    pub fn tile(&mut self, pattern: &[u8]) -> Result<&mut Self> {
        match pattern {
            [] => Err(BombError::InvalidDirective("tile pattern is empty".into())),
            [value] => self.fill(*value),
            _ => {
                let count = self.bomb_size.clone();
                if count.is_zero() {
                    return Err(BombError::InvalidDirective(
                        "tile needs a non-zero bomb size".into(),
                    ));
                }
                let len = match count.to_usize() {
                    Some(len) if len <= self.max_literal_len => len,
                    _ => {
                        return Err(BombError::SegmentTooLarge {
                            len: count.to_usize().unwrap_or(usize::MAX),
                            limit: self.max_literal_len,
                        })
                    }
                };
                let bytes: Vec<u8> = pattern.iter().copied().cycle().take(len).collect();
                self.plan.push_literal(&bytes);
                Ok(self)
            }
        }
    }

    pub fn apply(&mut self, directive: Directive) -> Result<&mut Self> {
        match directive {
            Directive::Literal(bytes) => Ok(self.literal(bytes)),
            Directive::File(path) => {
                let file = File::open(&path).map_err(|e| {
                    BombError::InvalidDirective(format!(
                        "literal source '{}' could not be opened: {e}",
                        path.display()
                    ))
                })?;
                self.literal_from(file)
            }
            Directive::Fill { value, count: Some(count) } => self.fill_count(value, count),
            Directive::Fill { value, count: None } => self.fill(value),
            Directive::Tile(pattern) => self.tile(&pattern),
        }
    }

    pub fn build(self) -> ContentPlan {
        self.plan
    }
}

/// Build a plan from directives in order, using `bomb_size` for fills.
pub fn plan_from_directives<I>(bomb_size: BigUint, directives: I) -> Result<ContentPlan>
where
    I: IntoIterator<Item = Directive>,
{
    let mut builder = PlanBuilder::new(bomb_size);
    for directive in directives {
        builder.apply(directive)?;
    }
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacent_literals_merge() {
        let mut plan = ContentPlan::new();
        plan.push_literal(b"ab");
        plan.push_literal(b"");
        plan.push_literal(b"cd");
        assert_eq!(plan.segments(), &[Segment::Literal(b"abcd".to_vec())]);
    }

    #[test]
    fn fills_of_same_byte_merge() {
        let mut plan = ContentPlan::new();
        plan.push_fill(b'x', BigUint::from(3u32));
        plan.push_fill(b'x', BigUint::from(4u32));
        plan.push_fill(b'y', BigUint::from(1u32));
        assert_eq!(plan.segments().len(), 2);
        assert_eq!(plan.virtual_len(), BigUint::from(8u32));
    }

    #[test]
    fn materialize_respects_limit() {
        let mut plan = ContentPlan::from_bytes(b"hi".to_vec());
        plan.push_fill(0, BigUint::from(10u32));
        assert_eq!(plan.materialize(12).unwrap().len(), 12);
        assert!(matches!(
            plan.materialize(11),
            Err(BombError::OutputTooLarge { .. })
        ));
    }

    #[test]
    fn count_forms() {
        assert_eq!(parse_count("1000").unwrap(), BigUint::from(1000u32));
        assert_eq!(parse_count("3e4").unwrap(), BigUint::from(30_000u32));
        assert_eq!(parse_count("2^10").unwrap(), BigUint::from(1024u32));
        assert_eq!(parse_count("10^100").unwrap(), parse_count("1e100").unwrap());
        assert!(parse_count("-4").is_err());
        assert!(parse_count("lots").is_err());
    }

    #[test]
    fn byte_forms() {
        assert_eq!(parse_byte("a").unwrap(), b'a');
        assert_eq!(parse_byte("0x20").unwrap(), 0x20);
        assert_eq!(parse_byte("200").unwrap(), 200);
        assert!(parse_byte("300").is_err());
    }

    #[test]
    fn directive_parsing() {
        assert_eq!(
            "fill:a*12".parse::<Directive>().unwrap(),
            Directive::Fill { value: b'a', count: Some(BigUint::from(12u32)) }
        );
        assert_eq!(
            "fill:*".parse::<Directive>().unwrap(),
            Directive::Fill { value: b'*', count: None }
        );
        assert_eq!(
            "hex:00ff".parse::<Directive>().unwrap(),
            Directive::Literal(vec![0, 255])
        );
        assert!("bogus:1".parse::<Directive>().is_err());
        assert!("fill:a*-3".parse::<Directive>().is_err());
    }

    #[test]
    fn tile_truncates_to_exact_count() {
        let mut builder = PlanBuilder::new(BigUint::from(7u32));
        builder.tile(b"abc").unwrap();
        let plan = builder.build();
        assert_eq!(plan.materialize(64).unwrap(), b"abcabca");
    }
}
