//! Supported content codings and the ordered list of layers to apply.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BombError, Result};

/// Back-reference and block limits of an LZ77 + Huffman stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeflateLimits {
    /// Shortest back-reference the format can express.
    pub min_match: u16,
    /// Longest back-reference the format can express.
    pub max_match: u16,
    /// Furthest distance a back-reference may reach.
    pub window: u32,
    /// Largest payload of one stored (uncompressed) block.
    pub max_stored_block: usize,
    /// Fill runs shorter than this are emitted as stored bytes, since the
    /// dynamic block header costs more than the run itself.
    pub min_profitable_run: usize,
}

/// RFC 1951 limits, shared by every container in the deflate family.
pub const DEFLATE_LIMITS: DeflateLimits = DeflateLimits {
    min_match: 3,
    max_match: 258,
    window: 32_768,
    max_stored_block: 65_535,
    min_profitable_run: 32,
};

/// One layer's codec, named by its HTTP content-coding token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Codec {
    /// `gzip` / `x-gzip`: RFC 1952 member, CRC-32 and ISIZE trailer.
    Gzip,
    /// `deflate`: RFC 1950 zlib stream, Adler-32 trailer.
    Deflate,
    /// `deflate-raw`: bare RFC 1951 stream.
    DeflateRaw,
}

impl Codec {
    pub const ALL: [Codec; 3] = [Codec::Gzip, Codec::Deflate, Codec::DeflateRaw];

    pub fn token(self) -> &'static str {
        match self {
            Codec::Gzip => "gzip",
            Codec::Deflate => "deflate",
            Codec::DeflateRaw => "deflate-raw",
        }
    }

    pub fn limits(self) -> DeflateLimits {
        DEFLATE_LIMITS
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Codec {
    type Err = BombError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gzip" | "x-gzip" => Ok(Codec::Gzip),
            "deflate" => Ok(Codec::Deflate),
            "deflate-raw" => Ok(Codec::DeflateRaw),
            other => Err(BombError::UnsupportedCodec(other.to_string())),
        }
    }
}

/// Codecs in application order: index 0 is applied first (innermost).
///
/// Parsed from a `Content-Encoding` style list, where the first token is the
/// first coding applied and the last one is what a client peels off first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingSpec {
    layers: Vec<Codec>,
}

impl EncodingSpec {
    pub fn new(layers: Vec<Codec>) -> Self {
        Self { layers }
    }

    /// `codec` applied `n` times.
    pub fn repeated(codec: Codec, n: usize) -> Self {
        Self { layers: vec![codec; n] }
    }

    pub fn layers(&self) -> &[Codec] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl FromStr for EncodingSpec {
    type Err = BombError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        let layers = s
            .split(',')
            .map(str::parse::<Codec>)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { layers })
    }
}

impl fmt::Display for EncodingSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<&str> = self.layers.iter().map(|c| c.token()).collect();
        f.write_str(&tokens.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_parse_case_insensitively() {
        assert_eq!(" GZip ".parse::<Codec>().unwrap(), Codec::Gzip);
        assert_eq!("x-gzip".parse::<Codec>().unwrap(), Codec::Gzip);
        assert_eq!("deflate".parse::<Codec>().unwrap(), Codec::Deflate);
        assert_eq!("deflate-raw".parse::<Codec>().unwrap(), Codec::DeflateRaw);
    }

    #[test]
    fn unknown_token_is_unsupported() {
        assert!(matches!(
            "gzip, br".parse::<EncodingSpec>(),
            Err(BombError::UnsupportedCodec(t)) if t == "br"
        ));
    }

    #[test]
    fn list_keeps_application_order() {
        let spec: EncodingSpec = "deflate, gzip".parse().unwrap();
        assert_eq!(spec.layers(), &[Codec::Deflate, Codec::Gzip]);
        assert_eq!(spec.to_string(), "deflate, gzip");
        assert!("".parse::<EncodingSpec>().unwrap().is_empty());
    }
}
