//! Drives the requested layers, innermost first.
//!
//! Each layer's output stays a [`ContentPlan`] until the very end: the body of
//! every back-reference run is a fill segment, which the next layer again
//! encodes as a run. That is what makes the amplification multiply across
//! layers instead of adding up. Only the outermost layer is materialised.

use log::{debug, info};
use num_bigint::BigUint;
use num_traits::ToPrimitive;
use serde::{Serialize, Serializer};

use crate::checksum::state_of_plan;
use crate::codec::{Codec, EncodingSpec};
use crate::config::BombConfig;
use crate::deflate::encode_plan;
use crate::error::Result;
use crate::frame::frame;
use crate::plan::{ContentPlan, Segment};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Init,
    /// Layer `i` is the next one to encode.
    EncodingLayer(usize),
    Done,
}

fn as_decimal<S: Serializer>(n: &BigUint, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&n.to_string())
}

/// What one layer did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerReport {
    pub index: usize,
    pub codec: Codec,
    /// Length of the content this layer decodes to.
    #[serde(serialize_with = "as_decimal")]
    pub decoded_len: BigUint,
    /// Length of this layer's framed output.
    #[serde(serialize_with = "as_decimal")]
    pub encoded_len: BigUint,
    /// CRC-32 of the decoded content.
    pub crc32: u32,
    /// Adler-32 of the decoded content.
    pub adler32: u32,
}

/// A finished bomb: the outermost layer's bytes plus per-layer reports.
#[derive(Debug, Clone)]
pub struct Bomb {
    bytes: Vec<u8>,
    decoded_len: BigUint,
    layers: Vec<LayerReport>,
}

impl Bomb {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Length of the fully decoded content.
    pub fn decoded_len(&self) -> &BigUint {
        &self.decoded_len
    }

    pub fn layers(&self) -> &[LayerReport] {
        &self.layers
    }

    /// Fully decoded length over emitted length; infinite past `f64` range.
    pub fn ratio(&self) -> f64 {
        let decoded = self.decoded_len.to_f64().unwrap_or(f64::INFINITY);
        decoded / self.bytes.len().max(1) as f64
    }
}

/// Step-wise driver over `Init → EncodingLayer(i) → Done`.
pub struct ChainDriver<'a> {
    spec: &'a EncodingSpec,
    config: &'a BombConfig,
    state: ChainState,
    current: ContentPlan,
    decoded_len: BigUint,
    reports: Vec<LayerReport>,
}

impl<'a> ChainDriver<'a> {
    pub fn new(plan: ContentPlan, spec: &'a EncodingSpec, config: &'a BombConfig) -> Self {
        Self {
            spec,
            config,
            state: ChainState::Init,
            decoded_len: plan.virtual_len(),
            current: plan,
            reports: Vec::new(),
        }
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    pub fn reports(&self) -> &[LayerReport] {
        &self.reports
    }

    /// The content the next layer will encode, or the final layer once done.
    pub fn current(&self) -> &ContentPlan {
        &self.current
    }

    /// Perform one transition and return the new state.
    pub fn step(&mut self) -> Result<ChainState> {
        self.state = match self.state {
            ChainState::Init => {
                self.config.validate()?;
                info!(
                    "building {} layer(s) [{}] over {} decoded bytes",
                    self.spec.len(),
                    self.spec,
                    self.decoded_len
                );
                self.next_state(0)
            }
            ChainState::EncodingLayer(i) => {
                self.encode_layer(i)?;
                self.next_state(i + 1)
            }
            ChainState::Done => ChainState::Done,
        };
        Ok(self.state)
    }

    /// Drive to `Done` and materialise the outermost layer.
    pub fn run(mut self) -> Result<Bomb> {
        while self.step()? != ChainState::Done {}
        let bytes = self.current.materialize(self.config.max_output_len)?;
        info!(
            "bomb ready: {} bytes decode to {} bytes",
            bytes.len(),
            self.decoded_len
        );
        Ok(Bomb {
            bytes,
            decoded_len: self.decoded_len,
            layers: self.reports,
        })
    }

    fn next_state(&self, i: usize) -> ChainState {
        if i < self.spec.len() {
            ChainState::EncodingLayer(i)
        } else {
            ChainState::Done
        }
    }

    fn encode_layer(&mut self, index: usize) -> Result<()> {
        let codec = self.spec.layers()[index];
        // The previous layer's output is owned here until this layer replaces it.
        let decoded = std::mem::take(&mut self.current);
        let state = state_of_plan(&decoded)?;
        let payload = encode_plan(&decoded, &codec.limits(), self.config.max_literal_len)?;
        let framed = frame(codec, payload, &state, &self.config.header);

        let report = LayerReport {
            index,
            codec,
            decoded_len: decoded.virtual_len(),
            encoded_len: framed.virtual_len(),
            crc32: state.crc32(),
            adler32: state.adler32(),
        };
        info!(
            "layer {index} ({codec}): {} -> {} bytes",
            report.decoded_len, report.encoded_len
        );
        if let Some(Segment::Literal(head)) = framed.segments().first() {
            debug!("layer {index} head: {}", hex::encode(&head[..head.len().min(16)]));
        }
        self.reports.push(report);
        self.current = framed;
        Ok(())
    }
}

/// Encode `plan` through every codec of `spec` and return the outermost bytes.
pub fn build_bomb(plan: ContentPlan, spec: &EncodingSpec, config: &BombConfig) -> Result<Bomb> {
    ChainDriver::new(plan, spec, config).run()
}
