//! Builds layered compression bombs for stacked content codings.
//!
//! A [`ContentPlan`] describes the fully decoded content as literal runs and
//! single-byte fill runs whose counts may be astronomically large. The
//! [`ChainDriver`] encodes it through each codec of an [`EncodingSpec`],
//! innermost first, keeping every intermediate layer as a plan so nothing the
//! size of the decoded content is ever built. Trailer checksums for virtual
//! content come from the algebra in [`checksum`].
//!
//! ```no_run
//! use layerbomb::{build_bomb, BombConfig, EncodingSpec, PlanBuilder};
//! use num_bigint::BigUint;
//!
//! let mut builder = PlanBuilder::new(BigUint::from(10u32).pow(100));
//! builder.literal("<html>").fill(b' ')?.literal("</html>");
//! let spec: EncodingSpec = "gzip, gzip, gzip".parse()?;
//! let bomb = build_bomb(builder.build(), &spec, &BombConfig::default())?;
//! # Ok::<(), layerbomb::BombError>(())
//! ```

pub mod bitio;
pub mod chain;
pub mod checksum;
pub mod codec;
pub mod config;
pub mod deflate;
pub mod error;
pub mod frame;
pub mod io_utils;
pub mod plan;

pub use chain::{build_bomb, Bomb, ChainDriver, ChainState, LayerReport};
pub use checksum::{combine, state_of, state_of_fill, state_of_plan, ChecksumState};
pub use codec::{Codec, DeflateLimits, EncodingSpec, DEFLATE_LIMITS};
pub use config::{BombConfig, HeaderConfig};
pub use error::{BombError, Result};
pub use plan::{ContentPlan, Directive, PlanBuilder, Segment};
