use thiserror::Error;

#[derive(Error, Debug)]
pub enum BombError {
    /// A content directive could not be turned into a segment.
    #[error("invalid directive: {0}")]
    InvalidDirective(String),

    /// The encoding list names a codec outside the supported set.
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// A literal segment is longer than the configured addressable limit.
    #[error("literal segment of {len} bytes exceeds limit of {limit} bytes")]
    SegmentTooLarge { len: usize, limit: usize },

    /// The outermost layer is still too large to hold in memory.
    #[error("final output of {len} bytes exceeds limit of {limit} bytes")]
    OutputTooLarge { len: String, limit: usize },

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Propagated I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch all for unexpected internal problems.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, BombError>;
