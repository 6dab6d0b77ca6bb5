//! Error reporting helpers for the command line front end.
use std::fmt;
use std::io;
use std::path::Path;

use crate::BombError;

#[derive(Debug)]
pub struct CliError {
    pub msg: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.msg)
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Format a user friendly I/O error message with suggestions.
pub fn format_io_error(operation: &str, path: &Path, err: &io::Error) -> String {
    use io::ErrorKind::*;
    let suggestion = match err.kind() {
        NotFound => "Check that the file exists and the path is correct.",
        PermissionDenied => "Check permissions or run as a different user.",
        WriteZero => "Disk may be full. Free up space and try again.",
        Other if err.raw_os_error() == Some(28) => {
            "Disk may be full. Free up space and try again."
        }
        _ => "Check permissions or free up disk space.",
    };
    format!(
        "Error {} '{}': {}. {}",
        operation,
        path.display(),
        err,
        suggestion
    )
}

/// Convert an I/O error into a CLI error with context.
pub fn io_cli_error(operation: &str, path: &Path, err: io::Error) -> CliError {
    CliError {
        msg: format_io_error(operation, path, &err),
        source: Some(Box::new(err)),
    }
}

/// Simple CLI error from string.
pub fn simple_cli_error(msg: &str) -> CliError {
    CliError {
        msg: msg.to_string(),
        source: None,
    }
}

/// Convert a library error into a CLI error with a hint.
pub fn bomb_cli_error(context: &str, err: BombError) -> CliError {
    CliError {
        msg: format!("{}: {}", context, cli_hint(&err)),
        source: Some(Box::new(err)),
    }
}

/// Return an actionable hint for a library error variant.
pub fn cli_hint(err: &BombError) -> String {
    use BombError::*;
    match err {
        InvalidDirective(msg) => {
            format!(
                "{msg}. Directives look like file:PATH, text:STR, hex:HEX, \
                 fill:BYTE[*COUNT] or tile:STR."
            )
        }
        UnsupportedCodec(token) => format!(
            "'{token}' is not supported. Use gzip, x-gzip, deflate or deflate-raw."
        ),
        SegmentTooLarge { len, limit } => format!(
            "Literal of {len} bytes is over the {limit} byte limit. Use a fill instead."
        ),
        OutputTooLarge { len, limit } => format!(
            "Output would be {len} bytes, over the {limit} byte limit. Add more layers."
        ),
        Config(msg) => format!("{msg}. Invalid configuration."),
        Io(io) => format!("{io}"),
        Internal(msg) => format!("{msg}. This is a bug."),
    }
}
