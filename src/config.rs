use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BombError, Result};
use crate::plan::DEFAULT_MAX_LITERAL_LEN;

/// Fixed container header fields. Everything here is a constant for the
/// whole run so that identical inputs give identical bytes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct HeaderConfig {
    /// gzip MTIME field.
    pub mtime: u32,
    /// gzip OS field; 255 means "unknown".
    pub os: u8,
    /// gzip XFL field.
    pub xfl: u8,
    /// Optional gzip FNAME field (written without the terminating NUL).
    pub file_name: Option<String>,
    /// zlib FLEVEL bits (0..=3).
    pub zlib_level: u8,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            mtime: 0,
            os: 255,
            xfl: 0,
            file_name: None,
            zlib_level: 0,
        }
    }
}

/// Runtime configuration for building a bomb.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct BombConfig {
    pub header: HeaderConfig,
    /// Longest literal segment the encoder accepts.
    pub max_literal_len: usize,
    /// Largest final output that may be materialised.
    pub max_output_len: usize,
}

impl Default for BombConfig {
    fn default() -> Self {
        Self {
            header: HeaderConfig::default(),
            max_literal_len: DEFAULT_MAX_LITERAL_LEN,
            max_output_len: 64 << 20,
        }
    }
}

impl BombConfig {
    /// Load a JSON config; missing fields take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: BombConfig = serde_json::from_str(&text)
            .map_err(|e| BombError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.header.zlib_level > 3 {
            return Err(BombError::Config(format!(
                "zlib_level {} is outside 0..=3",
                self.header.zlib_level
            )));
        }
        if let Some(name) = &self.header.file_name {
            if name.bytes().any(|b| b == 0) {
                return Err(BombError::Config("file_name contains a NUL byte".into()));
            }
        }
        Ok(())
    }
}
