//! Error handling.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
#[must_use]
pub enum Error {
    #[error("I2C can only accept addresses of 7 bits (found: {address:#04x})")]
    InvalidAddress { address: u8 },
    #[error("invalid bit rate {bit_rate} bps, must be non-zero")]
    InvalidBitRate { bit_rate: u32 },
    #[error("invalid configuration {path:?}: {error}")]
    InvalidConfig { path: PathBuf, error: String },
    #[error("failed to serialize data: {0}")]
    SerializationFailed(String),
    #[error("{context}: {source:?}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(source: std::io::Error, context: impl Into<String>) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether this error was raised while validating responder settings.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddress { .. } | Self::InvalidBitRate { .. }
        )
    }
}
