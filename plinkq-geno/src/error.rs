//! Shared error type for genotype and sidecar I/O.
//!
//! Errors are classified into three kinds rather than many types:
//! configuration problems detected at bind time (`InvalidInput`), file
//! and decoder failures (`Io`), and features the readers do not expose
//! (`NotImplemented`). Downstream crates reuse this enum so a caller can
//! dispatch on the kind without unwrapping nested error chains.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlinkError {
    /// Malformed parameters, schema mismatches, unknown IDs.
    /// Raised synchronously at bind; no I/O state has been created yet.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// File open/read failure with path context.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Decoder-reported corruption or record-read failure at a variant.
    #[error("decode error at variant {vidx}: {msg}")]
    Decode { vidx: u32, msg: String },

    /// Reader features that exist in the format but are not exposed.
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

impl PlinkError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        PlinkError::InvalidInput(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PlinkError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn decode(vidx: u32, msg: impl Into<String>) -> Self {
        PlinkError::Decode {
            vidx,
            msg: msg.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PlinkError>;
