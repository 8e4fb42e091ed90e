//! Error types for the geometry and collision codecs

use thiserror::Error;

/// Main error type for the codec
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Json(#[from] serde_json::Error),

    /// A table or index field overflowed its hardware limit.
    #[error("Maximum number of {what} exceeded: ({count} / {limit})")]
    Capacity {
        what: &'static str,
        count: usize,
        limit: usize,
    },

    /// Compiled output is larger than the engine reserves for it.
    #[error("Build failed: {kind} size exceeds engine limit 0x{size:X} of 0x{limit:X} bytes ({:4.2}%)", percent(.size, .limit))]
    SizeLimit {
        kind: &'static str,
        size: usize,
        limit: usize,
    },

    /// Input bytes violate a structural invariant of the format.
    #[error("Corrupt data at 0x{offset:X}: {reason}")]
    Corrupt { offset: usize, reason: String },

    /// Child/sibling links of a flattened tree do not form a tree.
    #[error("Broken object tree at entry {index}: {reason}")]
    BrokenTree { index: usize, reason: String },

    #[error("Unknown display list opcode 0x{opcode:02X} at 0x{offset:X}")]
    UnknownOpcode { opcode: u8, offset: usize },

    #[error("Missing reference: {0}")]
    MissingReference(String),

    #[error("Invalid scene: {0}")]
    InvalidScene(String),
}

fn percent(size: &usize, limit: &usize) -> f64 {
    100.0 * *size as f64 / (*limit).max(1) as f64
}

impl Error {
    pub(crate) fn corrupt(offset: usize, reason: impl Into<String>) -> Self {
        Error::Corrupt {
            offset,
            reason: reason.into(),
        }
    }
}
