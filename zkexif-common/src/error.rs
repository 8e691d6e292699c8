//! Error types shared by every zkexif crate.

use std::{fmt, path::PathBuf};

use thiserror::Error;

/// Result type alias for zkexif operations
pub type Result<T> = std::result::Result<T, Error>;

/// Stage of a generate or verify run, used to tag backend failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    CircuitLoad,
    Extraction,
    InputAssembly,
    WitnessComputation,
    Proving,
    PayloadSerialization,
    Verification,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::CircuitLoad => "circuit load",
            Phase::Extraction => "metadata extraction",
            Phase::InputAssembly => "input assembly",
            Phase::WitnessComputation => "witness computation",
            Phase::Proving => "proof generation",
            Phase::PayloadSerialization => "payload serialization",
            Phase::Verification => "proof verification",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Zero tags left after filtering; nothing to commit to.
    #[error("no metadata tags found in {}", .0.display())]
    NoMetadataFound(PathBuf),

    /// Only raised under `TruncationPolicy::Reject`.
    #[error("{found} tags exceed circuit capacity {capacity}")]
    CapacityExceeded { found: usize, capacity: usize },

    #[error("malformed proof payload: {0}")]
    MalformedPayload(String),

    #[error("commitment mismatch: payload commits to {expected}, image recomputes to {recomputed}")]
    CommitmentMismatch { expected: String, recomputed: String },

    #[error("tag {tag} (id {id}) is not among the committed tags")]
    TagNotFound { tag: String, id: u32 },

    #[error("secret-keyed proofs need the holder's secret to recompute the commitment")]
    MissingSecret,

    #[error("{phase} failed: {source}")]
    Backend {
        phase: Phase,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("metadata tool error: {0}")]
    MetadataTool(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn backend(phase: Phase, err: anyhow::Error) -> Self {
        Error::Backend {
            phase,
            source: err.into(),
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedPayload(msg.into())
    }
}
