use thiserror::Error;

use crate::Digest;

/// Errors that occur while resolving a [crate::proto::Definition] into a
/// [crate::Dag].
#[derive(Debug, Error, PartialEq)]
pub enum DefinitionError {
    #[error("definition contains no ops")]
    Empty,

    #[error("failed to decode op {0}: {1}")]
    InvalidOp(Digest, String),

    #[error("op {0} refers to invalid input digest: {1}")]
    InvalidInputDigest(Digest, crate::digest::Error),

    #[error("op with digest {0} not found")]
    OpNotFound(Digest),

    #[error("op {0} is part of a cycle")]
    Cycle(Digest),
}

/// Errors that occur while parsing an image config record.
#[derive(Debug, Error)]
pub enum ImageConfigError {
    #[error("invalid image config: {0}")]
    Json(#[from] serde_json::Error),
}
