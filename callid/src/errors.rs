use thiserror::Error;

/// Errors that occur while decoding an encoded call identifier.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("invalid base64 encoding: {0}")]
    InvalidEncoding(String),

    #[error("invalid call graph protobuf: {0}")]
    InvalidProto(String),

    #[error("call {0} is referenced but not present")]
    MissingCall(String),

    #[error("call {0} has no return type")]
    MissingType(String),

    #[error("argument {name} of call {call} has no value")]
    MissingValue { call: String, name: String },

    #[error("call {0} is part of a cycle")]
    Cycle(String),

    #[error("call stored as {stored} hashes to {computed}")]
    DigestMismatch { stored: String, computed: String },
}
