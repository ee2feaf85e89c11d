use llb_compat::Digest;
use thiserror::Error;

/// The single error kind of the converter: a part of the LLB graph that
/// cannot be expressed faithfully as a call identifier.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("unsupported {} op{}: {}", .op_type, digest_suffix(.op_digest), .reason)]
pub struct UnsupportedOpError {
    /// Digest of the offending op, if the error is tied to one.
    pub op_digest: Option<Digest>,

    /// Category of the op, like `exec`, `file.copy` or `source(git)`.
    pub op_type: String,

    pub reason: String,
}

fn digest_suffix(digest: &Option<Digest>) -> String {
    digest.map(|d| format!(" {}", d)).unwrap_or_default()
}

impl UnsupportedOpError {
    pub fn new(
        op_digest: Option<Digest>,
        op_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            op_digest,
            op_type: op_type.into(),
            reason: reason.into(),
        }
    }
}

impl From<llb_compat::DefinitionError> for UnsupportedOpError {
    fn from(value: llb_compat::DefinitionError) -> Self {
        use llb_compat::DefinitionError::*;

        let digest = match &value {
            Empty => None,
            InvalidOp(d, _) | InvalidInputDigest(d, _) | OpNotFound(d) | Cycle(d) => Some(*d),
        };
        Self::new(digest, "definition", value.to_string())
    }
}
