use bytes::Bytes;
use data_encoding::BASE64;
use thiserror::Error;

/// Content digest of a single call in a call identifier chain.
/// This is the blake3 hash of the canonical protobuf encoding of the call.
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallDigest(Bytes);

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("invalid digest length: {0}")]
    InvalidDigestLen(usize),

    #[error("invalid digest prefix in {0:?}")]
    InvalidPrefix(String),

    #[error("invalid digest encoding: {0}")]
    InvalidEncoding(String),
}

pub const CALL_DIGEST_LEN: usize = 32;

const PREFIX: &str = "b3:";

impl CallDigest {
    pub fn as_slice(&self) -> &[u8] {
        &self.0[..]
    }

    /// Hashes the given bytes.
    pub fn of(data: &[u8]) -> Self {
        blake3::hash(data).into()
    }
}

impl From<blake3::Hash> for CallDigest {
    fn from(value: blake3::Hash) -> Self {
        Self(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl TryFrom<Vec<u8>> for CallDigest {
    type Error = Error;

    // constructs a [CallDigest] from a [Vec<u8>].
    // Returns an error if the digest has the wrong length.
    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        if value.len() != CALL_DIGEST_LEN {
            Err(Error::InvalidDigestLen(value.len()))
        } else {
            Ok(Self(value.into()))
        }
    }
}

impl From<&[u8; CALL_DIGEST_LEN]> for CallDigest {
    fn from(value: &[u8; CALL_DIGEST_LEN]) -> Self {
        Self(value.to_vec().into())
    }
}

impl std::str::FromStr for CallDigest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let encoded = s
            .strip_prefix(PREFIX)
            .ok_or_else(|| Error::InvalidPrefix(s.to_string()))?;

        let raw = BASE64
            .decode(encoded.as_bytes())
            .map_err(|e| Error::InvalidEncoding(e.to_string()))?;

        raw.try_into()
    }
}

impl Clone for CallDigest {
    fn clone(&self) -> Self {
        Self(self.0.to_owned())
    }
}

impl std::fmt::Display for CallDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", PREFIX, BASE64.encode(&self.0))
    }
}

impl std::fmt::Debug for CallDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", PREFIX, BASE64.encode(&self.0))
    }
}
