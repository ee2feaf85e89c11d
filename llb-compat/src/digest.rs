use data_encoding::HEXLOWER;
use sha2::{Digest as _, Sha256};
use thiserror::Error;

pub const SHA256_LEN: usize = 32;

const PREFIX: &str = "sha256:";

/// Identity of an LLB op: the sha256 of its marshalled record.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; SHA256_LEN]);

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("digest {0:?} has no sha256: prefix")]
    InvalidPrefix(String),

    #[error("digest {0:?} is not valid hex")]
    InvalidEncoding(String),

    #[error("invalid digest length: {0}")]
    InvalidDigestLen(usize),
}

impl Digest {
    /// Hashes a marshalled op record.
    pub fn of(record: &[u8]) -> Self {
        Self(Sha256::digest(record).into())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; SHA256_LEN]> for Digest {
    fn from(value: [u8; SHA256_LEN]) -> Self {
        Self(value)
    }
}

impl std::str::FromStr for Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .strip_prefix(PREFIX)
            .ok_or_else(|| Error::InvalidPrefix(s.to_string()))?;
        let raw = HEXLOWER
            .decode(hex.as_bytes())
            .map_err(|_| Error::InvalidEncoding(s.to_string()))?;

        let len = raw.len();
        Ok(Self(raw.try_into().map_err(|_| Error::InvalidDigestLen(len))?))
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", PREFIX, HEXLOWER.encode(&self.0))
    }
}

impl std::fmt::Debug for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", PREFIX, HEXLOWER.encode(&self.0))
    }
}
