//! Content-addressed call identifiers.
//!
//! A call identifier describes how a value was computed, as a chain of
//! typed calls with named arguments, for example
//! `container.from(address: "alpine").withExec(args: ["true"])`.

mod digests;
mod errors;
mod id;
mod literal;
pub mod proto;
mod types;

pub use digests::{CallDigest, Error as DigestError, CALL_DIGEST_LEN};
pub use errors::Error;
pub use id::ID;
pub use literal::{Argument, Literal};
pub use types::{
    Type, CACHE_VOLUME, CONTAINER, DIRECTORY, FILE, GIT_REF, GIT_REPOSITORY, HOST, SECRET,
};
