//! Wire representation of call identifiers.
//!
//! These messages are the canonical form every [crate::ID] digest is
//! computed over, so field numbers and field order must never change.
//! prost encodes fields in tag order and `btree_map` fields in key order,
//! which makes `encode_to_vec()` a pure function of the message contents.

use std::collections::BTreeMap;

/// A whole call graph, addressed by the digest of its terminal call.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Dag {
    #[prost(string, tag = "1")]
    pub root_digest: String,

    #[prost(btree_map = "string, message", tag = "2")]
    pub calls_by_digest: BTreeMap<String, Call>,
}

/// One step in a call chain.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Call {
    /// Digest of the receiver call, empty for a call on the root query.
    #[prost(string, tag = "1")]
    pub receiver_digest: String,

    #[prost(message, optional, tag = "2")]
    pub r#type: Option<Type>,

    #[prost(string, tag = "3")]
    pub field: String,

    #[prost(message, repeated, tag = "4")]
    pub args: Vec<Argument>,

    /// Digest of this call. Left empty while the digest itself is being
    /// computed.
    #[prost(string, tag = "5")]
    pub digest: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Type {
    #[prost(string, tag = "1")]
    pub named_type: String,

    #[prost(message, optional, boxed, tag = "2")]
    pub elem: Option<Box<Type>>,

    #[prost(bool, tag = "3")]
    pub non_null: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Argument {
    #[prost(string, tag = "1")]
    pub name: String,

    #[prost(message, optional, tag = "2")]
    pub value: Option<Literal>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Literal {
    #[prost(oneof = "literal::Value", tags = "1, 2, 3, 4, 5, 6, 7, 8, 9")]
    pub value: Option<literal::Value>,
}

pub mod literal {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Value {
        /// Reference to another call in the same [super::Dag].
        #[prost(string, tag = "1")]
        CallDigest(::prost::alloc::string::String),
        #[prost(bool, tag = "2")]
        Null(bool),
        #[prost(bool, tag = "3")]
        Bool(bool),
        #[prost(string, tag = "4")]
        Enum(::prost::alloc::string::String),
        #[prost(int64, tag = "5")]
        Int(i64),
        #[prost(double, tag = "6")]
        Float(f64),
        #[prost(string, tag = "7")]
        String(::prost::alloc::string::String),
        #[prost(message, tag = "8")]
        List(super::List),
        #[prost(message, tag = "9")]
        Object(super::Object),
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct List {
    #[prost(message, repeated, tag = "1")]
    pub values: Vec<Literal>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Object {
    #[prost(message, repeated, tag = "1")]
    pub values: Vec<Argument>,
}
