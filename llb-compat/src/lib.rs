//! Data model of BuildKit's low-level build graph (LLB): the protobuf wire
//! messages, op digests, a resolver turning a marshalled definition into an
//! in-memory graph, and the image config record.

mod builder;
mod dag;
pub mod digest;
mod errors;
mod image_config;
mod op;
pub mod proto;
pub mod source;

pub use builder::DefinitionBuilder;
pub use dag::{Dag, Vertex};
pub use digest::Digest;
pub use errors::{DefinitionError, ImageConfigError};
pub use image_config::{HealthConfig, ImageConfig};
pub use op::OpKind;
pub use source::SourceKind;

pub use petgraph::graph::NodeIndex;
