//! Compiles BuildKit LLB definitions into call identifiers.
//!
//! The conversion is strict: every op, attribute and mount option either has
//! an exact equivalent in the call graph, or the whole conversion fails with
//! an [UnsupportedOpError].

mod convert;
mod errors;
mod exec;
mod file;
mod image_config;
mod layers;
mod paths;
mod secrets;
mod source;

pub use convert::{convert, ConvertOptions, Converted};
pub use errors::UnsupportedOpError;

#[cfg(test)]
mod tests;
