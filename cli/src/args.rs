use std::path::PathBuf;

use callid::ID;
use clap::{Parser, ValueEnum};
use tracing::Level;

/// Converts a marshalled BuildKit LLB definition into a call identifier.
///
/// The definition is read as protobuf bytes from the given path, or from
/// stdin if the path is `-`. Ops that can not be expressed faithfully abort
/// the conversion with a non-zero exit code.
#[derive(Parser, Clone, Debug)]
#[command(name = "llb2id")]
pub struct Args {
    /// A global log level to use when printing logs.
    /// It's also possible to set `RUST_LOG` according to
    /// `tracing_subscriber::filter::EnvFilter`, which will always have
    /// priority.
    #[arg(long, env = "LLB2ID_LOG_LEVEL", default_value_t=Level::INFO)]
    pub log_level: Level,

    #[arg(long, env = "LLB2ID_LOG_FORMAT", value_enum, default_value_t=LogFormat::Compact)]
    pub log_format: LogFormat,

    /// Path to an image config JSON document, applied on top of the
    /// converted container. Both a bare `config` object and a full image
    /// document are accepted.
    #[arg(long, env = "LLB2ID_IMAGE_CONFIG")]
    pub image_config: Option<PathBuf>,

    /// Maps an LLB secret id to an encoded identifier of type Secret, as
    /// `ID=ENCODED`. May be repeated.
    #[arg(long = "secret", value_name = "ID=ENCODED", value_parser = parse_secret)]
    pub secrets: Vec<(String, ID)>,

    /// How to print the resulting identifier.
    #[arg(long, value_enum, default_value_t=Output::Encoded)]
    pub output: Output,

    /// Run execs without the init process.
    #[arg(long, env = "LLB2ID_NO_INIT")]
    pub no_init: bool,

    /// Path to the marshalled definition, `-` for stdin.
    pub definition: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Output {
    /// base64 of the call graph protobuf
    Encoded,
    /// the human-readable call chain
    Display,
    /// the blake3 digest of the final call
    Digest,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

impl From<LogFormat> for llb_tracing::Format {
    fn from(value: LogFormat) -> Self {
        match value {
            LogFormat::Compact => llb_tracing::Format::Compact,
            LogFormat::Json => llb_tracing::Format::Json,
        }
    }
}

fn parse_secret(s: &str) -> Result<(String, ID), String> {
    let (name, encoded) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ID=ENCODED, got {:?}", s))?;
    if name.is_empty() {
        return Err("secret id is empty".into());
    }
    let id = ID::decode(encoded).map_err(|e| format!("invalid identifier for {}: {}", name, e))?;
    Ok((name.to_string(), id))
}
