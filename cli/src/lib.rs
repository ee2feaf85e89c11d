use std::{io::Read, path::Path};

use anyhow::Context;
use llb_compat::{proto::Definition, ImageConfig};
use llb_convert::ConvertOptions;
use prost::Message;
use tracing::{debug, instrument};

pub mod args;

pub use args::{Args, Output};

/// Reads the inputs named in `args`, converts them and renders the result.
pub fn run(args: &Args) -> anyhow::Result<String> {
    let definition = read_input(&args.definition)?;
    let image_config = args
        .image_config
        .as_deref()
        .map(read_input)
        .transpose()?;

    convert_bytes(args, &definition, image_config.as_deref())
}

/// Converts a marshalled definition, with an optional image config JSON
/// document, and renders the identifier as requested by `args.output`.
#[instrument(level = "debug", skip_all, fields(definition.len = definition.len()))]
pub fn convert_bytes(
    args: &Args,
    definition: &[u8],
    image_config: Option<&[u8]>,
) -> anyhow::Result<String> {
    let definition =
        Definition::decode(definition).context("unable to decode LLB definition")?;
    let image_config = image_config
        .map(parse_image_config)
        .transpose()
        .context("unable to parse image config")?;

    let options = ConvertOptions {
        secrets: args.secrets.iter().cloned().collect(),
        no_init: args.no_init,
    };

    let id = llb_convert::convert(Some(&definition), image_config.as_ref(), &options)?;
    debug!(digest = %id.digest(), "converted definition");

    Ok(match args.output {
        Output::Encoded => id.encode(),
        Output::Display => id.to_string(),
        Output::Digest => id.digest().to_string(),
    })
}

/// Parses either a bare image config object or a full image document, in
/// which case the `config` object is used and `os` copied over.
fn parse_image_config(data: &[u8]) -> anyhow::Result<ImageConfig> {
    let document: serde_json::Value = serde_json::from_slice(data)?;
    match document.get("config") {
        Some(config) if config.is_object() => {
            let mut image_config: ImageConfig = serde_json::from_value(config.clone())?;
            if image_config.os.is_empty() {
                if let Some(os) = document.get("os").and_then(serde_json::Value::as_str) {
                    image_config.os = os.to_string();
                }
            }
            Ok(image_config)
        }
        _ => Ok(ImageConfig::from_json(data)?),
    }
}

fn read_input(path: &Path) -> anyhow::Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut buf = vec![];
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("unable to read stdin")?;
        return Ok(buf);
    }

    std::fs::read(path).with_context(|| format!("unable to read {}", path.display()))
}

#[cfg(test)]
mod tests;
