use callid::{Argument, Literal, Type, ID};
use llb_compat::{HealthConfig, ImageConfig};
use tracing::{debug, instrument};

use crate::UnsupportedOpError;

const OP: &str = "image-config";

fn invalid(reason: impl Into<String>) -> UnsupportedOpError {
    UnsupportedOpError::new(None, OP, reason)
}

/// Applies the runtime configuration of an image to a container, as a
/// fixed sequence of calls. Without a config, the container is returned
/// unchanged.
#[instrument(level = "debug", skip_all, err)]
pub(crate) fn apply_image_config(
    ctr: ID,
    config: Option<&ImageConfig>,
) -> Result<ID, UnsupportedOpError> {
    let Some(config) = config else {
        return Ok(ctr);
    };

    if config.os.eq_ignore_ascii_case("windows") && config.args_escaped {
        return Err(invalid("ArgsEscaped on windows images is unsupported"));
    }

    let with =
        |ctr: ID, field: &str, args: Vec<Argument>| ctr.append(Type::container(), field, args);
    let mut ctr = ctr;

    if !config.user.is_empty() {
        ctr = with(ctr, "withUser", vec![Argument::new("name", config.user.as_str())]);
    }
    if !config.working_dir.is_empty() {
        ctr = with(
            ctr,
            "withWorkdir",
            vec![Argument::new("path", config.working_dir.as_str())],
        );
    }

    for entry in &config.env {
        let (name, value) = entry
            .split_once('=')
            .ok_or_else(|| invalid(format!("invalid env entry {:?}", entry)))?;
        ctr = with(
            ctr,
            "withEnvVariable",
            vec![Argument::new("name", name), Argument::new("value", value)],
        );
    }

    // labels and ports are kept in ordered maps
    for (name, value) in &config.labels {
        ctr = with(
            ctr,
            "withLabel",
            vec![
                Argument::new("name", name.as_str()),
                Argument::new("value", value.as_str()),
            ],
        );
    }

    let mut ports = config
        .exposed_ports
        .keys()
        .map(|spec| parse_port(spec))
        .collect::<Result<Vec<_>, _>>()?;
    ports.sort();
    ports.dedup();
    for (port, protocol) in ports {
        ctr = with(
            ctr,
            "withExposedPort",
            vec![
                Argument::new("port", Literal::Int(i64::from(port))),
                Argument::new("protocol", Literal::enum_value(protocol)),
            ],
        );
    }

    ctr = match &config.entrypoint {
        None => with(ctr, "withoutEntrypoint", vec![]),
        Some(args) => with(
            ctr,
            "withEntrypoint",
            vec![
                Argument::new("args", Literal::strings(args)),
                Argument::new("keepDefaultArgs", true),
            ],
        ),
    };
    ctr = match &config.cmd {
        None => with(ctr, "withoutDefaultArgs", vec![]),
        Some(args) => with(
            ctr,
            "withDefaultArgs",
            vec![Argument::new("args", Literal::strings(args))],
        ),
    };

    if config.has_extra_metadata() {
        debug!("carrying extra image metadata");
        ctr = with(ctr, "withImageConfigMetadata", extra_metadata_args(config));
    }

    Ok(ctr)
}

/// Parses an exposed port spec of the form `port[/proto]`.
fn parse_port(spec: &str) -> Result<(u16, &'static str), UnsupportedOpError> {
    let (port, protocol) = spec.split_once('/').unwrap_or((spec, "tcp"));

    let protocol = match protocol.to_ascii_lowercase().as_str() {
        "tcp" => "TCP",
        "udp" => "UDP",
        _ => {
            return Err(invalid(format!(
                "unsupported exposed port protocol in {:?}",
                spec
            )))
        }
    };
    let port = port
        .parse::<u16>()
        .ok()
        .filter(|port| *port > 0)
        .ok_or_else(|| invalid(format!("invalid exposed port {:?}", spec)))?;

    Ok((port, protocol))
}

fn extra_metadata_args(config: &ImageConfig) -> Vec<Argument> {
    let mut args = Vec::new();

    if let Some(healthcheck) = &config.healthcheck {
        args.push(Argument::new("healthcheck", healthcheck_literal(healthcheck)));
    }
    if !config.on_build.is_empty() {
        args.push(Argument::new("onBuild", Literal::strings(&config.on_build)));
    }
    if !config.shell.is_empty() {
        args.push(Argument::new("shell", Literal::strings(&config.shell)));
    }
    if !config.volumes.is_empty() {
        args.push(Argument::new("volumes", Literal::strings(config.volumes.keys())));
    }
    if !config.stop_signal.is_empty() {
        args.push(Argument::new("stopSignal", config.stop_signal.as_str()));
    }

    args
}

fn healthcheck_literal(healthcheck: &HealthConfig) -> Literal {
    let mut fields = Vec::new();
    if !healthcheck.test.is_empty() {
        fields.push(Argument::new("test", Literal::strings(&healthcheck.test)));
    }
    for (name, value) in [
        ("interval", healthcheck.interval),
        ("timeout", healthcheck.timeout),
        ("startPeriod", healthcheck.start_period),
        ("startInterval", healthcheck.start_interval),
        ("retries", healthcheck.retries),
    ] {
        if value != 0 {
            fields.push(Argument::new(name, Literal::Int(value)));
        }
    }

    Literal::Object(fields)
}
