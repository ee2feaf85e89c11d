use std::collections::{BTreeMap, HashMap};

use callid::{Argument, Type, ID};
use llb_compat::{
    proto::{Definition, Platform},
    Dag, ImageConfig, NodeIndex, OpKind, Vertex,
};
use tracing::{debug, instrument, trace};

use crate::image_config::apply_image_config;
use crate::UnsupportedOpError;

/// Caller-supplied inputs of a conversion, besides the graph itself.
#[derive(Clone, Debug, Default)]
pub struct ConvertOptions {
    /// Maps LLB secret ids to identifiers of type `Secret`.
    pub secrets: BTreeMap<String, ID>,

    /// Run execs without the init process.
    pub no_init: bool,
}

/// The result of converting one op output.
#[derive(Clone, Debug, PartialEq)]
pub enum Converted {
    Container(ID),
    Directory(ID),
}

impl Converted {
    pub fn id(&self) -> &ID {
        match self {
            Converted::Container(id) | Converted::Directory(id) => id,
        }
    }

    /// The filesystem of the result.
    pub fn into_directory(self) -> ID {
        match self {
            Converted::Container(ctr) => rootfs(&ctr),
            Converted::Directory(dir) => dir,
        }
    }

    /// The result as a container, wrapping directories into an empty one.
    pub fn into_container(self) -> ID {
        match self {
            Converted::Container(ctr) => ctr,
            Converted::Directory(dir) => with_rootfs(&scratch_container(), dir),
        }
    }
}

/// Converts a marshalled LLB definition into a container call identifier,
/// and applies the image config on top.
///
/// A missing or empty definition converts to an empty container. Every op
/// reachable from the terminal record is converted exactly once; the first
/// op that can not be expressed aborts the conversion.
#[instrument(level = "debug", skip_all, fields(definition.ops = definition.map(|d| d.def.len()).unwrap_or_default()), err)]
pub fn convert(
    definition: Option<&Definition>,
    image_config: Option<&ImageConfig>,
    options: &ConvertOptions,
) -> Result<ID, UnsupportedOpError> {
    let definition = match definition {
        Some(definition) if !definition.def.is_empty() => definition,
        _ => return apply_image_config(scratch_container(), image_config),
    };

    let dag = Dag::from_definition(definition)?;

    // step through the payload-less terminal op(s)
    let mut root = dag.root();
    loop {
        let vertex = dag.vertex(root);
        if !matches!(vertex.kind(), OpKind::Noop) {
            break;
        }
        match vertex.inputs() {
            [] => {
                debug!("definition has no result, using an empty container");
                return apply_image_config(scratch_container(), image_config);
            }
            [input] => root = *input,
            inputs => {
                return Err(unsupported(
                    vertex,
                    "unknown",
                    format!("unsupported synthetic root with {} inputs", inputs.len()),
                ))
            }
        }
    }

    let mut converter = Converter::new(&dag, options);
    let result = converter.convert_from(root)?;

    apply_image_config(result.into_container(), image_config)
}

/// Converts the vertices of one [Dag], memoizing results per vertex.
pub(crate) struct Converter<'a> {
    dag: &'a Dag,
    pub(crate) options: &'a ConvertOptions,
    memo: HashMap<NodeIndex, Converted>,
}

impl<'a> Converter<'a> {
    pub(crate) fn new(dag: &'a Dag, options: &'a ConvertOptions) -> Self {
        Self {
            dag,
            options,
            memo: HashMap::new(),
        }
    }

    /// Converts `start` and everything it depends on, inputs first.
    pub(crate) fn convert_from(
        &mut self,
        start: NodeIndex,
    ) -> Result<Converted, UnsupportedOpError> {
        for ix in self.dag.post_order(start) {
            if self.memo.contains_key(&ix) {
                trace!(vertex = ix.index(), "already converted");
                continue;
            }
            let converted = self.convert_vertex(ix)?;
            self.memo.insert(ix, converted);
        }

        self.memo.get(&start).cloned().ok_or_else(|| {
            UnsupportedOpError::new(
                Some(*self.dag.vertex(start).digest()),
                "unknown",
                "root was not converted",
            )
        })
    }

    #[instrument(level = "trace", skip(self), fields(op.digest = %self.dag.vertex(ix).digest(), op.kind = ?self.dag.vertex(ix).kind()), err)]
    fn convert_vertex(&self, ix: NodeIndex) -> Result<Converted, UnsupportedOpError> {
        let vertex = self.dag.vertex(ix);

        match vertex.kind() {
            OpKind::Exec(exec) => self.convert_exec(vertex, exec),
            OpKind::File(file) => self.convert_file(vertex, file),
            OpKind::Merge(merge) => self.convert_merge(vertex, merge),
            OpKind::Diff(diff) => self.convert_diff(vertex, diff),
            OpKind::Source(kind, source) => self.convert_source(vertex, kind, source),
            OpKind::Build(_) => Err(unsupported(
                vertex,
                "build",
                "BuildOp is explicitly unsupported",
            )),
            OpKind::Noop => Err(unsupported(vertex, "unknown", "unsupported op type")),
        }
    }

    /// The converted result of the op input at `index`.
    pub(crate) fn input(
        &self,
        vertex: &Vertex,
        op_type: &str,
        index: i64,
    ) -> Result<&Converted, UnsupportedOpError> {
        let ix = usize::try_from(index)
            .ok()
            .and_then(|i| vertex.inputs().get(i))
            .ok_or_else(|| {
                unsupported(vertex, op_type, format!("input index {} out of range", index))
            })?;

        self.memo.get(ix).ok_or_else(|| {
            unsupported(
                vertex,
                op_type,
                format!("input index {} was not converted", index),
            )
        })
    }

    /// The filesystem of the op input at `index`, or an empty directory for
    /// [llb_compat::proto::EMPTY_INPUT].
    pub(crate) fn input_directory(
        &self,
        vertex: &Vertex,
        op_type: &str,
        index: i64,
    ) -> Result<ID, UnsupportedOpError> {
        if index == llb_compat::proto::EMPTY_INPUT {
            return Ok(scratch_directory());
        }
        Ok(self.input(vertex, op_type, index)?.clone().into_directory())
    }
}

pub(crate) fn unsupported(
    vertex: &Vertex,
    op_type: &str,
    reason: impl Into<String>,
) -> UnsupportedOpError {
    UnsupportedOpError::new(Some(*vertex.digest()), op_type, reason)
}

pub(crate) fn scratch_container() -> ID {
    ID::new(Type::container(), "container", vec![])
}

pub(crate) fn scratch_directory() -> ID {
    ID::new(Type::directory(), "directory", vec![])
}

pub(crate) fn rootfs(ctr: &ID) -> ID {
    ctr.append(Type::directory(), "rootfs", vec![])
}

pub(crate) fn with_rootfs(ctr: &ID, dir: ID) -> ID {
    ctr.append(
        Type::container(),
        "withRootfs",
        vec![Argument::new("directory", dir)],
    )
}

/// An empty container for the platform of the op.
pub(crate) fn platform_container(vertex: &Vertex, op_type: &str) -> Result<ID, UnsupportedOpError> {
    let args = match vertex.platform() {
        Some(platform) => vec![Argument::new(
            "platform",
            platform_literal(platform).map_err(|reason| unsupported(vertex, op_type, reason))?,
        )],
        None => vec![],
    };

    Ok(ID::new(Type::container(), "container", args))
}

/// Renders a platform as `os/arch[/variant]`.
fn platform_literal(platform: &Platform) -> Result<String, String> {
    if platform.os.is_empty() || platform.architecture.is_empty() {
        return Err("invalid platform: missing OS or architecture".to_string());
    }
    if !platform.os_version.is_empty() || !platform.os_features.is_empty() {
        return Err("unsupported platform fields osVersion/osFeatures".to_string());
    }

    let mut literal = format!("{}/{}", platform.os, platform.architecture);
    if !platform.variant.is_empty() {
        literal.push('/');
        literal.push_str(&platform.variant);
    }
    Ok(literal)
}

#[cfg(test)]
mod tests {
    use super::platform_literal;
    use llb_compat::proto::Platform;
    use rstest::rstest;

    fn platform(os: &str, arch: &str, variant: &str) -> Platform {
        Platform {
            os: os.into(),
            architecture: arch.into(),
            variant: variant.into(),
            ..Default::default()
        }
    }

    #[rstest]
    #[case::plain(platform("linux", "amd64", ""), Ok("linux/amd64".to_string()))]
    #[case::variant(platform("linux", "arm", "v7"), Ok("linux/arm/v7".to_string()))]
    #[case::no_os(platform("", "amd64", ""), Err("invalid platform: missing OS or architecture".to_string()))]
    #[case::os_version(Platform { os_version: "10.0".into(), ..platform("windows", "amd64", "") }, Err("unsupported platform fields osVersion/osFeatures".to_string()))]
    fn literal(#[case] platform: Platform, #[case] expected: Result<String, String>) {
        assert_eq!(expected, platform_literal(&platform));
    }
}
