use callid::ID;
use llb_compat::{
    proto::{
        file_action, op, ChownOpt, Definition, ExecOp, FileAction, FileActionCopy,
        FileActionMkDir, FileActionMkFile, FileOp, Input, Meta, Mount, MountType, Op, SourceOp,
        EMPTY_INPUT,
    },
    DefinitionBuilder, ImageConfig,
};

use crate::{convert, ConvertOptions, UnsupportedOpError};

mod graph;
mod sources;

/// Builds a definition through `build`, which returns the root output.
pub(crate) fn definition(
    build: impl FnOnce(&mut DefinitionBuilder) -> Option<Input>,
) -> Definition {
    let mut b = DefinitionBuilder::new();
    let root = build(&mut b);
    b.finish(root)
}

pub(crate) fn source(identifier: &str, attrs: &[(&str, &str)]) -> Op {
    Op {
        op: Some(op::Op::Source(SourceOp {
            identifier: identifier.into(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })),
        ..Default::default()
    }
}

pub(crate) fn image(reference: &str) -> Op {
    source(&format!("docker-image://{}", reference), &[])
}

pub(crate) fn meta(args: &[&str]) -> Meta {
    Meta {
        args: args.iter().map(|a| a.to_string()).collect(),
        cwd: "/".into(),
        ..Default::default()
    }
}

/// A read-write bind mount at `/`, carrying output 0.
pub(crate) fn root_mount(input: i64) -> Mount {
    Mount {
        input,
        dest: "/".into(),
        output: 0,
        mount_type: MountType::Bind as i32,
        ..Default::default()
    }
}

pub(crate) fn exec(inputs: Vec<Input>, meta: Meta, mounts: Vec<Mount>) -> Op {
    Op {
        inputs,
        op: Some(op::Op::Exec(ExecOp {
            meta: Some(meta),
            mounts,
            ..Default::default()
        })),
        ..Default::default()
    }
}

pub(crate) fn file(inputs: Vec<Input>, actions: Vec<FileAction>) -> Op {
    Op {
        inputs,
        op: Some(op::Op::File(FileOp { actions })),
        ..Default::default()
    }
}

pub(crate) fn mkfile(input: i64, output: i64, path: &str, data: &str) -> FileAction {
    FileAction {
        input,
        secondary_input: EMPTY_INPUT,
        output,
        action: Some(file_action::Action::Mkfile(FileActionMkFile {
            path: path.into(),
            mode: 0o644,
            data: data.as_bytes().to_vec().into(),
            owner: None,
            timestamp: -1,
        })),
    }
}

pub(crate) fn mkdir(input: i64, output: i64, path: &str, owner: Option<ChownOpt>) -> FileAction {
    FileAction {
        input,
        secondary_input: EMPTY_INPUT,
        output,
        action: Some(file_action::Action::Mkdir(FileActionMkDir {
            path: path.into(),
            mode: 0o755,
            make_parents: true,
            owner,
            timestamp: -1,
        })),
    }
}

/// A copy as BuildKit clients emit it by default.
pub(crate) fn copy_opts(src: &str, dest: &str) -> FileActionCopy {
    FileActionCopy {
        src: src.into(),
        dest: dest.into(),
        mode: -1,
        follow_symlink: true,
        create_dest_path: true,
        allow_wildcard: true,
        allow_empty_wildcard: true,
        timestamp: -1,
        ..Default::default()
    }
}

pub(crate) fn copy(input: i64, secondary: i64, output: i64, copy: FileActionCopy) -> FileAction {
    FileAction {
        input,
        secondary_input: secondary,
        output,
        action: Some(file_action::Action::Copy(copy)),
    }
}

pub(crate) fn convert_ok(definition: &Definition) -> ID {
    convert_with(definition, None, &ConvertOptions::default()).expect("must convert")
}

pub(crate) fn convert_err(definition: &Definition) -> UnsupportedOpError {
    convert_with(definition, None, &ConvertOptions::default()).expect_err("must fail")
}

pub(crate) fn convert_with(
    definition: &Definition,
    image_config: Option<&ImageConfig>,
    options: &ConvertOptions,
) -> Result<ID, UnsupportedOpError> {
    convert(Some(definition), image_config, options)
}

/// The `directory` argument of the closest `withRootfs` call.
pub(crate) fn rootfs_arg(ctr: &ID) -> ID {
    ctr.find_in_chain("withRootfs")
        .and_then(|c| c.arg("directory"))
        .and_then(|d| d.as_id())
        .cloned()
        .expect("must have withRootfs")
}

/// The identifier argument `name` of `id`.
pub(crate) fn id_arg(id: &ID, name: &str) -> ID {
    id.arg(name)
        .and_then(|a| a.as_id())
        .cloned()
        .unwrap_or_else(|| panic!("{} has no ID argument {}", id, name))
}

pub(crate) fn str_arg<'a>(id: &'a ID, name: &str) -> Option<&'a str> {
    id.arg(name).and_then(|a| a.as_str())
}

/// Whether any call reachable from `id` is named `field`.
pub(crate) fn reaches(id: &ID, field: &str) -> bool {
    id.walk().iter().any(|c| c.field() == field)
}
