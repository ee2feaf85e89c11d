use std::collections::HashMap;

use callid::{Argument, Literal, Type, ID};
use llb_compat::{
    proto::{
        file_action::Action, user_opt, ChownOpt, FileAction, FileActionCopy, FileActionMkDir,
        FileActionMkFile, FileActionRm, FileOp, UserOpt, EMPTY_INPUT, SKIP_OUTPUT,
    },
    Vertex,
};

use crate::convert::{rootfs, scratch_directory, unsupported, with_rootfs, Converter};
use crate::paths::{clean_path, has_wildcard, split_parent};
use crate::{Converted, UnsupportedOpError};

const OP: &str = "file";

/// The state of the filesystem after an action, together with the container
/// it belongs to, if any. Named owners can only be resolved inside a
/// container, so the container is carried along the action chain.
#[derive(Clone, Debug)]
struct Snapshot {
    dir: ID,
    ctr: Option<ID>,
}

impl Converter<'_> {
    /// Converts a file op by applying its actions in order. Actions can
    /// consume the op inputs, or the outputs of earlier actions.
    pub(crate) fn convert_file(
        &self,
        vertex: &Vertex,
        file: &FileOp,
    ) -> Result<Converted, UnsupportedOpError> {
        let mut inputs = Vec::with_capacity(vertex.inputs().len());
        for index in 0..vertex.inputs().len() as i64 {
            inputs.push(match self.input(vertex, OP, index)? {
                Converted::Container(ctr) => Snapshot {
                    dir: rootfs(ctr),
                    ctr: Some(ctr.clone()),
                },
                Converted::Directory(dir) => Snapshot {
                    dir: dir.clone(),
                    ctr: None,
                },
            });
        }

        let mut actions: Vec<Option<Snapshot>> = vec![None; file.actions.len()];
        let mut outputs: HashMap<i64, Snapshot> = HashMap::new();

        for (i, action) in file.actions.iter().enumerate() {
            let base = resolve_action_input(vertex, action.input, &inputs, &actions)?;
            let next = self.apply_file_action(vertex, base, action, &inputs, &actions)?;

            if action.output != SKIP_OUTPUT {
                outputs.insert(action.output, next.clone());
            }
            actions[i] = Some(next);
        }

        let output = outputs.remove(&vertex.output_index()).ok_or_else(|| {
            unsupported(
                vertex,
                OP,
                format!("no output for index {}", vertex.output_index()),
            )
        })?;

        Ok(match output.ctr {
            Some(ctr) if is_rootfs_of(&output.dir, &ctr) => Converted::Container(ctr),
            Some(ctr) => Converted::Container(with_rootfs(&ctr, output.dir)),
            None => Converted::Directory(output.dir),
        })
    }

    fn apply_file_action(
        &self,
        vertex: &Vertex,
        base: Snapshot,
        action: &FileAction,
        inputs: &[Snapshot],
        actions: &[Option<Snapshot>],
    ) -> Result<Snapshot, UnsupportedOpError> {
        match &action.action {
            Some(Action::Mkdir(mkdir)) => Ok(Snapshot {
                dir: apply_mkdir(vertex, &base.dir, mkdir)?,
                ctr: base.ctr,
            }),
            Some(Action::Mkfile(mkfile)) => Ok(Snapshot {
                dir: apply_mkfile(vertex, &base.dir, mkfile)?,
                ctr: base.ctr,
            }),
            Some(Action::Rm(rm)) => Ok(Snapshot {
                dir: apply_rm(&base.dir, rm),
                ctr: base.ctr,
            }),
            Some(Action::Copy(copy)) => {
                let source =
                    resolve_action_input(vertex, action.secondary_input, inputs, actions)?;
                apply_copy(vertex, base, &source.dir, copy)
            }
            None => Err(unsupported(vertex, OP, "unsupported file action")),
        }
    }
}

/// Resolves an action input index. Indices below the number of op inputs
/// refer to those; the ones above refer to the outputs of earlier actions.
fn resolve_action_input(
    vertex: &Vertex,
    index: i64,
    inputs: &[Snapshot],
    actions: &[Option<Snapshot>],
) -> Result<Snapshot, UnsupportedOpError> {
    if index == EMPTY_INPUT {
        return Ok(Snapshot {
            dir: scratch_directory(),
            ctr: None,
        });
    }

    if let Some(input) = usize::try_from(index).ok().and_then(|i| inputs.get(i)) {
        return Ok(input.clone());
    }

    let action = usize::try_from(index - inputs.len() as i64)
        .ok()
        .and_then(|rel| actions.get(rel))
        .ok_or_else(|| {
            unsupported(
                vertex,
                OP,
                format!("action input index {} out of range", index),
            )
        })?;

    action.clone().ok_or_else(|| {
        unsupported(
            vertex,
            OP,
            format!("action input {} references unresolved action output", index),
        )
    })
}

/// Whether `dir` is plainly the root filesystem of `ctr`.
fn is_rootfs_of(dir: &ID, ctr: &ID) -> bool {
    dir.field() == "rootfs" && dir.receiver() == Some(ctr)
}

fn apply_mkdir(
    vertex: &Vertex,
    base: &ID,
    mkdir: &FileActionMkDir,
) -> Result<ID, UnsupportedOpError> {
    const OP: &str = "file.mkdir";

    if !mkdir.make_parents {
        return Err(unsupported(
            vertex,
            OP,
            "mkdir without makeParents is unsupported",
        ));
    }
    if mkdir.timestamp >= 0 {
        return Err(unsupported(
            vertex,
            OP,
            "mkdir timestamp override is unsupported",
        ));
    }

    let path = clean_path(&mkdir.path);
    let dir = base.append(
        Type::directory(),
        "withNewDirectory",
        vec![
            Argument::new("path", path.as_str()),
            Argument::new("permissions", Literal::Int(i64::from(mkdir.mode))),
        ],
    );

    with_numeric_owner(vertex, OP, dir, &path, mkdir.owner.as_ref())
}

fn apply_mkfile(
    vertex: &Vertex,
    base: &ID,
    mkfile: &FileActionMkFile,
) -> Result<ID, UnsupportedOpError> {
    const OP: &str = "file.mkfile";

    if mkfile.timestamp >= 0 {
        return Err(unsupported(
            vertex,
            OP,
            "mkfile timestamp override is unsupported",
        ));
    }
    let contents = std::str::from_utf8(&mkfile.data)
        .map_err(|_| unsupported(vertex, OP, "mkfile binary data is unsupported"))?;

    let path = clean_path(&mkfile.path);
    let dir = base.append(
        Type::directory(),
        "withNewFile",
        vec![
            Argument::new("path", path.as_str()),
            Argument::new("contents", contents),
            Argument::new("permissions", Literal::Int(i64::from(mkfile.mode))),
        ],
    );

    with_numeric_owner(vertex, OP, dir, &path, mkfile.owner.as_ref())
}

fn apply_rm(base: &ID, rm: &FileActionRm) -> ID {
    base.append(
        Type::directory(),
        "withoutFile",
        vec![Argument::new("path", clean_path(&rm.path))],
    )
}

/// Appends a `chown` for `path` if an owner is set. Only numeric owners can
/// be applied to a bare directory.
fn with_numeric_owner(
    vertex: &Vertex,
    op_type: &str,
    dir: ID,
    path: &str,
    owner: Option<&ChownOpt>,
) -> Result<ID, UnsupportedOpError> {
    let owner = chown_owner_string(owner).map_err(|reason| unsupported(vertex, op_type, reason))?;
    if owner.is_empty() {
        return Ok(dir);
    }

    if owner_requires_container_resolution(&owner) {
        let action = op_type.trim_start_matches("file.");
        return Err(unsupported(
            vertex,
            op_type,
            format!("named user/group chown is unsupported for {}", action),
        ));
    }

    Ok(dir.append(
        Type::directory(),
        "chown",
        vec![Argument::new("path", path), Argument::new("owner", owner)],
    ))
}

fn apply_copy(
    vertex: &Vertex,
    base: Snapshot,
    source: &ID,
    copy: &FileActionCopy,
) -> Result<Snapshot, UnsupportedOpError> {
    const OP: &str = "file.copy";

    if copy.attempt_unpack_docker_compatibility {
        return Err(unsupported(vertex, OP, "archive auto-unpack is unsupported"));
    }
    if copy.always_replace_existing_dest_paths {
        return Err(unsupported(
            vertex,
            OP,
            "alwaysReplaceExistingDestPaths is unsupported",
        ));
    }
    if copy.timestamp >= 0 {
        return Err(unsupported(
            vertex,
            OP,
            "copy timestamp override is unsupported",
        ));
    }

    let (subdir, include) = derive_copy_selection(copy);
    let source = if subdir == "/" {
        source.clone()
    } else {
        source.append(
            Type::directory(),
            "directory",
            vec![Argument::new("path", subdir)],
        )
    };

    let owner =
        chown_owner_string(copy.owner.as_ref()).map_err(|reason| unsupported(vertex, OP, reason))?;
    let dest = clean_path(&copy.dest);
    let file_path = explicit_file_copy_path(copy, &include);

    // the copied thing, as the first two arguments
    let (field, mut args) = match &file_path {
        Some(file_path) => (
            "withFile",
            vec![
                Argument::new("path", dest.as_str()),
                Argument::new(
                    "source",
                    source.append(
                        Type::file(),
                        "file",
                        vec![Argument::new("path", file_path.as_str())],
                    ),
                ),
            ],
        ),
        None => (
            "withDirectory",
            vec![
                Argument::new("path", dest.as_str()),
                Argument::new("source", source),
            ],
        ),
    };
    let include_exclude = |args: &mut Vec<Argument>| {
        if file_path.is_some() {
            return;
        }
        if !include.is_empty() {
            args.push(Argument::new("include", Literal::strings(&include)));
        }
        if !copy.exclude_patterns.is_empty() {
            args.push(Argument::new(
                "exclude",
                Literal::strings(&copy.exclude_patterns),
            ));
        }
    };
    let permissions = (copy.mode >= 0)
        .then(|| Argument::new("permissions", Literal::Int(i64::from(copy.mode))));
    let no_create = (!copy.create_dest_path).then(|| Argument::new("doNotCreateDestPath", true));

    if owner_requires_container_resolution(&owner) {
        let Some(ctr) = base.ctr else {
            return Err(unsupported(
                vertex,
                OP,
                "named user/group chown requires container context",
            ));
        };

        // resolve the owner against the current state of the filesystem
        let working = with_rootfs(&ctr, base.dir);
        args.push(Argument::new("owner", owner));
        args.extend(no_create);
        include_exclude(&mut args);
        args.extend(permissions);

        let next = working.append(Type::container(), field, args);
        return Ok(Snapshot {
            dir: rootfs(&next),
            ctr: Some(next),
        });
    }

    args.extend(no_create);
    include_exclude(&mut args);
    if !owner.is_empty() {
        args.push(Argument::new("owner", owner));
    }
    args.extend(permissions);

    Ok(Snapshot {
        dir: base.dir.append(Type::directory(), field, args),
        ctr: base.ctr,
    })
}

/// Splits the copy source into the directory to copy from and the include
/// patterns selecting from it.
fn derive_copy_selection(copy: &FileActionCopy) -> (String, Vec<String>) {
    let src = clean_path(&copy.src);
    let mut include = copy.include_patterns.clone();

    let subdir = if copy.dir_copy_contents && !copy.allow_wildcard {
        src
    } else if src == "/" {
        src
    } else {
        let (parent, base) = split_parent(&src);
        include.insert(0, base.to_string());
        parent.to_string()
    };

    (subdir, include)
}

/// Returns the path of the single file a copy selects, if it selects
/// exactly one file by name.
fn explicit_file_copy_path(copy: &FileActionCopy, include: &[String]) -> Option<String> {
    if copy.dest.ends_with('/') || copy.dest.ends_with("/.") {
        return None;
    }
    if !copy.include_patterns.is_empty() || !copy.exclude_patterns.is_empty() {
        return None;
    }

    let [entry] = include else {
        return None;
    };
    let cleaned = lexical_clean(entry);
    if cleaned == "." || cleaned == "/" || cleaned.starts_with("../") || has_wildcard(&cleaned) {
        return None;
    }

    let src = clean_path(&copy.src);
    let (_, src_base) = split_parent(&src);
    if src_base == "/" || has_wildcard(src_base) {
        return None;
    }

    Some(cleaned.trim_start_matches('/').to_string())
}

/// Cleans a path lexically, keeping it relative if it is.
fn lexical_clean(p: &str) -> String {
    if p.starts_with('/') {
        return clean_path(p);
    }

    let mut parts: Vec<&str> = Vec::new();
    for component in p.split('/') {
        match component {
            "" | "." => {}
            ".." if parts.last().is_some_and(|last| *last != "..") => {
                parts.pop();
            }
            c => parts.push(c),
        }
    }

    if parts.is_empty() {
        return ".".to_string();
    }
    parts.join("/")
}

/// Renders a chown option as `user[:group]`. A group without a user (as in
/// `--chown=:group`) applies to root.
fn chown_owner_string(chown: Option<&ChownOpt>) -> Result<String, String> {
    let Some(chown) = chown else {
        return Ok(String::new());
    };

    let user = if is_empty_named_user(chown.user.as_ref()) && chown.group.is_some() {
        String::new()
    } else {
        user_opt_string(chown.user.as_ref())?
    };
    let group = user_opt_string(chown.group.as_ref())?;

    Ok(match (user.is_empty(), group.is_empty()) {
        (true, true) => String::new(),
        (true, false) => format!("0:{}", group),
        (false, true) => user,
        (false, false) => format!("{}:{}", user, group),
    })
}

fn is_empty_named_user(user: Option<&UserOpt>) -> bool {
    matches!(
        user.and_then(|u| u.user.as_ref()),
        Some(user_opt::User::ByName(named)) if named.name.trim().is_empty()
    )
}

fn user_opt_string(user: Option<&UserOpt>) -> Result<String, String> {
    let Some(user) = user else {
        return Ok(String::new());
    };

    match &user.user {
        Some(user_opt::User::ById(id)) => Ok(id.to_string()),
        Some(user_opt::User::ByName(named)) if named.name.trim().is_empty() => {
            Err("empty named user is unsupported".into())
        }
        Some(user_opt::User::ByName(named)) => Ok(named.name.trim().to_string()),
        None => Err("unknown user option type".into()),
    }
}

/// Whether one of the owner components is a name rather than a number.
fn owner_requires_container_resolution(owner: &str) -> bool {
    let is_name = |component: &str| !component.is_empty() && component.parse::<u32>().is_err();

    match owner.split_once(':') {
        Some((user, group)) => is_name(user) || is_name(group),
        None => is_name(owner),
    }
}
