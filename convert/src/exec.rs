use callid::{Argument, Literal, Type, ID};
use itertools::Itertools;
use llb_compat::{
    proto::{
        CacheSharingOpt, ExecOp, Meta, Mount, MountContentCache, MountType, NetMode, SecurityMode,
        EMPTY_INPUT,
    },
    Vertex,
};

use crate::convert::{platform_container, scratch_directory, unsupported, with_rootfs, Converter};
use crate::paths::clean_path;
use crate::{Converted, UnsupportedOpError};

const OP: &str = "exec";

/// Mount destination of the root filesystem.
const ROOT_MOUNT: &str = "/";

impl Converter<'_> {
    /// Converts an exec op into `withExec` on a container, followed by the
    /// selection of the requested output mount.
    pub(crate) fn convert_exec(
        &self,
        vertex: &Vertex,
        exec: &ExecOp,
    ) -> Result<Converted, UnsupportedOpError> {
        let meta = exec
            .meta
            .as_ref()
            .ok_or_else(|| unsupported(vertex, OP, "missing exec meta"))?;
        validate_exec(exec, meta).map_err(|reason| unsupported(vertex, OP, reason))?;

        let root = root_mount(&exec.mounts).map_err(|reason| unsupported(vertex, OP, reason))?;
        if root.readonly {
            return Err(unsupported(
                vertex,
                OP,
                "readonly bind mount as root filesystem is unsupported",
            ));
        }

        let mut ctr = match (root.input, clean_path(&root.selector).as_str()) {
            (input, ROOT_MOUNT) if input != EMPTY_INPUT => match self.input(vertex, OP, input)? {
                Converted::Container(ctr) => ctr.clone(),
                Converted::Directory(dir) => {
                    with_rootfs(&platform_container(vertex, OP)?, dir.clone())
                }
            },
            _ => with_rootfs(
                &platform_container(vertex, OP)?,
                self.mount_source(vertex, root)?,
            ),
        };

        let mut secret_env_names: Vec<&str> = Vec::new();
        for secret_env in &exec.secretenv {
            let Some(secret) =
                self.resolve_secret(vertex, OP, &secret_env.id, secret_env.optional)?
            else {
                continue;
            };
            ctr = ctr.append(
                Type::container(),
                "withSecretVariable",
                vec![
                    Argument::new("name", secret_env.name.as_str()),
                    Argument::new("secret", secret),
                ],
            );
            secret_env_names.push(&secret_env.name);
        }

        let mut mount_paths: Vec<String> = Vec::new();
        for mount in exec.mounts.iter().filter(|m| !std::ptr::eq(*m, root)) {
            if let Some(next) = self.attach_mount(vertex, &ctr, mount)? {
                ctr = next;
                mount_paths.push(clean_path(&mount.dest));
            }
        }

        for entry in &meta.env {
            let (name, value) = entry
                .split_once('=')
                .ok_or_else(|| unsupported(vertex, OP, format!("invalid env entry {:?}", entry)))?;
            ctr = ctr.append(
                Type::container(),
                "withEnvVariable",
                vec![Argument::new("name", name), Argument::new("value", value)],
            );
        }

        if !meta.user.is_empty() {
            ctr = ctr.append(
                Type::container(),
                "withUser",
                vec![Argument::new("name", meta.user.as_str())],
            );
        }
        if !meta.cwd.is_empty() {
            ctr = ctr.append(
                Type::container(),
                "withWorkdir",
                vec![Argument::new("path", meta.cwd.as_str())],
            );
        }

        let mut exec_args = vec![Argument::new("args", Literal::strings(&meta.args))];
        if self.options.no_init {
            exec_args.push(Argument::new("noInit", true));
        }
        let ctr = ctr.append(Type::container(), "withExec", exec_args);

        let output = exec
            .mounts
            .iter()
            .find(|m| m.output == vertex.output_index())
            .ok_or_else(|| {
                unsupported(
                    vertex,
                    OP,
                    format!("no mount for output index {}", vertex.output_index()),
                )
            })?;

        if !std::ptr::eq(output, root) {
            return Ok(Converted::Directory(ctr.append(
                Type::directory(),
                "directory",
                vec![Argument::new("path", output.dest.as_str())],
            )));
        }

        // the root output only carries the root filesystem, drop what was
        // attached for the duration of the exec
        let mut ctr = ctr;
        for path in mount_paths.iter().unique().filter(|p| *p != ROOT_MOUNT) {
            ctr = ctr.append(
                Type::container(),
                "withoutMount",
                vec![Argument::new("path", path.as_str())],
            );
        }
        for name in secret_env_names.into_iter().unique() {
            ctr = ctr.append(
                Type::container(),
                "withoutSecretVariable",
                vec![Argument::new("name", name)],
            );
        }

        Ok(Converted::Container(ctr))
    }

    /// Resolves the source directory of a mount, with its selector applied.
    fn mount_source(&self, vertex: &Vertex, mount: &Mount) -> Result<ID, UnsupportedOpError> {
        let dir = if mount.input == EMPTY_INPUT {
            scratch_directory()
        } else {
            self.input_directory(vertex, OP, mount.input)?
        };

        let selector = clean_path(&mount.selector);
        if selector == ROOT_MOUNT {
            return Ok(dir);
        }
        Ok(dir.append(
            Type::directory(),
            "directory",
            vec![Argument::new("path", selector)],
        ))
    }

    /// Attaches a non-root mount to the container.
    /// Returns [None] if the mount is skipped, which is the case for
    /// unmapped optional secrets.
    fn attach_mount(
        &self,
        vertex: &Vertex,
        ctr: &ID,
        mount: &Mount,
    ) -> Result<Option<ID>, UnsupportedOpError> {
        if !mount.result_id.is_empty() {
            return Err(unsupported(vertex, OP, "mount resultID is unsupported"));
        }
        if mount.content_cache != MountContentCache::Default as i32 {
            return Err(unsupported(
                vertex,
                OP,
                "non-default mount content cache is unsupported",
            ));
        }

        let mount_type = MountType::try_from(mount.mount_type).map_err(|_| {
            unsupported(
                vertex,
                OP,
                format!("unsupported mount type {}", mount.mount_type),
            )
        })?;
        let path = Argument::new("path", mount.dest.as_str());

        let next = match mount_type {
            MountType::Bind => {
                let mut args = vec![
                    path,
                    Argument::new("source", self.mount_source(vertex, mount)?),
                ];
                if mount.readonly {
                    args.push(Argument::new("readOnly", true));
                }
                ctr.append(Type::container(), "withMountedDirectory", args)
            }
            MountType::Cache => {
                let cache_opt = mount
                    .cache_opt
                    .as_ref()
                    .filter(|opt| !opt.id.is_empty())
                    .ok_or_else(|| unsupported(vertex, OP, "cache mount is missing cache ID"))?;
                let sharing = match CacheSharingOpt::try_from(cache_opt.sharing) {
                    Ok(CacheSharingOpt::Shared) => "SHARED",
                    Ok(CacheSharingOpt::Private) => "PRIVATE",
                    Ok(CacheSharingOpt::Locked) => "LOCKED",
                    Err(_) => {
                        return Err(unsupported(
                            vertex,
                            OP,
                            format!("unsupported cache sharing mode {}", cache_opt.sharing),
                        ))
                    }
                };

                let cache = ID::new(
                    Type::cache_volume(),
                    "cacheVolume",
                    vec![Argument::new("key", cache_opt.id.as_str())],
                );
                let mut args = vec![
                    path,
                    Argument::new("cache", cache),
                    Argument::new("sharing", Literal::enum_value(sharing)),
                ];
                if mount.input != EMPTY_INPUT {
                    args.push(Argument::new("source", self.mount_source(vertex, mount)?));
                }
                ctr.append(Type::container(), "withMountedCache", args)
            }
            MountType::Tmpfs => {
                let mut args = vec![path];
                if let Some(size) = mount.tmpfs_opt.as_ref().map(|t| t.size).filter(|s| *s > 0) {
                    args.push(Argument::new("size", Literal::Int(size)));
                }
                ctr.append(Type::container(), "withMountedTemp", args)
            }
            MountType::Secret => {
                let secret_opt = mount.secret_opt.as_ref().ok_or_else(|| {
                    unsupported(vertex, OP, "secret mount is missing secret options")
                })?;
                let Some(secret) =
                    self.resolve_secret(vertex, OP, &secret_opt.id, secret_opt.optional)?
                else {
                    return Ok(None);
                };
                ctr.append(
                    Type::container(),
                    "withMountedSecret",
                    vec![
                        path,
                        Argument::new("source", secret),
                        Argument::new("owner", format!("{}:{}", secret_opt.uid, secret_opt.gid)),
                        Argument::new("mode", Literal::Int(i64::from(secret_opt.mode))),
                    ],
                )
            }
            MountType::Ssh => return Err(unsupported(vertex, OP, "ssh mounts are unsupported")),
        };

        Ok(Some(next))
    }
}

/// Rejects exec settings that have no equivalent on a container.
fn validate_exec(exec: &ExecOp, meta: &Meta) -> Result<(), String> {
    match NetMode::try_from(exec.network) {
        Ok(NetMode::Unset) => {}
        Ok(mode) => return Err(format!("unsupported network mode {:?}", mode)),
        Err(_) => return Err(format!("unsupported network mode {}", exec.network)),
    }
    match SecurityMode::try_from(exec.security) {
        Ok(SecurityMode::Sandbox) => {}
        Ok(mode) => return Err(format!("unsupported security mode {:?}", mode)),
        Err(_) => return Err(format!("unsupported security mode {}", exec.security)),
    }

    if meta.args.is_empty() {
        return Err("exec without args is unsupported".into());
    }
    if meta.proxy_env.as_ref().is_some_and(|p| {
        !(p.http_proxy.is_empty()
            && p.https_proxy.is_empty()
            && p.ftp_proxy.is_empty()
            && p.no_proxy.is_empty()
            && p.all_proxy.is_empty())
    }) {
        return Err("proxy environment is unsupported".into());
    }
    if !meta.hostname.is_empty() {
        return Err("hostname override is unsupported".into());
    }
    if !meta.extra_hosts.is_empty() {
        return Err("extra hosts are unsupported".into());
    }
    if !meta.ulimit.is_empty() {
        return Err("ulimit is unsupported".into());
    }
    if !meta.cgroup_parent.is_empty() {
        return Err("cgroup parent is unsupported".into());
    }
    if !meta.valid_exit_codes.is_empty() {
        return Err("valid exit code overrides are unsupported".into());
    }

    Ok(())
}

/// Finds the bind mount at `/`, which must be unique.
fn root_mount(mounts: &[Mount]) -> Result<&Mount, String> {
    let mut roots = mounts
        .iter()
        .filter(|m| m.dest == ROOT_MOUNT && m.mount_type == MountType::Bind as i32);

    let root = roots.next().ok_or("root bind mount not found")?;
    if roots.next().is_some() {
        return Err("multiple root bind mounts".into());
    }
    Ok(root)
}
