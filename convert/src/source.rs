use std::collections::BTreeMap;

use callid::{Argument, Literal, Type, ID};
use llb_compat::{proto::SourceOp, source::*, SourceKind, Vertex};
use tracing::trace;
use url::Url;

use crate::convert::{platform_container, scratch_directory, unsupported, Converter};
use crate::{Converted, UnsupportedOpError};

/// Default name of files fetched from URLs without a path.
const DEFAULT_HTTP_FILENAME: &str = "index";

impl Converter<'_> {
    pub(crate) fn convert_source(
        &self,
        vertex: &Vertex,
        kind: SourceKind,
        source: &SourceOp,
    ) -> Result<Converted, UnsupportedOpError> {
        let op_type = kind.label();
        let fail = |reason: String| unsupported(vertex, op_type, reason);

        trace!(identifier = %source.identifier, "converting source");

        match kind {
            SourceKind::DockerImage => {
                let address = image_source(source).map_err(fail)?;
                Ok(Converted::Container(platform_container(vertex, op_type)?.append(
                    Type::container(),
                    "from",
                    vec![Argument::new("address", address)],
                )))
            }
            SourceKind::Git => git_source(source).map(Converted::Directory).map_err(fail),
            SourceKind::Local => local_source(source).map(Converted::Directory).map_err(fail),
            SourceKind::Http => http_source(source).map(Converted::Directory).map_err(fail),
            SourceKind::OciLayout => Err(fail("oci-layout sources are unsupported".into())),
            SourceKind::Blob => Err(fail("blob:// source is explicitly unsupported".into())),
            SourceKind::Unknown => Err(fail(format!(
                "unsupported source scheme in {:?}",
                source.identifier
            ))),
        }
    }
}

/// Checks all attributes against the keys a source kind understands.
/// `check` returns an error for supported keys with unsupported values.
fn check_attrs(
    attrs: &BTreeMap<String, String>,
    allowed: &[&str],
    mut check: impl FnMut(&str, &str) -> Result<(), String>,
) -> Result<(), String> {
    for (key, value) in attrs {
        if !allowed.contains(&key.as_str()) {
            return Err(format!("unsupported attribute {:?}", key));
        }
        check(key, value)?;
    }
    Ok(())
}

/// Returns the image reference to pull.
fn image_source(source: &SourceOp) -> Result<String, String> {
    check_attrs(
        &source.attrs,
        &[ATTR_IMAGE_RECORD_TYPE, ATTR_IMAGE_RESOLVE_MODE],
        |key, value| match key {
            ATTR_IMAGE_RESOLVE_MODE if !matches!(value, "" | "default" | "pull") => {
                Err(format!("unsupported image resolve mode {:?}", value))
            }
            _ => Ok(()),
        },
    )?;

    let address = strip_scheme(&source.identifier);
    if address.is_empty() {
        return Err("image reference is empty".into());
    }
    Ok(address.to_string())
}

fn git_source(source: &SourceOp) -> Result<ID, String> {
    check_attrs(
        &source.attrs,
        &[
            ATTR_KEEP_GIT_DIR,
            ATTR_FULL_REMOTE_URL,
            ATTR_AUTH_TOKEN_SECRET,
            ATTR_AUTH_HEADER_SECRET,
            ATTR_KNOWN_SSH_HOSTS,
            ATTR_MOUNT_SSH_SOCK,
        ],
        |key, value| match key {
            ATTR_AUTH_TOKEN_SECRET if value != DEFAULT_AUTH_TOKEN_SECRET => {
                Err(format!("custom git auth token secret {:?} is unsupported", value))
            }
            ATTR_AUTH_HEADER_SECRET if value != DEFAULT_AUTH_HEADER_SECRET => {
                Err(format!("custom git auth header secret {:?} is unsupported", value))
            }
            ATTR_KNOWN_SSH_HOSTS if !value.is_empty() => {
                Err("git known ssh hosts are unsupported".into())
            }
            ATTR_MOUNT_SSH_SOCK if !value.is_empty() && value != DEFAULT_SSH_SOCK => {
                Err(format!("git ssh socket {:?} is unsupported", value))
            }
            _ => Ok(()),
        },
    )?;

    let (remote, git_ref) = match strip_scheme(&source.identifier).split_once('#') {
        Some((remote, git_ref)) => (remote, git_ref),
        None => (strip_scheme(&source.identifier), ""),
    };
    let url = match source.attrs.get(ATTR_FULL_REMOTE_URL) {
        Some(full) if !full.is_empty() => full.as_str(),
        _ => remote,
    };
    if url.is_empty() {
        return Err("git remote is empty".into());
    }
    let keep_git_dir = source.attrs.get(ATTR_KEEP_GIT_DIR).map(String::as_str) == Some("true");

    let mut repo_args = vec![Argument::new("url", url)];
    if keep_git_dir {
        repo_args.push(Argument::new("keepGitDir", true));
    }
    let repo = ID::new(Type::git_repository(), "git", repo_args);

    let git_ref = if git_ref.is_empty() {
        repo.append(Type::git_ref(), "head", vec![])
    } else {
        repo.append(
            Type::git_ref(),
            "ref",
            vec![Argument::new("name", git_ref)],
        )
    };

    let mut tree_args = Vec::new();
    if !keep_git_dir {
        tree_args.push(Argument::new("discardGitDir", true));
    }
    tree_args.push(Argument::new("depth", Literal::Int(1)));

    Ok(git_ref.append(Type::directory(), "tree", tree_args))
}

fn local_source(source: &SourceOp) -> Result<ID, String> {
    check_attrs(
        &source.attrs,
        &[
            ATTR_LOCAL_SESSION_ID,
            ATTR_LOCAL_UNIQUE_ID,
            ATTR_INCLUDE_PATTERNS,
            ATTR_EXCLUDE_PATTERNS,
            ATTR_FOLLOW_PATHS,
            ATTR_SHARED_KEY_HINT,
            ATTR_LOCAL_DIFFER,
        ],
        |key, value| match key {
            ATTR_FOLLOW_PATHS => Err("local follow paths are unsupported".into()),
            ATTR_LOCAL_DIFFER if !matches!(value, "" | LOCAL_DIFFER_METADATA) => {
                Err(format!("unsupported local differ {:?}", value))
            }
            _ => Ok(()),
        },
    )?;

    let path = match source.attrs.get(ATTR_SHARED_KEY_HINT) {
        Some(hint) if !hint.is_empty() => hint.as_str(),
        _ => strip_scheme(&source.identifier),
    };
    if path.is_empty() {
        return Err("local source path is empty".into());
    }

    let mut args = vec![Argument::new("path", path)];
    for (attr, name) in [
        (ATTR_INCLUDE_PATTERNS, "include"),
        (ATTR_EXCLUDE_PATTERNS, "exclude"),
    ] {
        let Some(raw) = source.attrs.get(attr).filter(|raw| !raw.is_empty()) else {
            continue;
        };
        let patterns: Vec<String> = serde_json::from_str(raw)
            .map_err(|e| format!("invalid {} value {:?}: {}", attr, raw, e))?;
        if !patterns.is_empty() {
            args.push(Argument::new(name, Literal::strings(patterns)));
        }
    }

    Ok(ID::new(Type::host(), "host", vec![]).append(Type::directory(), "directory", args))
}

fn http_source(source: &SourceOp) -> Result<ID, String> {
    check_attrs(
        &source.attrs,
        &[
            ATTR_HTTP_CHECKSUM,
            ATTR_HTTP_FILENAME,
            ATTR_HTTP_PERM,
            ATTR_HTTP_UID,
            ATTR_HTTP_GID,
        ],
        |key, _| match key {
            ATTR_HTTP_CHECKSUM => Err("http checksum verification is unsupported".into()),
            ATTR_HTTP_UID | ATTR_HTTP_GID => Err("http uid/gid override is unsupported".into()),
            _ => Ok(()),
        },
    )?;

    let url = source.identifier.as_str();
    let filename = match source.attrs.get(ATTR_HTTP_FILENAME) {
        Some(filename) if !filename.is_empty() => filename.clone(),
        _ => default_http_filename(url)?,
    };

    let mut args = vec![
        Argument::new("url", url),
        Argument::new("name", filename.as_str()),
    ];
    if let Some(perm) = source.attrs.get(ATTR_HTTP_PERM).filter(|p| !p.is_empty()) {
        let mode = i64::from_str_radix(perm, 8)
            .map_err(|_| format!("invalid http permissions {:?}", perm))?;
        args.push(Argument::new("permissions", Literal::Int(mode)));
    }
    let file = ID::new(Type::file(), "http", args);

    Ok(scratch_directory().append(
        Type::directory(),
        "withFile",
        vec![
            Argument::new("path", filename),
            Argument::new("source", file),
        ],
    ))
}

/// The last path segment of the URL, or [DEFAULT_HTTP_FILENAME].
fn default_http_filename(url: &str) -> Result<String, String> {
    let url = Url::parse(url).map_err(|e| format!("invalid url {:?}: {}", url, e))?;

    Ok(url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .unwrap_or(DEFAULT_HTTP_FILENAME)
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::default_http_filename;
    use rstest::rstest;

    #[rstest]
    #[case("https://example.com/archive.tgz", "archive.tgz")]
    #[case("https://example.com/a/b/pkg.tar.gz?x=1", "pkg.tar.gz")]
    #[case("https://example.com/", "index")]
    #[case("https://example.com", "index")]
    #[case("https://example.com/dir/", "index")]
    fn http_filename(#[case] url: &str, #[case] expected: &str) {
        assert_eq!(Ok(expected.to_string()), default_http_filename(url));
    }

    #[test]
    fn http_filename_invalid() {
        assert!(default_http_filename("not a url").is_err());
    }
}
