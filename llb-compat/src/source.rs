//! Source op identifiers and attribute keys.

pub const DOCKER_IMAGE_SCHEME: &str = "docker-image://";
pub const GIT_SCHEME: &str = "git://";
pub const LOCAL_SCHEME: &str = "local://";
pub const HTTP_SCHEME: &str = "http://";
pub const HTTPS_SCHEME: &str = "https://";
pub const OCI_LAYOUT_SCHEME: &str = "oci-layout://";
pub const BLOB_SCHEME: &str = "blob://";

pub const ATTR_IMAGE_RECORD_TYPE: &str = "image.recordtype";
pub const ATTR_IMAGE_RESOLVE_MODE: &str = "image.resolvemode";
pub const ATTR_IMAGE_LAYER_LIMIT: &str = "image.layerlimit";

pub const ATTR_KEEP_GIT_DIR: &str = "git.keepgitdir";
pub const ATTR_FULL_REMOTE_URL: &str = "git.fullurl";
pub const ATTR_AUTH_HEADER_SECRET: &str = "git.authheadersecret";
pub const ATTR_AUTH_TOKEN_SECRET: &str = "git.authtokensecret";
pub const ATTR_KNOWN_SSH_HOSTS: &str = "git.knownsshhosts";
pub const ATTR_MOUNT_SSH_SOCK: &str = "git.mountsshsock";

pub const DEFAULT_AUTH_TOKEN_SECRET: &str = "GIT_AUTH_TOKEN";
pub const DEFAULT_AUTH_HEADER_SECRET: &str = "GIT_AUTH_HEADER";
pub const DEFAULT_SSH_SOCK: &str = "default";

pub const ATTR_LOCAL_SESSION_ID: &str = "local.session";
pub const ATTR_LOCAL_UNIQUE_ID: &str = "local.unique";
pub const ATTR_INCLUDE_PATTERNS: &str = "local.includepattern";
pub const ATTR_EXCLUDE_PATTERNS: &str = "local.excludepatterns";
pub const ATTR_FOLLOW_PATHS: &str = "local.followpaths";
pub const ATTR_SHARED_KEY_HINT: &str = "local.sharedkeyhint";
pub const ATTR_LOCAL_DIFFER: &str = "local.differ";

pub const LOCAL_DIFFER_NONE: &str = "none";
pub const LOCAL_DIFFER_METADATA: &str = "metadata";

pub const ATTR_HTTP_CHECKSUM: &str = "http.checksum";
pub const ATTR_HTTP_FILENAME: &str = "http.filename";
pub const ATTR_HTTP_PERM: &str = "http.perm";
pub const ATTR_HTTP_UID: &str = "http.uid";
pub const ATTR_HTTP_GID: &str = "http.gid";

/// The kind of a source op, derived from the scheme of its identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceKind {
    DockerImage,
    Git,
    Local,
    Http,
    OciLayout,
    Blob,
    Unknown,
}

impl SourceKind {
    pub fn of(identifier: &str) -> Self {
        if identifier.starts_with(DOCKER_IMAGE_SCHEME) {
            SourceKind::DockerImage
        } else if identifier.starts_with(GIT_SCHEME) {
            SourceKind::Git
        } else if identifier.starts_with(LOCAL_SCHEME) {
            SourceKind::Local
        } else if identifier.starts_with(HTTP_SCHEME) || identifier.starts_with(HTTPS_SCHEME) {
            SourceKind::Http
        } else if identifier.starts_with(OCI_LAYOUT_SCHEME) {
            SourceKind::OciLayout
        } else if identifier.starts_with(BLOB_SCHEME) {
            SourceKind::Blob
        } else {
            SourceKind::Unknown
        }
    }

    /// Short label used in error messages, like `source(git)`.
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::DockerImage => "source(image)",
            SourceKind::Git => "source(git)",
            SourceKind::Local => "source(local)",
            SourceKind::Http => "source(http)",
            SourceKind::OciLayout => "source(oci-layout)",
            SourceKind::Blob => "source(blob)",
            SourceKind::Unknown => "source",
        }
    }
}

/// Returns the identifier without its `scheme://` prefix.
/// HTTP identifiers keep their scheme, as it is part of the URL.
pub fn strip_scheme(identifier: &str) -> &str {
    match SourceKind::of(identifier) {
        SourceKind::Http => identifier,
        _ => identifier
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(identifier),
    }
}

#[cfg(test)]
mod tests {
    use super::{strip_scheme, SourceKind};
    use rstest::rstest;

    #[rstest]
    #[case::image("docker-image://docker.io/library/alpine:latest", SourceKind::DockerImage)]
    #[case::git("git://github.com/dagger/dagger#main", SourceKind::Git)]
    #[case::local("local://context", SourceKind::Local)]
    #[case::http("http://example.com/a.txt", SourceKind::Http)]
    #[case::https("https://example.com/a.txt", SourceKind::Http)]
    #[case::oci("oci-layout://store/ref", SourceKind::OciLayout)]
    #[case::blob("blob://sha256:abcd", SourceKind::Blob)]
    #[case::unknown("s3://bucket/key", SourceKind::Unknown)]
    fn classify(#[case] identifier: &str, #[case] expected: SourceKind) {
        assert_eq!(expected, SourceKind::of(identifier));
    }

    #[rstest]
    #[case("docker-image://docker.io/library/alpine:latest", "docker.io/library/alpine:latest")]
    #[case("local://context", "context")]
    #[case("https://example.com/a.txt", "https://example.com/a.txt")]
    fn strip(#[case] identifier: &str, #[case] expected: &str) {
        assert_eq!(expected, strip_scheme(identifier));
    }
}
