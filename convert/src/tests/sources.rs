use expect_test::expect;
use llb_compat::{
    proto::Input,
    source::{ATTR_IMAGE_LAYER_LIMIT, ATTR_LOCAL_DIFFER, LOCAL_DIFFER_NONE},
};
use pretty_assertions::assert_eq;
use rstest::rstest;

use super::*;

fn convert_source(identifier: &str, attrs: &[(&str, &str)]) -> Result<ID, UnsupportedOpError> {
    let def = definition(|b| Some(Input::new(&b.add(&source(identifier, attrs)), 0)));
    convert_with(&def, None, &Default::default())
}

#[test]
fn git() {
    let id = convert_source(
        "git://github.com/dagger/dagger#main",
        &[("git.fullurl", "https://github.com/dagger/dagger")],
    )
    .unwrap();

    expect![[r#"git(url: "https://github.com/dagger/dagger").ref(name: "main").tree(discardGitDir: true, depth: 1)"#]]
        .assert_eq(&rootfs_arg(&id).to_string());
}

#[test]
fn git_head_keep_dir() {
    let id = convert_source(
        "git://github.com/dagger/dagger",
        &[
            ("git.keepgitdir", "true"),
            ("git.authtokensecret", "GIT_AUTH_TOKEN"),
            ("git.authheadersecret", "GIT_AUTH_HEADER"),
            ("git.mountsshsock", "default"),
        ],
    )
    .unwrap();

    expect![[r#"git(url: "github.com/dagger/dagger", keepGitDir: true).head.tree(depth: 1)"#]]
        .assert_eq(&rootfs_arg(&id).to_string());
}

#[test]
fn local() {
    let id = convert_source(
        "local://context",
        &[
            ("local.sharedkeyhint", "/workspace"),
            ("local.includepattern", r#"["src/**","go.mod"]"#),
            ("local.excludepatterns", r#"["*.tmp"]"#),
            ("local.unique", "abc"),
            ("local.session", "xyz"),
            ("local.differ", "metadata"),
        ],
    )
    .unwrap();

    expect![[r#"host.directory(path: "/workspace", include: ["src/**", "go.mod"], exclude: ["*.tmp"])"#]]
        .assert_eq(&rootfs_arg(&id).to_string());
}

#[test]
fn http() {
    let id = convert_source(
        "https://example.com/archive.tgz",
        &[("http.filename", "payload.tgz"), ("http.perm", "640")],
    )
    .unwrap();

    expect![[r#"directory.withFile(path: "payload.tgz", source: http(url: "https://example.com/archive.tgz", name: "payload.tgz", permissions: 416))"#]]
        .assert_eq(&rootfs_arg(&id).to_string());
}

#[test]
fn http_default_name() {
    let id = convert_source("https://example.com/pkg.tar.gz", &[]).unwrap();

    let file = id_arg(&rootfs_arg(&id), "source");
    assert_eq!("http", file.field());
    assert_eq!(Some("pkg.tar.gz"), str_arg(&file, "name"));
    assert!(file.arg("permissions").is_none());
}

#[test]
fn image_attrs() {
    let id = convert_source(
        "docker-image://docker.io/library/alpine:latest",
        &[("image.recordtype", "internal"), ("image.resolvemode", "pull")],
    )
    .unwrap();

    assert_eq!(vec!["container", "from"], id.fields());
}

#[rstest]
#[case::git_token("git://github.com/a/b", &[("git.authtokensecret", "MY_TOKEN")], "source(git)", "auth token secret")]
#[case::git_header("git://github.com/a/b", &[("git.authheadersecret", "MY_HEADER")], "source(git)", "auth header secret")]
#[case::git_hosts("git://github.com/a/b", &[("git.knownsshhosts", "github.com ssh-ed25519 AAAA")], "source(git)", "known ssh hosts")]
#[case::git_sock("git://github.com/a/b", &[("git.mountsshsock", "agent")], "source(git)", "ssh socket")]
#[case::git_attr("git://github.com/a/b", &[("git.subdir", "x")], "source(git)", "unsupported attribute")]
#[case::local_follow("local://ctx", &[("local.followpaths", "[\"a\"]")], "source(local)", "follow paths")]
#[case::local_json("local://ctx", &[("local.includepattern", "a,b")], "source(local)", "invalid local.includepattern")]
#[case::local_differ("local://ctx", &[(ATTR_LOCAL_DIFFER, LOCAL_DIFFER_NONE)], "source(local)", "differ")]
#[case::local_empty("local://", &[], "source(local)", "path is empty")]
#[case::http_checksum("https://example.com/a", &[("http.checksum", "sha256:abcd")], "source(http)", "checksum")]
#[case::http_uid("https://example.com/a", &[("http.uid", "1000")], "source(http)", "uid/gid")]
#[case::http_perm("https://example.com/a", &[("http.perm", "rwx")], "source(http)", "invalid http permissions")]
#[case::image_layer_limit("docker-image://alpine", &[(ATTR_IMAGE_LAYER_LIMIT, "1")], "source(image)", "unsupported attribute")]
fn rejected(
    #[case] identifier: &str,
    #[case] attrs: &[(&str, &str)],
    #[case] op_type: &str,
    #[case] reason: &str,
) {
    let err = convert_source(identifier, attrs).unwrap_err();
    assert_eq!(op_type, err.op_type);
    assert!(err.reason.contains(reason), "{}", err);
}
