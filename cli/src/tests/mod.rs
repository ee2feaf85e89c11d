use std::collections::BTreeMap;

use clap::Parser;
use expect_test::expect;
use llb_compat::{
    proto::{op, Input, Op, SourceOp},
    DefinitionBuilder,
};
use prost::Message;
use rstest::rstest;

use super::*;

fn args(extra: &[&str]) -> Args {
    let mut argv = vec!["llb2id"];
    argv.extend_from_slice(extra);
    argv.push("-");
    Args::try_parse_from(argv).expect("must parse")
}

fn alpine_definition() -> Vec<u8> {
    let mut b = DefinitionBuilder::new();
    let alpine = b.add(&Op {
        op: Some(op::Op::Source(SourceOp {
            identifier: "docker-image://docker.io/library/alpine:latest".into(),
            attrs: BTreeMap::new(),
        })),
        ..Default::default()
    });
    b.finish(Some(Input::new(&alpine, 0))).encode_to_vec()
}

#[test]
fn display() {
    let out = convert_bytes(&args(&["--output", "display"]), &alpine_definition(), None)
        .expect("must convert");

    expect![[r#"container.from(address: "docker.io/library/alpine:latest")"#]].assert_eq(&out);
}

#[test]
fn encoded_roundtrip() {
    let out = convert_bytes(&args(&[]), &alpine_definition(), None).expect("must convert");

    let id = callid::ID::decode(&out).expect("must decode");
    assert_eq!(vec!["container", "from"], id.fields());

    let digest = convert_bytes(&args(&["--output", "digest"]), &alpine_definition(), None)
        .expect("must convert");
    assert_eq!(id.digest().to_string(), digest);
}

#[test]
fn empty_definition() {
    let out = convert_bytes(&args(&["--output", "display"]), &[], None).expect("must convert");
    expect![[r#"container"#]].assert_eq(&out);
}

#[rstest]
#[case::bare(r#"{"User": "nobody", "OS": "linux"}"#)]
#[case::document(r#"{"os": "linux", "architecture": "amd64", "config": {"User": "nobody"}}"#)]
fn image_config(#[case] json: &str) {
    let config = parse_image_config(json.as_bytes()).expect("must parse");
    assert_eq!("nobody", config.user);
    assert_eq!("linux", config.os);

    let out = convert_bytes(
        &args(&["--output", "display"]),
        &alpine_definition(),
        Some(json.as_bytes()),
    )
    .expect("must convert");
    assert!(out.contains(r#".withUser(name: "nobody")"#), "{}", out);
}

#[test]
fn garbage_definition() {
    let err = convert_bytes(&args(&[]), b"\xff\xff\xff", None).unwrap_err();
    assert!(
        err.to_string().contains("unable to decode LLB definition"),
        "{:#}",
        err
    );
}

#[test]
fn unsupported_op() {
    let mut b = DefinitionBuilder::new();
    let blob = b.add(&Op {
        op: Some(op::Op::Source(SourceOp {
            identifier: "blob://sha256:abcd".into(),
            attrs: BTreeMap::new(),
        })),
        ..Default::default()
    });
    let definition = b.finish(Some(Input::new(&blob, 0))).encode_to_vec();

    let err = convert_bytes(&args(&[]), &definition, None).unwrap_err();
    let err = err
        .downcast_ref::<llb_convert::UnsupportedOpError>()
        .expect("must be an unsupported op");
    assert_eq!("source(blob)", err.op_type);
}
