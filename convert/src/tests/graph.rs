use callid::ID;
use llb_compat::{
    proto::{
        op, BuildOp, DiffOp, Input, LowerDiffInput, MergeInput, MergeOp, Op, Platform,
        UpperDiffInput,
    },
    DefinitionBuilder, Digest,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

use super::*;
use crate::{convert, ConvertOptions};

#[test]
fn scratch() {
    let id = convert(None, None, &ConvertOptions::default()).unwrap();
    assert_eq!(vec!["container"], id.fields());

    let id = convert_ok(&definition(|_| None));
    assert_eq!(vec!["container"], id.fields());
}

#[test]
fn image_root() {
    let id = convert_ok(&definition(|b| {
        Some(Input::new(&b.add(&image("docker.io/library/alpine:latest")), 0))
    }));

    assert_eq!(vec!["container", "from"], id.fields());
    assert_eq!(
        Some("docker.io/library/alpine:latest"),
        str_arg(&id, "address")
    );
}

#[test]
fn deterministic() {
    let build = || {
        definition(|b| {
            let alpine = b.add(&image("alpine"));
            let run = b.add(&exec(
                vec![Input::new(&alpine, 0)],
                meta(&["sh", "-c", "echo hi > /out"]),
                vec![root_mount(0)],
            ));
            Some(Input::new(&run, 0))
        })
    };

    let a = convert_ok(&build());
    let b = convert_ok(&build());
    assert_eq!(a.digest(), b.digest());
    assert_eq!(a.encode(), b.encode());
    assert_eq!(a, ID::decode(&a.encode()).unwrap());
}

#[test]
fn platform() {
    let id = convert_ok(&definition(|b| {
        let op = Op {
            platform: Some(Platform {
                os: "linux".into(),
                architecture: "arm64".into(),
                ..Default::default()
            }),
            ..image("alpine")
        };
        Some(Input::new(&b.add(&op), 0))
    }));

    let ctr = id.receiver().unwrap();
    assert_eq!("container", ctr.field());
    assert_eq!(Some("linux/arm64"), str_arg(ctr, "platform"));
}

#[rstest]
#[case::build(
    Op { op: Some(op::Op::Build(BuildOp::default())), ..Default::default() },
    "build",
    "explicitly unsupported"
)]
#[case::blob(source("blob://sha256:abcd", &[]), "source(blob)", "explicitly unsupported")]
#[case::unknown_scheme(source("s3://bucket/key", &[]), "source", "unsupported source scheme")]
#[case::oci_layout(source("oci-layout://store@sha256:abcd", &[]), "source(oci-layout)", "unsupported")]
#[case::unknown_attr(source("docker-image://alpine", &[("image.foo", "bar")]), "source(image)", "unsupported attribute \"image.foo\"")]
#[case::resolve_mode(source("docker-image://alpine", &[("image.resolvemode", "local")]), "source(image)", "resolve mode")]
fn rejected(#[case] op: Op, #[case] op_type: &str, #[case] reason: &str) {
    let mut digest = None;
    let err = convert_err(&definition(|b| {
        let d = b.add(&op);
        digest = Some(d);
        Some(Input::new(&d, 0))
    }));

    assert_eq!(op_type, err.op_type);
    assert!(err.reason.contains(reason), "{}", err);
    assert_eq!(digest, err.op_digest);
}

#[test]
fn missing_input() {
    let missing = Digest::of(b"missing");
    let err = convert_err(&definition(|b| {
        let op = exec(
            vec![Input::new(&missing, 0)],
            meta(&["true"]),
            vec![root_mount(0)],
        );
        Some(Input::new(&b.add(&op), 0))
    }));

    assert_eq!("definition", err.op_type);
}

#[test]
fn synthetic_root_with_many_inputs() {
    let err = convert_err(&definition(|b| {
        let a = b.add(&image("alpine"));
        let c = b.add(&image("busybox"));
        let noop = b.add(&Op {
            inputs: vec![Input::new(&a, 0), Input::new(&c, 0)],
            ..Default::default()
        });
        Some(Input::new(&noop, 0))
    }));

    assert_eq!("unknown", err.op_type);
    assert!(err.reason.contains("synthetic root with 2 inputs"), "{}", err);
}

#[test]
fn merge_keeps_container() {
    let id = convert_ok(&definition(|b| {
        let alpine = b.add(&image("alpine"));
        let files = b.add(&file(vec![], vec![mkfile(EMPTY_INPUT, 0, "/a", "a")]));
        let merged = b.add(&Op {
            inputs: vec![Input::new(&alpine, 0), Input::new(&files, 0)],
            op: Some(op::Op::Merge(MergeOp {
                inputs: vec![MergeInput { input: 0 }, MergeInput { input: 1 }],
            })),
            ..Default::default()
        });
        Some(Input::new(&merged, 0))
    }));

    assert_eq!(vec!["container", "from", "withRootfs"], id.fields());
    let rootfs = rootfs_arg(&id);
    assert_eq!(
        vec!["container", "from", "rootfs", "withDirectory"],
        rootfs.fields()
    );
    assert_eq!(Some("/"), str_arg(&rootfs, "path"));
    assert_eq!(
        vec!["directory", "withNewFile"],
        id_arg(&rootfs, "source").fields()
    );
}

#[test]
fn merge_of_nothing() {
    let id = convert_ok(&definition(|b| {
        let merged = b.add(&Op {
            op: Some(op::Op::Merge(MergeOp::default())),
            ..Default::default()
        });
        Some(Input::new(&merged, 0))
    }));

    assert_eq!(vec!["container", "withRootfs"], id.fields());
    assert_eq!(vec!["directory"], rootfs_arg(&id).fields());
}

#[test]
fn diff() {
    let id = convert_ok(&definition(|b| {
        let lower = b.add(&file(vec![], vec![mkfile(EMPTY_INPUT, 0, "/a", "a")]));
        let upper = b.add(&file(
            vec![Input::new(&lower, 0)],
            vec![mkfile(0, 0, "/b", "b")],
        ));
        let diff = b.add(&Op {
            inputs: vec![Input::new(&lower, 0), Input::new(&upper, 0)],
            op: Some(op::Op::Diff(DiffOp {
                lower: Some(LowerDiffInput { input: 0 }),
                upper: Some(UpperDiffInput { input: 1 }),
            })),
            ..Default::default()
        });
        Some(Input::new(&diff, 0))
    }));

    let changes = rootfs_arg(&id);
    assert_eq!(
        vec!["directory", "withNewFile", "withNewFile", "diff"],
        changes.fields()
    );
    assert_eq!(
        vec!["directory", "withNewFile"],
        id_arg(&changes, "other").fields()
    );
}

#[test]
fn diff_input_out_of_range() {
    let err = convert_err(&definition(|b| {
        let diff = b.add(&Op {
            op: Some(op::Op::Diff(DiffOp {
                lower: Some(LowerDiffInput { input: EMPTY_INPUT }),
                upper: Some(UpperDiffInput { input: 3 }),
            })),
            ..Default::default()
        });
        Some(Input::new(&diff, 0))
    }));

    assert_eq!("diff", err.op_type);
    assert!(err.reason.contains("input index 3 out of range"), "{}", err);
}

/// Every occurrence of `field` reachable from `id`, once per path leading
/// to it.
fn occurrences<'a>(id: &'a ID, field: &str, out: &mut Vec<&'a ID>) {
    if id.field() == field {
        out.push(id);
    }
    for arg in id.args() {
        if let Some(nested) = arg.value().as_id() {
            occurrences(nested, field, out);
        }
    }
    if let Some(receiver) = id.receiver() {
        occurrences(receiver, field, out);
    }
}

#[test]
fn shared_input_converted_once() {
    // both branches of the merge start from the same image
    let mut b = DefinitionBuilder::new();
    let alpine = b.add(&image("alpine"));
    let left = b.add(&file(
        vec![Input::new(&alpine, 0)],
        vec![mkfile(0, 0, "/left", "l")],
    ));
    let right = b.add(&file(
        vec![Input::new(&alpine, 0)],
        vec![mkfile(0, 0, "/right", "r")],
    ));
    let merged = b.add(&Op {
        inputs: vec![Input::new(&left, 0), Input::new(&right, 0)],
        op: Some(op::Op::Merge(MergeOp {
            inputs: vec![MergeInput { input: 0 }, MergeInput { input: 1 }],
        })),
        ..Default::default()
    });
    let id = convert_ok(&b.finish(Some(Input::new(&merged, 0))));

    // the right branch is only reachable through the merged directory
    let right_ctr = id_arg(&rootfs_arg(&id), "source").receiver().unwrap().clone();
    let mut right_froms = vec![];
    occurrences(&right_ctr, "from", &mut right_froms);
    let mut left_froms = vec![];
    occurrences(id.receiver().unwrap(), "from", &mut left_froms);

    assert!(!right_froms.is_empty());
    assert!(!left_froms.is_empty());
    for from in right_froms.iter().chain(left_froms.iter().skip(1)) {
        assert!(ID::ptr_eq(left_froms[0], from), "{} was converted twice", from);
    }
}

#[test]
fn deep_file_chain() {
    const DEPTH: usize = 50_000;

    let mut b = DefinitionBuilder::new();
    let mut prev = b.add(&file(vec![], vec![mkfile(EMPTY_INPUT, 0, "/0", "x")]));
    for i in 1..DEPTH {
        prev = b.add(&file(
            vec![Input::new(&prev, 0)],
            vec![mkfile(0, 0, &format!("/{}", i), "x")],
        ));
    }
    let id = convert_ok(&b.finish(Some(Input::new(&prev, 0))));

    assert_eq!(vec!["container", "withRootfs"], id.fields());
    assert_eq!(DEPTH + 1, rootfs_arg(&id).fields().len());
    drop(id);
}
