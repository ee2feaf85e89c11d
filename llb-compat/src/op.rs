use crate::proto::{self, op};
use crate::source::SourceKind;

/// The kind of an [proto::Op], with its payload.
#[derive(Clone, Copy, PartialEq)]
pub enum OpKind<'a> {
    Exec(&'a proto::ExecOp),
    File(&'a proto::FileOp),
    Merge(&'a proto::MergeOp),
    Diff(&'a proto::DiffOp),
    Source(SourceKind, &'a proto::SourceOp),
    Build(&'a proto::BuildOp),
    /// An op without payload. LLB marshalling terminates every definition
    /// with one of these, pointing at the actual result.
    Noop,
}

impl proto::Op {
    pub fn kind(&self) -> OpKind<'_> {
        match &self.op {
            Some(op::Op::Exec(e)) => OpKind::Exec(e),
            Some(op::Op::File(f)) => OpKind::File(f),
            Some(op::Op::Merge(m)) => OpKind::Merge(m),
            Some(op::Op::Diff(d)) => OpKind::Diff(d),
            Some(op::Op::Source(s)) => OpKind::Source(SourceKind::of(&s.identifier), s),
            Some(op::Op::Build(b)) => OpKind::Build(b),
            None => OpKind::Noop,
        }
    }
}

impl OpKind<'_> {
    /// Short label used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            OpKind::Exec(_) => "exec",
            OpKind::File(_) => "file",
            OpKind::Merge(_) => "merge",
            OpKind::Diff(_) => "diff",
            OpKind::Source(kind, _) => kind.label(),
            OpKind::Build(_) => "build",
            OpKind::Noop => "unknown",
        }
    }
}

impl std::fmt::Debug for OpKind<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
