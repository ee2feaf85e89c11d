use callid::{Argument, Type};
use llb_compat::{
    proto::{DiffOp, MergeOp, EMPTY_INPUT},
    Vertex,
};

use crate::convert::{scratch_directory, unsupported, with_rootfs, Converter};
use crate::{Converted, UnsupportedOpError};

impl Converter<'_> {
    /// Layers all inputs on top of each other, in order. If the bottom layer
    /// came from a container, the result stays in that container.
    pub(crate) fn convert_merge(
        &self,
        vertex: &Vertex,
        _merge: &MergeOp,
    ) -> Result<Converted, UnsupportedOpError> {
        const OP: &str = "merge";

        if vertex.inputs().is_empty() {
            return Ok(Converted::Directory(scratch_directory()));
        }
        let first = self.input(vertex, OP, 0)?;

        let mut dir = first.clone().into_directory();
        for index in 1..vertex.inputs().len() as i64 {
            dir = dir.append(
                Type::directory(),
                "withDirectory",
                vec![
                    Argument::new("path", "/"),
                    Argument::new("source", self.input_directory(vertex, OP, index)?),
                ],
            );
        }

        Ok(match first {
            Converted::Container(ctr) => Converted::Container(with_rootfs(ctr, dir)),
            Converted::Directory(_) => Converted::Directory(dir),
        })
    }

    /// Computes the changes from the lower to the upper input.
    pub(crate) fn convert_diff(
        &self,
        vertex: &Vertex,
        diff: &DiffOp,
    ) -> Result<Converted, UnsupportedOpError> {
        const OP: &str = "diff";

        let lower = diff
            .lower
            .as_ref()
            .ok_or_else(|| unsupported(vertex, OP, "missing lower diff input"))?;
        let upper = diff
            .upper
            .as_ref()
            .ok_or_else(|| unsupported(vertex, OP, "missing upper diff input"))?;

        let lower = self.diff_input(vertex, lower.input)?.into_directory();
        let upper = self.diff_input(vertex, upper.input)?;

        let changes = upper.clone().into_directory().append(
            Type::directory(),
            "diff",
            vec![Argument::new("other", lower)],
        );

        Ok(match upper {
            Converted::Container(ctr) => Converted::Container(with_rootfs(&ctr, changes)),
            Converted::Directory(_) => Converted::Directory(changes),
        })
    }

    fn diff_input(&self, vertex: &Vertex, index: i64) -> Result<Converted, UnsupportedOpError> {
        if index == EMPTY_INPUT {
            return Ok(Converted::Directory(scratch_directory()));
        }
        self.input(vertex, "diff", index).cloned()
    }
}
