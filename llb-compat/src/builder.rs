use std::collections::{BTreeMap, HashSet};

use bytes::Bytes;
use prost::Message;

use crate::proto::{Definition, Input, Op, OpMetadata};
use crate::Digest;

impl Input {
    pub fn new(digest: &Digest, index: i64) -> Self {
        Input {
            digest: digest.to_string(),
            index,
        }
    }
}

/// Marshals ops into a [Definition].
///
/// Ops have to be added after the ops they refer to, which is the order
/// BuildKit clients marshal them in, too.
#[derive(Default)]
pub struct DefinitionBuilder {
    def: Vec<Bytes>,
    seen: HashSet<Digest>,
    metadata: BTreeMap<String, OpMetadata>,
}

impl DefinitionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an op, returning its digest. Adding the same op twice only
    /// stores one record.
    pub fn add(&mut self, op: &Op) -> Digest {
        let record = Bytes::from(op.encode_to_vec());
        let digest = Digest::of(&record);
        if self.seen.insert(digest) {
            self.def.push(record);
        }
        digest
    }

    pub fn add_with_metadata(&mut self, op: &Op, metadata: OpMetadata) -> Digest {
        let digest = self.add(op);
        self.metadata.insert(digest.to_string(), metadata);
        digest
    }

    /// Terminates the definition with a payload-less op pointing at `root`,
    /// or at nothing for an empty filesystem.
    pub fn finish(mut self, root: Option<Input>) -> Definition {
        let terminal = Op {
            inputs: root.into_iter().collect(),
            ..Default::default()
        };
        // always last, even if an identical op was added before
        self.def.push(Bytes::from(terminal.encode_to_vec()));

        Definition {
            def: self.def,
            metadata: self.metadata,
        }
    }
}
