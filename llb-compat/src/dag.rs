use std::collections::HashMap;
use std::sync::Arc;

use petgraph::{
    algo::toposort,
    graph::{DiGraph, NodeIndex},
    visit::{DfsPostOrder, Walker},
};
use prost::Message;
use tracing::instrument;

use crate::proto::{Definition, Op, OpMetadata, Platform};
use crate::{DefinitionError, Digest, OpKind};

/// One output of a decoded op.
///
/// An op referenced with two different output indexes yields two vertices,
/// which share the decoded op and the resolved inputs.
pub struct Vertex {
    digest: Digest,
    op: Arc<Op>,
    metadata: Option<Arc<OpMetadata>>,
    output_index: i64,
    inputs: Vec<NodeIndex>,
}

impl Vertex {
    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    pub fn op(&self) -> &Op {
        &self.op
    }

    pub fn kind(&self) -> OpKind<'_> {
        self.op.kind()
    }

    pub fn metadata(&self) -> Option<&OpMetadata> {
        self.metadata.as_deref()
    }

    pub fn platform(&self) -> Option<&Platform> {
        self.op.platform.as_ref()
    }

    /// The output of the op selected by the consumer of this vertex.
    pub fn output_index(&self) -> i64 {
        self.output_index
    }

    /// Resolved op inputs, in the order of [Op::inputs].
    pub fn inputs(&self) -> &[NodeIndex] {
        &self.inputs
    }
}

/// An LLB graph resolved from a [Definition].
///
/// Vertices live in an arena and are addressed by [NodeIndex], which stays
/// stable for the lifetime of the [Dag]. Edges point from consumers to
/// their inputs.
pub struct Dag {
    graph: DiGraph<Vertex, usize>,
    root: NodeIndex,
}

impl Dag {
    /// Decodes all records of the definition and links them, starting at
    /// the terminal (last) record.
    /// Every record is decoded once; vertices are created for each
    /// distinct (digest, output index) reachable from the terminal record.
    #[instrument(level = "trace", skip_all, fields(definition.ops = definition.def.len()), err)]
    pub fn from_definition(definition: &Definition) -> Result<Self, DefinitionError> {
        let terminal = definition.def.last().ok_or(DefinitionError::Empty)?;

        let mut ops: HashMap<Digest, Arc<Op>> = HashMap::with_capacity(definition.def.len());
        for record in &definition.def {
            let digest = Digest::of(record);
            if ops.contains_key(&digest) {
                continue;
            }
            let op = Op::decode(record.as_ref())
                .map_err(|e| DefinitionError::InvalidOp(digest, e.to_string()))?;
            ops.insert(digest, Arc::new(op));
        }

        let mut metadata: HashMap<Digest, Arc<OpMetadata>> = HashMap::new();
        let mut lookup_metadata = |digest: &Digest| -> Option<Arc<OpMetadata>> {
            if let Some(m) = metadata.get(digest) {
                return Some(m.clone());
            }
            let m = Arc::new(definition.metadata.get(&digest.to_string())?.clone());
            metadata.insert(*digest, m.clone());
            Some(m)
        };

        let mut graph: DiGraph<Vertex, usize> = DiGraph::new();
        let mut node_ix: HashMap<(Digest, i64), NodeIndex> = HashMap::new();

        let root_digest = Digest::of(terminal);
        let root = graph.add_node(Vertex {
            digest: root_digest,
            op: ops[&root_digest].clone(),
            metadata: lookup_metadata(&root_digest),
            output_index: 0,
            inputs: Vec::new(),
        });
        node_ix.insert((root_digest, 0), root);

        let mut worklist = vec![root];
        while let Some(ix) = worklist.pop() {
            let digest = graph[ix].digest;
            let op = graph[ix].op.clone();

            let mut inputs = Vec::with_capacity(op.inputs.len());
            for (pos, input) in op.inputs.iter().enumerate() {
                let input_digest: Digest = input
                    .digest
                    .parse()
                    .map_err(|e| DefinitionError::InvalidInputDigest(digest, e))?;

                let input_ix = match node_ix.get(&(input_digest, input.index)) {
                    Some(input_ix) => *input_ix,
                    None => {
                        let input_op = ops
                            .get(&input_digest)
                            .ok_or(DefinitionError::OpNotFound(input_digest))?
                            .clone();
                        let input_ix = graph.add_node(Vertex {
                            digest: input_digest,
                            op: input_op,
                            metadata: lookup_metadata(&input_digest),
                            output_index: input.index,
                            inputs: Vec::new(),
                        });
                        node_ix.insert((input_digest, input.index), input_ix);
                        worklist.push(input_ix);
                        input_ix
                    }
                };

                graph.add_edge(ix, input_ix, pos);
                inputs.push(input_ix);
            }
            graph[ix].inputs = inputs;
        }

        if let Err(cycle) = toposort(&graph, None) {
            return Err(DefinitionError::Cycle(graph[cycle.node_id()].digest));
        }

        Ok(Self { graph, root })
    }

    /// The vertex of the terminal record.
    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn vertex(&self, ix: NodeIndex) -> &Vertex {
        &self.graph[ix]
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// All vertices reachable from `start`, inputs before their consumers.
    pub fn post_order(&self, start: NodeIndex) -> Vec<NodeIndex> {
        DfsPostOrder::new(&self.graph, start)
            .iter(&self.graph)
            .collect()
    }
}
