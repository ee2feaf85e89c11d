use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use data_encoding::BASE64;
use prost::Message;
use tracing::instrument;

use crate::literal::write_args;
use crate::{proto, Argument, CallDigest, Error, Literal, Type};

/// An immutable, content-addressed chain of calls.
///
/// Each [ID] is one call: a field selected on a receiver (or on the root
/// query when there is no receiver), with named arguments and a declared
/// return type. Appending never mutates an existing chain, it allocates a
/// new call pointing at the old one, so an [ID] can be shared freely.
///
/// The digest of a call covers its receiver digest, return type, field and
/// arguments (nested identifiers by their digest), so two structurally
/// identical chains always have the same digest.
#[derive(Clone)]
pub struct ID(Arc<Call>);

struct Call {
    receiver: Option<ID>,
    return_type: Type,
    field: String,
    args: Vec<Argument>,
    digest: CallDigest,
}

impl ID {
    /// Creates a call on the root query, like `container` or `host`.
    pub fn new(return_type: Type, field: impl Into<String>, args: Vec<Argument>) -> Self {
        Self::build(None, return_type, field.into(), args)
    }

    /// Selects `field` on this identifier, returning the new identifier.
    pub fn append(&self, return_type: Type, field: impl Into<String>, args: Vec<Argument>) -> Self {
        Self::build(Some(self.clone()), return_type, field.into(), args)
    }

    fn build(receiver: Option<ID>, return_type: Type, field: String, args: Vec<Argument>) -> Self {
        let mut call = Call {
            receiver,
            return_type,
            field,
            args,
            // overwritten below, the digest is computed over the call with
            // an empty digest field.
            digest: CallDigest::from(&[0u8; crate::CALL_DIGEST_LEN]),
        };
        call.digest = CallDigest::of(&call.to_proto(String::new()).encode_to_vec());

        Self(Arc::new(call))
    }

    pub fn receiver(&self) -> Option<&ID> {
        self.0.receiver.as_ref()
    }

    pub fn return_type(&self) -> &Type {
        &self.0.return_type
    }

    pub fn field(&self) -> &str {
        &self.0.field
    }

    pub fn args(&self) -> &[Argument] {
        &self.0.args
    }

    /// Returns the value of the argument with the given name, if present.
    pub fn arg(&self, name: &str) -> Option<&Literal> {
        self.0
            .args
            .iter()
            .find(|a| a.name() == name)
            .map(Argument::value)
    }

    pub fn digest(&self) -> &CallDigest {
        &self.0.digest
    }

    /// Whether both identifiers are the same allocation, rather than two
    /// structurally equal chains.
    pub fn ptr_eq(a: &ID, b: &ID) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Field names of the chain, starting at the root query.
    pub fn fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        let mut cur = Some(self);
        while let Some(id) = cur {
            fields.push(id.field());
            cur = id.receiver();
        }
        fields.reverse();
        fields
    }

    /// Finds the closest call named `field` along the receiver chain,
    /// starting at this identifier.
    pub fn find_in_chain(&self, field: &str) -> Option<&ID> {
        let mut cur = Some(self);
        while let Some(id) = cur {
            if id.field() == field {
                return Some(id);
            }
            cur = id.receiver();
        }
        None
    }

    /// Returns every identifier reachable from this one, through receivers
    /// and nested identifier arguments. Each call appears once.
    pub fn walk(&self) -> Vec<ID> {
        let mut seen: HashSet<CallDigest> = HashSet::new();
        let mut out = Vec::new();
        let mut stack = vec![self.clone()];

        while let Some(id) = stack.pop() {
            if !seen.insert(id.digest().clone()) {
                continue;
            }
            for arg in id.args().iter().rev() {
                arg.value().for_each_id(&mut |nested| stack.push(nested.clone()));
            }
            if let Some(receiver) = id.receiver() {
                stack.push(receiver.clone());
            }
            out.push(id);
        }

        out
    }

    /// Encodes the whole call graph as base64 of its canonical protobuf
    /// form.
    pub fn encode(&self) -> String {
        BASE64.encode(&self.to_dag().encode_to_vec())
    }

    fn to_dag(&self) -> proto::Dag {
        let calls_by_digest: BTreeMap<String, proto::Call> = self
            .walk()
            .into_iter()
            .map(|id| {
                let digest = id.digest().to_string();
                (digest.clone(), id.0.to_proto(digest))
            })
            .collect();

        proto::Dag {
            root_digest: self.digest().to_string(),
            calls_by_digest,
        }
    }

    /// Decodes an identifier produced by [ID::encode].
    /// Every call's digest is recomputed and checked against the one it was
    /// stored under.
    #[instrument(level = "trace", skip_all, err)]
    pub fn decode(encoded: &str) -> Result<ID, Error> {
        let raw = BASE64
            .decode(encoded.as_bytes())
            .map_err(|e| Error::InvalidEncoding(e.to_string()))?;
        let dag = proto::Dag::decode(raw.as_slice())
            .map_err(|e| Error::InvalidProto(e.to_string()))?;

        let mut built: HashMap<&str, ID> = HashMap::new();
        let mut visiting: HashSet<&str> = HashSet::new();
        let mut stack: Vec<(&str, bool)> = vec![(dag.root_digest.as_str(), false)];

        while let Some((digest, expanded)) = stack.pop() {
            if built.contains_key(digest) {
                continue;
            }

            let call = dag
                .calls_by_digest
                .get(digest)
                .ok_or_else(|| Error::MissingCall(digest.to_string()))?;

            if expanded {
                let id = call_from_proto(digest, call, &built)?;
                let computed = id.digest().to_string();
                if computed != digest || call.digest != digest {
                    return Err(Error::DigestMismatch {
                        stored: digest.to_string(),
                        computed,
                    });
                }
                visiting.remove(digest);
                built.insert(digest, id);
                continue;
            }

            if !visiting.insert(digest) {
                return Err(Error::Cycle(digest.to_string()));
            }
            stack.push((digest, true));

            for dep in call_dependencies(call) {
                if built.contains_key(dep) {
                    continue;
                }
                if visiting.contains(dep) {
                    return Err(Error::Cycle(dep.to_string()));
                }
                stack.push((dep, false));
            }
        }

        built
            .remove(dag.root_digest.as_str())
            .ok_or_else(|| Error::MissingCall(dag.root_digest.clone()))
    }
}

impl Call {
    fn to_proto(&self, digest: String) -> proto::Call {
        proto::Call {
            receiver_digest: self
                .receiver
                .as_ref()
                .map(|r| r.digest().to_string())
                .unwrap_or_default(),
            r#type: Some((&self.return_type).into()),
            field: self.field.clone(),
            args: self.args.iter().map(Argument::to_proto).collect(),
            digest,
        }
    }
}

impl Call {
    /// Detaches the receiver and all nested identifiers into `out`.
    fn release_into(&mut self, out: &mut Vec<ID>) {
        out.extend(self.receiver.take());
        for arg in &mut self.args {
            arg.take_ids(out);
        }
    }
}

/// Chains can be tens of thousands of calls deep, so they are unlinked with
/// an explicit stack instead of the recursive default drop.
impl Drop for Call {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.release_into(&mut pending);
        while let Some(ID(call)) = pending.pop() {
            // still shared with another chain, which keeps it alive
            if let Some(mut call) = Arc::into_inner(call) {
                call.release_into(&mut pending);
            }
        }
    }
}

/// Digests of all calls the given call refers to.
fn call_dependencies(call: &proto::Call) -> Vec<&str> {
    let mut deps = Vec::new();
    if !call.receiver_digest.is_empty() {
        deps.push(call.receiver_digest.as_str());
    }

    let mut literals: Vec<&proto::Literal> =
        call.args.iter().filter_map(|a| a.value.as_ref()).collect();
    while let Some(lit) = literals.pop() {
        match &lit.value {
            Some(proto::literal::Value::CallDigest(d)) => deps.push(d.as_str()),
            Some(proto::literal::Value::List(l)) => literals.extend(l.values.iter()),
            Some(proto::literal::Value::Object(o)) => {
                literals.extend(o.values.iter().filter_map(|a| a.value.as_ref()))
            }
            _ => {}
        }
    }

    deps
}

fn call_from_proto(
    digest: &str,
    call: &proto::Call,
    built: &HashMap<&str, ID>,
) -> Result<ID, Error> {
    let receiver = if call.receiver_digest.is_empty() {
        None
    } else {
        Some(
            built
                .get(call.receiver_digest.as_str())
                .cloned()
                .ok_or_else(|| Error::MissingCall(call.receiver_digest.clone()))?,
        )
    };

    let return_type = call
        .r#type
        .as_ref()
        .ok_or_else(|| Error::MissingType(digest.to_string()))?;

    let args = call
        .args
        .iter()
        .map(|a| argument_from_proto(digest, a, built))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ID::build(receiver, return_type.into(), call.field.clone(), args))
}

fn argument_from_proto(
    digest: &str,
    arg: &proto::Argument,
    built: &HashMap<&str, ID>,
) -> Result<Argument, Error> {
    let value = arg.value.as_ref().ok_or_else(|| Error::MissingValue {
        call: digest.to_string(),
        name: arg.name.clone(),
    })?;

    Ok(Argument::new(
        arg.name.clone(),
        literal_from_proto(digest, &arg.name, value, built)?,
    ))
}

fn literal_from_proto(
    digest: &str,
    name: &str,
    lit: &proto::Literal,
    built: &HashMap<&str, ID>,
) -> Result<Literal, Error> {
    use proto::literal::Value;

    let value = lit.value.as_ref().ok_or_else(|| Error::MissingValue {
        call: digest.to_string(),
        name: name.to_string(),
    })?;

    Ok(match value {
        Value::CallDigest(d) => Literal::Id(
            built
                .get(d.as_str())
                .cloned()
                .ok_or_else(|| Error::MissingCall(d.clone()))?,
        ),
        Value::Null(_) => Literal::Null,
        Value::Bool(b) => Literal::Bool(*b),
        Value::Enum(e) => Literal::Enum(e.clone()),
        Value::Int(i) => Literal::Int(*i),
        Value::Float(f) => Literal::Float(*f),
        Value::String(s) => Literal::String(s.clone()),
        Value::List(l) => Literal::List(
            l.values
                .iter()
                .map(|v| literal_from_proto(digest, name, v, built))
                .collect::<Result<_, _>>()?,
        ),
        Value::Object(o) => Literal::Object(
            o.values
                .iter()
                .map(|a| argument_from_proto(digest, a, built))
                .collect::<Result<_, _>>()?,
        ),
    })
}

impl PartialEq for ID {
    fn eq(&self, other: &Self) -> bool {
        self.digest() == other.digest()
    }
}

impl Eq for ID {}

impl std::hash::Hash for ID {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.digest().hash(state)
    }
}

/// Renders the chain as a path, like
/// `container.from(address: "docker.io/library/alpine:latest")`.
impl std::fmt::Display for ID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut chain = Vec::new();
        let mut cur = Some(self);
        while let Some(id) = cur {
            chain.push(id);
            cur = id.receiver();
        }

        for (i, id) in chain.iter().rev().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", id.field())?;
            if !id.args().is_empty() {
                write!(f, "(")?;
                write_args(f, id.args())?;
                write!(f, ")")?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ID({})", self)
    }
}
