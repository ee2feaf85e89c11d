use crate::{proto, ID};

/// A named argument passed to a call.
#[derive(Clone, Debug, PartialEq)]
pub struct Argument {
    name: String,
    value: Literal,
}

impl Argument {
    pub fn new(name: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Literal {
        &self.value
    }

    pub(crate) fn take_ids(&mut self, out: &mut Vec<ID>) {
        self.value.take_ids(out);
    }

    pub(crate) fn to_proto(&self) -> proto::Argument {
        proto::Argument {
            name: self.name.clone(),
            value: Some(self.value.to_proto()),
        }
    }
}

/// The value of an [Argument].
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    /// A nested call identifier.
    Id(ID),
    Null,
    Bool(bool),
    /// An enum value, rendered without quotes.
    Enum(String),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Literal>),
    Object(Vec<Argument>),
}

impl Literal {
    pub fn enum_value(value: impl Into<String>) -> Self {
        Literal::Enum(value.into())
    }

    /// Builds a list of string literals.
    pub fn strings<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Literal::List(
            values
                .into_iter()
                .map(|s| Literal::String(s.into()))
                .collect(),
        )
    }

    pub fn as_id(&self) -> Option<&ID> {
        match self {
            Literal::Id(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::String(s) | Literal::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Literal::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Literal]> {
        match self {
            Literal::List(l) => Some(l),
            _ => None,
        }
    }

    pub(crate) fn to_proto(&self) -> proto::Literal {
        use proto::literal::Value;

        let value = match self {
            Literal::Id(id) => Value::CallDigest(id.digest().to_string()),
            Literal::Null => Value::Null(true),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Enum(e) => Value::Enum(e.clone()),
            Literal::Int(i) => Value::Int(*i),
            Literal::Float(f) => Value::Float(*f),
            Literal::String(s) => Value::String(s.clone()),
            Literal::List(l) => Value::List(proto::List {
                values: l.iter().map(Literal::to_proto).collect(),
            }),
            Literal::Object(o) => Value::Object(proto::Object {
                values: o.iter().map(Argument::to_proto).collect(),
            }),
        };

        proto::Literal { value: Some(value) }
    }

    /// Calls `f` with every nested [ID] in this literal.
    pub(crate) fn for_each_id<'a>(&'a self, f: &mut impl FnMut(&'a ID)) {
        match self {
            Literal::Id(id) => f(id),
            Literal::List(l) => {
                for lit in l {
                    lit.for_each_id(f);
                }
            }
            Literal::Object(o) => {
                for arg in o {
                    arg.value.for_each_id(f);
                }
            }
            Literal::Null
            | Literal::Bool(_)
            | Literal::Enum(_)
            | Literal::Int(_)
            | Literal::Float(_)
            | Literal::String(_) => {}
        }
    }

    /// Moves every nested identifier out into `out`, leaving `Null` behind.
    pub(crate) fn take_ids(&mut self, out: &mut Vec<ID>) {
        match self {
            Literal::Id(_) => {
                if let Literal::Id(id) = std::mem::replace(self, Literal::Null) {
                    out.push(id);
                }
            }
            Literal::List(l) => {
                for lit in l {
                    lit.take_ids(out);
                }
            }
            Literal::Object(o) => {
                for arg in o {
                    arg.value.take_ids(out);
                }
            }
            Literal::Null
            | Literal::Bool(_)
            | Literal::Enum(_)
            | Literal::Int(_)
            | Literal::Float(_)
            | Literal::String(_) => {}
        }
    }
}

impl From<ID> for Literal {
    fn from(value: ID) -> Self {
        Literal::Id(value)
    }
}

impl From<&ID> for Literal {
    fn from(value: &ID) -> Self {
        Literal::Id(value.clone())
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Int(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::String(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::String(value)
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Id(id) => write!(f, "{}", id),
            Literal::Null => write!(f, "null"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Enum(e) => write!(f, "{}", e),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(v) => write!(f, "{}", v),
            Literal::String(s) => write!(f, "{:?}", s),
            Literal::List(l) => {
                write!(f, "[")?;
                for (i, lit) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", lit)?;
                }
                write!(f, "]")
            }
            Literal::Object(o) => {
                write!(f, "{{")?;
                write_args(f, o)?;
                write!(f, "}}")
            }
        }
    }
}

pub(crate) fn write_args(f: &mut std::fmt::Formatter<'_>, args: &[Argument]) -> std::fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}: {}", arg.name, arg.value)?;
    }
    Ok(())
}
