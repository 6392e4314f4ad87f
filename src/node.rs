//! Node algebra: the closed set of schema node kinds.
//!
//! A schema tree is a plain value. It owns its children, is never mutated after
//! construction, and every operation that "changes" a tree builds a new one.
//! Construction goes through the checked factories below wherever an invariant
//! cannot be expressed in the type alone.
use std::fmt;
use indexmap::IndexMap;
use ordered_float::OrderedFloat;

use crate::error::SchemaError;
use crate::pytree::{Literal, LiteralKind, PyTree};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Exactly one bound value.
    Literal(Literal),
    /// A leaf type constraint without a bound value.
    Abstract(AbstractLiteral),
    /// Exact-shape mapping: fixed keys, fixed arity.
    Dict(IndexMap<Literal, Node>),
    /// Exact-shape sequence: fixed length.
    List(Vec<Node>),
    /// Homogeneous mapping of any size.
    AbstractDict { key: Box<Node>, value: Box<Node> },
    /// Homogeneous sequence of any length.
    AbstractList(Box<Node>),
    /// Ordered alternatives.
    Union(Vec<Node>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbstractLiteral {
    Int { min: Option<i64>, max: Option<i64> },
    Float { min: Option<OrderedFloat<f64>>, max: Option<OrderedFloat<f64>> },
    Str,
    Bool,
    Any,
}

/// Fine-grained kind tag; the key named transforms are registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Int,
    Float,
    Str,
    Bool,
    AbstractInt,
    AbstractFloat,
    AbstractStr,
    AbstractBool,
    AbstractAny,
    Dict,
    List,
    AbstractDict,
    AbstractList,
    Union,
}

// ————————————————————————————————————————————————————————————————————————————
// CONSTRUCTORS
// ————————————————————————————————————————————————————————————————————————————

impl Node {
    pub fn int(value: i64) -> Self { Node::Literal(Literal::Int(value)) }
    pub fn float(value: f64) -> Self { Node::Literal(Literal::Float(OrderedFloat(value))) }
    pub fn str(value: impl Into<String>) -> Self { Node::Literal(Literal::Str(value.into())) }
    pub fn bool(value: bool) -> Self { Node::Literal(Literal::Bool(value)) }

    pub fn any() -> Self { Node::Abstract(AbstractLiteral::Any) }
    pub fn abstract_str() -> Self { Node::Abstract(AbstractLiteral::Str) }
    pub fn abstract_bool() -> Self { Node::Abstract(AbstractLiteral::Bool) }

    pub fn abstract_int(min: Option<i64>, max: Option<i64>) -> Self {
        Node::Abstract(AbstractLiteral::Int { min, max })
    }

    pub fn abstract_float(min: Option<f64>, max: Option<f64>) -> Self {
        Node::Abstract(AbstractLiteral::Float {
            min: min.map(OrderedFloat),
            max: max.map(OrderedFloat),
        })
    }

    /// The unbounded abstract node for a literal kind.
    pub fn unbound(kind: LiteralKind) -> Self {
        Node::Abstract(match kind {
            LiteralKind::Int => AbstractLiteral::Int { min: None, max: None },
            LiteralKind::Float => AbstractLiteral::Float { min: None, max: None },
            LiteralKind::Str => AbstractLiteral::Str,
            LiteralKind::Bool => AbstractLiteral::Bool,
        })
    }

    pub fn list(items: Vec<Node>) -> Self { Node::List(items) }

    pub fn abstract_list(item: Node) -> Self { Node::AbstractList(Box::new(item)) }

    pub fn abstract_dict(key: Node, value: Node) -> Self {
        Node::AbstractDict { key: Box::new(key), value: Box::new(value) }
    }

    /// Build a dict node from `(key node, value node)` pairs.
    ///
    /// Keys must be literal nodes and unique.
    pub fn dict_from_nodes<I>(entries: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (Node, Node)>,
    {
        let mut out = IndexMap::new();
        for (key, value) in entries {
            let Node::Literal(lit) = key else {
                return Err(SchemaError::MalformedSchema(format!(
                    "dict key must be a literal node, got {key}"
                )));
            };
            if out.contains_key(&lit) {
                return Err(SchemaError::MalformedSchema(format!("duplicate dict key {lit}")));
            }
            out.insert(lit, value);
        }
        Ok(Node::Dict(out))
    }

    /// Convenience for string-keyed dicts; keys are unique by construction of the map.
    pub fn dict<K: Into<String>>(entries: impl IntoIterator<Item = (K, Node)>) -> Self {
        Node::Dict(entries.into_iter().map(|(k, v)| (Literal::Str(k.into()), v)).collect())
    }

    /// A union needs at least one alternative.
    pub fn union(alternatives: Vec<Node>) -> Result<Self, SchemaError> {
        if alternatives.is_empty() {
            return Err(SchemaError::MalformedSchema("union needs at least one alternative".into()));
        }
        Ok(Node::Union(alternatives))
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INSPECTION
// ————————————————————————————————————————————————————————————————————————————

impl AbstractLiteral {
    pub fn kind(&self) -> Option<LiteralKind> {
        match self {
            AbstractLiteral::Int { .. } => Some(LiteralKind::Int),
            AbstractLiteral::Float { .. } => Some(LiteralKind::Float),
            AbstractLiteral::Str => Some(LiteralKind::Str),
            AbstractLiteral::Bool => Some(LiteralKind::Bool),
            AbstractLiteral::Any => None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().map_or("any", LiteralKind::name)
    }
}

impl NodeKind {
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Int => "int",
            NodeKind::Float => "float",
            NodeKind::Str => "str",
            NodeKind::Bool => "bool",
            NodeKind::AbstractInt => "abstract int",
            NodeKind::AbstractFloat => "abstract float",
            NodeKind::AbstractStr => "abstract str",
            NodeKind::AbstractBool => "abstract bool",
            NodeKind::AbstractAny => "any",
            NodeKind::Dict => "dict",
            NodeKind::List => "list",
            NodeKind::AbstractDict => "abstract dict",
            NodeKind::AbstractList => "abstract list",
            NodeKind::Union => "union",
        }
    }
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Literal(Literal::Int(_)) => NodeKind::Int,
            Node::Literal(Literal::Float(_)) => NodeKind::Float,
            Node::Literal(Literal::Str(_)) => NodeKind::Str,
            Node::Literal(Literal::Bool(_)) => NodeKind::Bool,
            Node::Abstract(AbstractLiteral::Int { .. }) => NodeKind::AbstractInt,
            Node::Abstract(AbstractLiteral::Float { .. }) => NodeKind::AbstractFloat,
            Node::Abstract(AbstractLiteral::Str) => NodeKind::AbstractStr,
            Node::Abstract(AbstractLiteral::Bool) => NodeKind::AbstractBool,
            Node::Abstract(AbstractLiteral::Any) => NodeKind::AbstractAny,
            Node::Dict(_) => NodeKind::Dict,
            Node::List(_) => NodeKind::List,
            Node::AbstractDict { .. } => NodeKind::AbstractDict,
            Node::AbstractList(_) => NodeKind::AbstractList,
            Node::Union(_) => NodeKind::Union,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Literal(_) | Node::Abstract(_))
    }

    /// Direct child nodes, in declaration order. Dict keys are literals, not nodes,
    /// and are not children.
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::Literal(_) | Node::Abstract(_) => Vec::new(),
            Node::Dict(m) => m.values().collect(),
            Node::List(xs) | Node::Union(xs) => xs.iter().collect(),
            Node::AbstractDict { key, value } => vec![key.as_ref(), value.as_ref()],
            Node::AbstractList(item) => vec![item.as_ref()],
        }
    }

    /// True when the tree binds every leaf to a value and has no abstract branches.
    pub fn is_concrete(&self) -> bool {
        match self {
            Node::Literal(_) => true,
            Node::Dict(m) => m.values().all(Node::is_concrete),
            Node::List(xs) => xs.iter().all(Node::is_concrete),
            Node::Abstract(_) | Node::AbstractDict { .. } | Node::AbstractList(_) | Node::Union(_) => false,
        }
    }

    /// Export a concretization back to the value it describes.
    pub fn to_pytree(&self) -> Result<PyTree, SchemaError> {
        match self {
            Node::Literal(lit) => Ok(PyTree::from(lit.clone())),
            Node::List(xs) => xs.iter().map(Node::to_pytree).collect::<Result<Vec<_>, _>>().map(PyTree::List),
            Node::Dict(m) => {
                let mut out = IndexMap::with_capacity(m.len());
                for (k, v) in m {
                    out.insert(k.clone(), v.to_pytree()?);
                }
                Ok(PyTree::Dict(out))
            }
            other => Err(SchemaError::UnsupportedType(format!(
                "{} node `{other}` has no concrete value",
                other.kind().name()
            ))),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DISPLAY
// ————————————————————————————————————————————————————————————————————————————

// Unbounded abstract nodes print in the syntax `Annotation::from_str` accepts.
impl fmt::Display for AbstractLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbstractLiteral::Int { min, max } => {
                write!(f, "int")?;
                write_bounds(f, min.as_ref(), max.as_ref())
            }
            AbstractLiteral::Float { min, max } => {
                write!(f, "float")?;
                write_bounds(f, min.map(|x| x.0).as_ref(), max.map(|x| x.0).as_ref())
            }
            AbstractLiteral::Str => write!(f, "str"),
            AbstractLiteral::Bool => write!(f, "bool"),
            AbstractLiteral::Any => write!(f, "Any"),
        }
    }
}

fn write_bounds<T: fmt::Debug>(f: &mut fmt::Formatter<'_>, min: Option<&T>, max: Option<&T>) -> fmt::Result {
    match (min, max) {
        (None, None) => Ok(()),
        (Some(lo), None) => write!(f, "(min={lo:?})"),
        (None, Some(hi)) => write!(f, "(max={hi:?})"),
        (Some(lo), Some(hi)) => write!(f, "(min={lo:?}, max={hi:?})"),
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, items: &[Node]) -> fmt::Result {
    for (i, x) in items.iter().enumerate() {
        if i > 0 { write!(f, ", ")?; }
        write!(f, "{x}")?;
    }
    Ok(())
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Literal(lit) => write!(f, "{lit}"),
            Node::Abstract(a) => write!(f, "{a}"),
            Node::Dict(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Node::List(xs) => {
                write!(f, "[")?;
                write_seq(f, xs)?;
                write!(f, "]")
            }
            Node::AbstractDict { key, value } => write!(f, "Dict[{key}, {value}]"),
            Node::AbstractList(item) => write!(f, "List[{item}]"),
            Node::Union(xs) => {
                write!(f, "Union[")?;
                write_seq(f, xs)?;
                write!(f, "]")
            }
        }
    }
}

// ------------------------------- Tests ------------------------------------ //
