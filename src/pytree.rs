//! Pytree values: the runtime data the schema engine talks about.
//!
//! A pytree is built from four literal kinds (int, float, str, bool) and two
//! recursive shapes (ordered list, ordered dict keyed by literals). Anything
//! else never crosses into the engine.
use std::fmt;
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde_json::{Map, Value};

use crate::error::SchemaError;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// A bound leaf value. Floats are wrapped so literals can be map keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Literal {
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralKind {
    Int,
    Float,
    Str,
    Bool,
}

/// Runtime type of a pytree value; the key concrete constructors are registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Int,
    Float,
    Str,
    Bool,
    List,
    Dict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PyTree {
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
    Bool(bool),
    List(Vec<PyTree>),
    Dict(IndexMap<Literal, PyTree>),
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl LiteralKind {
    pub fn name(self) -> &'static str {
        match self {
            LiteralKind::Int => "int",
            LiteralKind::Float => "float",
            LiteralKind::Str => "str",
            LiteralKind::Bool => "bool",
        }
    }
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Str => "str",
            ValueType::Bool => "bool",
            ValueType::List => "list",
            ValueType::Dict => "dict",
        }
    }
}

impl Literal {
    pub fn kind(&self) -> LiteralKind {
        match self {
            Literal::Int(_) => LiteralKind::Int,
            Literal::Float(_) => LiteralKind::Float,
            Literal::Str(_) => LiteralKind::Str,
            Literal::Bool(_) => LiteralKind::Bool,
        }
    }

    /// Same kind and same value. No numeric coercion: `1` never matches `1.0`.
    pub fn matches(&self, value: &PyTree) -> bool {
        match (self, value) {
            (Literal::Int(a), PyTree::Int(b)) => a == b,
            (Literal::Float(a), PyTree::Float(b)) => a == b,
            (Literal::Str(a), PyTree::Str(b)) => a == b,
            (Literal::Bool(a), PyTree::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Literal> for PyTree {
    fn from(lit: Literal) -> Self {
        match lit {
            Literal::Int(x) => PyTree::Int(x),
            Literal::Float(x) => PyTree::Float(x),
            Literal::Str(x) => PyTree::Str(x),
            Literal::Bool(x) => PyTree::Bool(x),
        }
    }
}

impl PyTree {
    pub fn value_type(&self) -> ValueType {
        match self {
            PyTree::Int(_) => ValueType::Int,
            PyTree::Float(_) => ValueType::Float,
            PyTree::Str(_) => ValueType::Str,
            PyTree::Bool(_) => ValueType::Bool,
            PyTree::List(_) => ValueType::List,
            PyTree::Dict(_) => ValueType::Dict,
        }
    }

    /// The literal kind of a leaf, `None` for lists and dicts.
    pub fn literal_kind(&self) -> Option<LiteralKind> {
        match self {
            PyTree::Int(_) => Some(LiteralKind::Int),
            PyTree::Float(_) => Some(LiteralKind::Float),
            PyTree::Str(_) => Some(LiteralKind::Str),
            PyTree::Bool(_) => Some(LiteralKind::Bool),
            PyTree::List(_) | PyTree::Dict(_) => None,
        }
    }

    pub fn to_literal(&self) -> Option<Literal> {
        match self {
            PyTree::Int(x) => Some(Literal::Int(*x)),
            PyTree::Float(x) => Some(Literal::Float(*x)),
            PyTree::Str(x) => Some(Literal::Str(x.clone())),
            PyTree::Bool(x) => Some(Literal::Bool(*x)),
            PyTree::List(_) | PyTree::Dict(_) => None,
        }
    }

    /// Render as JSON. Non-string dict keys are stringified, since JSON only has
    /// string keys; a dict whose keys collide once stringified is rejected.
    pub fn to_json(&self) -> Result<Value, SchemaError> {
        Ok(match self {
            PyTree::Int(x) => Value::from(*x),
            PyTree::Float(x) => Value::from(x.0),
            PyTree::Str(x) => Value::from(x.clone()),
            PyTree::Bool(x) => Value::from(*x),
            PyTree::List(xs) => Value::Array(xs.iter().map(PyTree::to_json).collect::<Result<_, _>>()?),
            PyTree::Dict(m) => {
                let mut out = Map::new();
                for (k, v) in m {
                    insert_json_entry(&mut out, k, v.to_json()?)?;
                }
                Value::Object(out)
            }
        })
    }
}

/// JSON object key for a dict key.
pub(crate) fn json_key(key: &Literal) -> String {
    match key {
        Literal::Str(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Insert under `json_key(key)`; `1` and `"1"` share a JSON key, so a second
/// entry landing on a taken name is an error, never an overwrite.
pub(crate) fn insert_json_entry(out: &mut Map<String, Value>, key: &Literal, value: Value) -> Result<(), SchemaError> {
    let name = json_key(key);
    if out.contains_key(&name) {
        return Err(SchemaError::UnsupportedType(format!(
            "dict key {key} collides with another key as JSON key `{name}`"
        )));
    }
    out.insert(name, value);
    Ok(())
}

impl TryFrom<Value> for PyTree {
    type Error = SchemaError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Err(SchemaError::UnsupportedType("null is not a pytree value".into())),
            Value::Bool(b) => Ok(PyTree::Bool(b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(PyTree::Int(i))
                } else if n.is_u64() {
                    Err(SchemaError::UnsupportedType(format!("integer {n} does not fit in i64")))
                } else if let Some(f) = n.as_f64() {
                    Ok(PyTree::Float(OrderedFloat(f)))
                } else {
                    Err(SchemaError::UnsupportedType(format!("unrepresentable number {n}")))
                }
            }
            Value::String(s) => Ok(PyTree::Str(s)),
            Value::Array(xs) => xs
                .into_iter()
                .map(PyTree::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(PyTree::List),
            Value::Object(m) => {
                let mut out = IndexMap::with_capacity(m.len());
                for (k, v) in m {
                    out.insert(Literal::Str(k), PyTree::try_from(v)?);
                }
                Ok(PyTree::Dict(out))
            }
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(x) => write!(f, "{x}"),
            // `{:?}` keeps the trailing `.0` so floats never read as ints
            Literal::Float(x) => write!(f, "{:?}", x.0),
            Literal::Str(x) => write!(f, "{x:?}"),
            Literal::Bool(x) => write!(f, "{x}"),
        }
    }
}

impl fmt::Display for PyTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PyTree::List(xs) => {
                write!(f, "[")?;
                for (i, x) in xs.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{x}")?;
                }
                write!(f, "]")
            }
            PyTree::Dict(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            leaf => match leaf.to_literal() {
                Some(lit) => write!(f, "{lit}"),
                None => Ok(()),
            },
        }
    }
}

// ------------------------------- Tests ------------------------------------ //
